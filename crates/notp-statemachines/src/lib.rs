//! State-machine runtime for the NOTP protocol.
//!
//! A [`StateMachine`] walks a [`StateTable`] from a reserved initial state
//! to the reserved final state, carrying an immutable
//! [`StateMachineRuntimeContext`] from one transition to the next. Every
//! handled [`StatePacket`] passes through the application's [`HostHandler`],
//! which fills in message values and payload packets.
//!
//! [`ParticipantStateTable`] implements the push and pull flows between a
//! follower (the side that opens the flow) and a leader.

pub mod bag;
pub mod error;
pub mod exchange;
pub mod packets;
pub mod participant;
pub mod payloads;
pub mod runtime;

pub use bag::{Bag, BagValue, FLOW_ID_KEY};
pub use error::{StateMachineError, StateMachineResult};
pub use exchange::{
    create_and_handle, create_and_handle_and_stream, create_and_handle_and_stream_with_value,
    receive_and_handle, send_termination, should_handle, Created, Step,
};
pub use packets::*;
pub use participant::{
    new_follower_state_machine, new_leader_state_machine, ParticipantStateTable, StateId,
};
pub use payloads::{
    LocalRefStatePacket, ObjectHeaderStatePacket, ObjectStatePacket, RemoteRefStatePacket,
};
pub use runtime::{
    final_state, initial_state, terminate_with_final, FlowType, HandlerContext, HostHandler,
    HostHandlerReturn, StateMachine, StateMachineRuntimeContext, StateTable, StateTransitionInfo,
    FINAL_STATE_ID, INITIAL_STATE_ID,
};
