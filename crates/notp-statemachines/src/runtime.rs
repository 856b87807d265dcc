use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use notp_packets::{Packet, Packetable};
use notp_transport::TransportLayer;
use tracing::{debug, info};

use crate::bag::{Bag, BagValue};
use crate::error::{StateMachineError, StateMachineResult};
use crate::packets::StatePacket;

/// Reserved state that marks the end of a run.
pub const FINAL_STATE_ID: u16 = 1;
/// Reserved state that redirects to the machine's first real state.
pub const INITIAL_STATE_ID: u16 = 2;

/// Direction of a synchronization flow, seen from the follower.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FlowType {
    Unknown,
    #[default]
    Push,
    Pull,
}

impl FlowType {
    /// Value sent on the wire in the start-flow message.
    pub fn value(self) -> u64 {
        match self {
            Self::Unknown => 0,
            Self::Push => 1,
            Self::Pull => 2,
        }
    }
}

impl TryFrom<u64> for FlowType {
    type Error = StateMachineError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Push),
            2 => Ok(Self::Pull),
            other => Err(StateMachineError::UnknownFlowType(other)),
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Push => "push",
            Self::Pull => "pull",
        })
    }
}

/// What the host handler asks the runtime to do with a state packet.
#[derive(Debug, Default)]
pub struct HostHandlerReturn {
    /// Keep producing packets for the same state.
    pub has_more: bool,
    pub message_value: u64,
    pub error_code: u16,
    pub packetables: Vec<Box<dyn Packetable>>,
    /// End the run gracefully and tell the peer.
    pub terminate: bool,
}

/// View of the run handed to the host handler.
///
/// Changes to the bag are carried back into the runtime context once the
/// handler returns.
#[derive(Clone, Debug)]
pub struct HandlerContext {
    flow: FlowType,
    current_state_id: u16,
    bag: Bag,
}

impl HandlerContext {
    /// Context for a handler call in `current_state_id`.
    pub fn new(flow: FlowType, current_state_id: u16, bag: Bag) -> Self {
        Self {
            flow,
            current_state_id,
            bag,
        }
    }

    /// Flow being run.
    pub fn flow(&self) -> FlowType {
        self.flow
    }

    /// State the handler is called from.
    pub fn current_state_id(&self) -> u16 {
        self.current_state_id
    }

    /// Bag as seen by the handler.
    pub fn bag(&self) -> &Bag {
        &self.bag
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&BagValue> {
        self.bag.get(key)
    }

    /// Store a value; it is carried into the next runtime context.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<BagValue>) {
        self.bag.set(key, value);
    }

    /// Consume the context and return its bag.
    pub fn into_bag(self) -> Bag {
        self.bag
    }
}

/// Application callback invoked for every handled state packet.
///
/// On the sending side `packets` holds the packets the state wants to
/// forward; on the receiving side it holds the payload packets that arrived
/// behind `packet`.
#[async_trait]
pub trait HostHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut HandlerContext,
        packet: &StatePacket,
        packets: &[Packet],
    ) -> StateMachineResult<HostHandlerReturn>;
}

/// Snapshot of a run. Every `with_*` method returns an updated copy.
#[derive(Clone)]
pub struct StateMachineRuntimeContext {
    initial_state_id: u16,
    current_state_id: u16,
    is_final: bool,
    flow: FlowType,
    bag: Bag,
    handler: Arc<dyn HostHandler>,
    transport: TransportLayer,
}

impl StateMachineRuntimeContext {
    pub(crate) fn new(
        initial_state_id: u16,
        handler: Arc<dyn HostHandler>,
        transport: TransportLayer,
    ) -> Self {
        Self {
            initial_state_id,
            current_state_id: INITIAL_STATE_ID,
            is_final: false,
            flow: FlowType::default(),
            bag: Bag::new(),
            handler,
            transport,
        }
    }

    /// First state entered after the reserved initial state.
    pub fn initial_state_id(&self) -> u16 {
        self.initial_state_id
    }

    /// State being run.
    pub fn current_state_id(&self) -> u16 {
        self.current_state_id
    }

    /// `true` once the run has reached the final state.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Flow being run.
    pub fn flow(&self) -> FlowType {
        self.flow
    }

    /// Values carried between states.
    pub fn bag(&self) -> &Bag {
        &self.bag
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&BagValue> {
        self.bag.get(key)
    }

    /// Copy of this context positioned at `state_id`.
    pub fn with_current_state(&self, state_id: u16) -> Self {
        Self {
            current_state_id: state_id,
            ..self.clone()
        }
    }

    /// Copy of this context marked final.
    pub fn with_final(&self) -> Self {
        Self {
            is_final: true,
            ..self.clone()
        }
    }

    /// Copy of this context running `flow`.
    pub fn with_flow(&self, flow: FlowType) -> Self {
        Self {
            flow,
            ..self.clone()
        }
    }

    /// Copy of this context with `bag` replacing the current one.
    pub fn with_bag(&self, bag: Bag) -> Self {
        Self {
            bag,
            ..self.clone()
        }
    }

    /// Copy of this context with `key` set to `value`.
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<BagValue>) -> Self {
        self.with_bag(self.bag.clone().with(key, value))
    }

    /// Context handed to the host handler for the current state.
    pub fn handler_context(&self) -> HandlerContext {
        HandlerContext::new(self.flow, self.current_state_id, self.bag.clone())
    }

    /// Send a single packet as its own frame.
    pub async fn send(&self, packet: Box<dyn Packetable>) -> StateMachineResult<()> {
        self.send_stream(&[packet]).await
    }

    /// Send all `packets` in one frame.
    pub async fn send_stream(&self, packets: &[Box<dyn Packetable>]) -> StateMachineResult<()> {
        Ok(self.transport.transmit_packet(packets).await?)
    }

    /// Receive a frame that must hold exactly one packet.
    pub async fn receive(&self) -> StateMachineResult<Packet> {
        let mut packets = self.receive_stream().await?;
        match packets.len() {
            0 => Err(StateMachineError::MissingPacket("state")),
            1 => Ok(packets.remove(0)),
            n => Err(StateMachineError::TooManyPackets(n)),
        }
    }

    /// Receive every packet of the next frame.
    pub async fn receive_stream(&self) -> StateMachineResult<Vec<Packet>> {
        Ok(self.transport.receive_packet().await?)
    }

    /// Let the host handler process `packet`.
    pub async fn handle(
        &self,
        ctx: &mut HandlerContext,
        packet: &StatePacket,
    ) -> StateMachineResult<HostHandlerReturn> {
        self.handle_stream(ctx, packet, &[]).await
    }

    /// Let the host handler process `packet` with its companion packets.
    pub async fn handle_stream(
        &self,
        ctx: &mut HandlerContext,
        packet: &StatePacket,
        packets: &[Packet],
    ) -> StateMachineResult<HostHandlerReturn> {
        self.handler.handle(ctx, packet, packets).await
    }
}

impl fmt::Debug for StateMachineRuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachineRuntimeContext")
            .field("initial_state_id", &self.initial_state_id)
            .field("current_state_id", &self.current_state_id)
            .field("is_final", &self.is_final)
            .field("flow", &self.flow)
            .field("bag", &self.bag)
            .finish_non_exhaustive()
    }
}

/// Outcome of one transition: the updated context and the next state.
#[derive(Debug)]
pub struct StateTransitionInfo {
    pub runtime: StateMachineRuntimeContext,
    pub state_id: u16,
}

impl StateTransitionInfo {
    /// Pair a context with the state to run next.
    pub fn new(runtime: StateMachineRuntimeContext, state_id: u16) -> Self {
        Self { runtime, state_id }
    }
}

/// Maps state identifiers to transitions.
#[async_trait]
pub trait StateTable: Send + Sync {
    /// Every state this table can run, including the reserved ones.
    fn states(&self) -> Vec<u16>;

    async fn transition(
        &self,
        state_id: u16,
        runtime: StateMachineRuntimeContext,
    ) -> StateMachineResult<StateTransitionInfo>;
}

/// Transition of the reserved initial state.
pub fn initial_state(runtime: StateMachineRuntimeContext) -> StateTransitionInfo {
    let next = runtime.initial_state_id();
    StateTransitionInfo::new(runtime, next)
}

/// Transition of the reserved final state.
pub fn final_state(runtime: StateMachineRuntimeContext) -> StateTransitionInfo {
    StateTransitionInfo::new(runtime.with_final(), FINAL_STATE_ID)
}

/// Jump straight to the final state.
pub fn terminate_with_final(runtime: StateMachineRuntimeContext) -> StateTransitionInfo {
    StateTransitionInfo::new(runtime, FINAL_STATE_ID)
}

/// Drives a [`StateTable`] from the initial state until the final one.
pub struct StateMachine {
    table: Arc<dyn StateTable>,
    runtime: StateMachineRuntimeContext,
}

impl StateMachine {
    /// Validate the table and build a machine that starts at `initial_state_id`.
    pub fn new(
        table: Arc<dyn StateTable>,
        initial_state_id: u16,
        handler: Arc<dyn HostHandler>,
        transport: TransportLayer,
    ) -> StateMachineResult<Self> {
        let states = table.states();
        if states.is_empty() {
            return Err(StateMachineError::EmptyStateTable);
        }
        for required in [INITIAL_STATE_ID, FINAL_STATE_ID, initial_state_id] {
            if !states.contains(&required) {
                return Err(StateMachineError::MissingInitialState(required));
            }
        }
        Ok(Self {
            table,
            runtime: StateMachineRuntimeContext::new(initial_state_id, handler, transport),
        })
    }

    /// Run the machine to completion and return the final context.
    pub async fn run(
        &self,
        bag: Bag,
        flow: FlowType,
    ) -> StateMachineResult<StateMachineRuntimeContext> {
        let mut runtime = self.runtime.with_bag(bag).with_flow(flow);
        let mut state_id = INITIAL_STATE_ID;
        info!(
            initial_state = runtime.initial_state_id(),
            flow = %flow,
            "state machine started"
        );
        loop {
            runtime = runtime.with_current_state(state_id);
            let info = self.table.transition(state_id, runtime).await?;
            runtime = info.runtime;
            if runtime.is_final() {
                break;
            }
            debug!(from = state_id, to = info.state_id, "state transition");
            state_id = info.state_id;
        }
        info!(flow = %runtime.flow(), "state machine reached final state");
        Ok(runtime)
    }
}
