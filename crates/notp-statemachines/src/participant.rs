//! Follower/leader state table for push and pull flows.
//!
//! The follower opens a flow and the leader answers it. In a push flow the
//! follower publishes its objects to the leader; in a pull flow the leader
//! publishes to the follower. Both sides walk the same table:
//!
//! ```text
//! follower: StartFlow -> NotifyObjects | RequestObjects -> ... -> Final
//! leader:   ProcessStartFlow -> ProcessNotifyObjects | ProcessRequestObjects -> ... -> Final
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use notp_packets::{combine_u32, convert_packetable, Packet};
use notp_transport::TransportLayer;
use tracing::{debug, info};

use crate::bag::{BagValue, FLOW_ID_KEY};
use crate::error::{StateMachineError, StateMachineResult};
use crate::exchange::{
    create_and_handle_and_stream, create_and_handle_and_stream_with_value, receive_and_handle,
    Step,
};
use crate::packets::{
    StatePacket, ACK_MESSAGE, ACTION_RESPONSE, COMMIT, EXCHANGE_DATA_STREAM, FLOW_ID_VALUE,
    NEGOTIATION_REQUEST, NOTIFY_OBJECTS_STATE, REQUEST_CURRENT_OBJECTS_STATE,
    RESPOND_CURRENT_STATE, RESPOND_NEGOTIATION_REQUEST, START_FLOW, UNKNOWN_MESSAGE,
};
use crate::runtime::{
    final_state, initial_state, terminate_with_final, FlowType, HostHandler, StateMachine,
    StateMachineRuntimeContext, StateTable, StateTransitionInfo, FINAL_STATE_ID,
    INITIAL_STATE_ID,
};

/// States of the participant table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StateId {
    Final = FINAL_STATE_ID,
    Initial = INITIAL_STATE_ID,
    StartFlow = 10,
    ProcessStartFlow = 11,
    RequestObjects = 12,
    ProcessRequestObjects = 13,
    NotifyObjects = 14,
    ProcessNotifyObjects = 15,
    SubscriberNegotiation = 16,
    SubscriberDataStream = 17,
    SubscriberCommit = 18,
    PublisherNegotiation = 19,
    PublisherDataStream = 20,
    PublisherCommit = 21,
}

impl StateId {
    /// Every state in the participant table.
    pub const ALL: [StateId; 14] = [
        Self::Final,
        Self::Initial,
        Self::StartFlow,
        Self::ProcessStartFlow,
        Self::RequestObjects,
        Self::ProcessRequestObjects,
        Self::NotifyObjects,
        Self::ProcessNotifyObjects,
        Self::SubscriberNegotiation,
        Self::SubscriberDataStream,
        Self::SubscriberCommit,
        Self::PublisherNegotiation,
        Self::PublisherDataStream,
        Self::PublisherCommit,
    ];

    /// Numeric identifier.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Look up a state by numeric identifier.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    /// Name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Final => "final",
            Self::Initial => "initial",
            Self::StartFlow => "start-flow",
            Self::ProcessStartFlow => "process-start-flow",
            Self::RequestObjects => "request-objects",
            Self::ProcessRequestObjects => "process-request-objects",
            Self::NotifyObjects => "notify-objects",
            Self::ProcessNotifyObjects => "process-notify-objects",
            Self::SubscriberNegotiation => "subscriber-negotiation",
            Self::SubscriberDataStream => "subscriber-data-stream",
            Self::SubscriberCommit => "subscriber-commit",
            Self::PublisherNegotiation => "publisher-negotiation",
            Self::PublisherDataStream => "publisher-data-stream",
            Self::PublisherCommit => "publisher-commit",
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unwrap a [`Step`], ending the transition when the run was terminated.
macro_rules! step {
    ($step:expr) => {
        match $step.await? {
            Step::Next(runtime, value) => (runtime, value),
            Step::Terminated(runtime) => return Ok(terminate_with_final(runtime)),
        }
    };
}

fn next(runtime: StateMachineRuntimeContext, state: StateId) -> StateTransitionInfo {
    StateTransitionInfo::new(runtime, state.id())
}

fn require_flow(runtime: &StateMachineRuntimeContext, flow: FlowType) -> StateMachineResult<()> {
    if runtime.flow() == flow {
        Ok(())
    } else {
        Err(StateMachineError::UnknownFlowType(runtime.flow().value()))
    }
}

/// State table shared by followers and leaders.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParticipantStateTable;

#[async_trait]
impl StateTable for ParticipantStateTable {
    fn states(&self) -> Vec<u16> {
        StateId::ALL.iter().map(|s| s.id()).collect()
    }

    async fn transition(
        &self,
        state_id: u16,
        runtime: StateMachineRuntimeContext,
    ) -> StateMachineResult<StateTransitionInfo> {
        let state = StateId::from_id(state_id).ok_or(StateMachineError::UnknownState(state_id))?;
        debug!(state = %state, flow = %runtime.flow(), "entering state");
        match state {
            StateId::Initial => Ok(initial_state(runtime)),
            StateId::Final => Ok(final_state(runtime)),
            StateId::StartFlow => start_flow(runtime).await,
            StateId::ProcessStartFlow => process_start_flow(runtime).await,
            StateId::RequestObjects => request_objects(runtime).await,
            StateId::ProcessRequestObjects => process_request_objects(runtime).await,
            StateId::NotifyObjects => notify_objects(runtime).await,
            StateId::ProcessNotifyObjects => process_notify_objects(runtime).await,
            StateId::SubscriberNegotiation => subscriber_negotiation(runtime).await,
            StateId::SubscriberDataStream => subscriber_data_stream(runtime).await,
            StateId::SubscriberCommit => subscriber_commit(runtime).await,
            StateId::PublisherNegotiation => publisher_negotiation(runtime).await,
            StateId::PublisherDataStream => publisher_data_stream(runtime).await,
            StateId::PublisherCommit => publisher_commit(runtime).await,
        }
    }
}

/// Machine for the side that opens the flow.
pub fn new_follower_state_machine(
    handler: Arc<dyn HostHandler>,
    transport: TransportLayer,
) -> StateMachineResult<StateMachine> {
    StateMachine::new(
        Arc::new(ParticipantStateTable),
        StateId::StartFlow.id(),
        handler,
        transport,
    )
}

/// Machine for the side that accepts a flow.
pub fn new_leader_state_machine(
    handler: Arc<dyn HostHandler>,
    transport: TransportLayer,
) -> StateMachineResult<StateMachine> {
    StateMachine::new(
        Arc::new(ParticipantStateTable),
        StateId::ProcessStartFlow.id(),
        handler,
        transport,
    )
}

async fn start_flow(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let flow_id: u64 = rand::random();
    let runtime = runtime.with_value(FLOW_ID_KEY, BagValue::FlowId(flow_id));
    let flow_packet = Packet::from_packetable(&StatePacket::new(FLOW_ID_VALUE, flow_id, 0))?;
    let flow = runtime.flow();
    info!(flow_id, flow = %flow, "starting flow");

    let (runtime, _) = step!(create_and_handle_and_stream_with_value(
        runtime,
        START_FLOW,
        flow.value(),
        &[flow_packet],
    ));
    let (runtime, (response, _)) = step!(receive_and_handle(runtime, ACTION_RESPONSE));
    if !response.has_ack() {
        return Err(StateMachineError::MissingAck("start flow"));
    }
    match flow {
        FlowType::Push => Ok(next(runtime, StateId::NotifyObjects)),
        FlowType::Pull => Ok(next(runtime, StateId::RequestObjects)),
        FlowType::Unknown => Err(StateMachineError::UnknownFlowType(flow.value())),
    }
}

async fn process_start_flow(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, (packet, packets)) = step!(receive_and_handle(runtime, START_FLOW));
    let first = packets
        .first()
        .ok_or(StateMachineError::MissingPacket("flow id"))?;
    let flow_packet: StatePacket = convert_packetable(first)?;
    if flow_packet.message_code != FLOW_ID_VALUE {
        return Err(StateMachineError::UnexpectedMessage {
            expected: FLOW_ID_VALUE,
            actual: flow_packet.message_code,
        });
    }
    let runtime = runtime.with_value(FLOW_ID_KEY, BagValue::FlowId(flow_packet.message_value));

    let ack = combine_u32(ACK_MESSAGE, UNKNOWN_MESSAGE);
    let (runtime, _) = step!(create_and_handle_and_stream_with_value(
        runtime,
        ACTION_RESPONSE,
        ack,
        &packets,
    ));

    let flow = FlowType::try_from(packet.message_value)?;
    let runtime = runtime.with_flow(flow);
    info!(flow_id = flow_packet.message_value, flow = %flow, "accepted flow");
    match flow {
        FlowType::Push => Ok(next(runtime, StateId::ProcessNotifyObjects)),
        FlowType::Pull => Ok(next(runtime, StateId::ProcessRequestObjects)),
        FlowType::Unknown => Err(StateMachineError::UnknownFlowType(flow.value())),
    }
}

async fn request_objects(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, _) = step!(create_and_handle_and_stream(
        runtime,
        REQUEST_CURRENT_OBJECTS_STATE,
        &[],
    ));
    let (runtime, _) = step!(receive_and_handle(runtime, RESPOND_CURRENT_STATE));
    require_flow(&runtime, FlowType::Pull)?;
    Ok(next(runtime, StateId::SubscriberNegotiation))
}

async fn process_request_objects(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, (_, packets)) = step!(receive_and_handle(runtime, REQUEST_CURRENT_OBJECTS_STATE));
    let (runtime, _) = step!(create_and_handle_and_stream(
        runtime,
        RESPOND_CURRENT_STATE,
        &packets,
    ));
    require_flow(&runtime, FlowType::Pull)?;
    Ok(next(runtime, StateId::PublisherNegotiation))
}

async fn notify_objects(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, _) = step!(create_and_handle_and_stream(runtime, NOTIFY_OBJECTS_STATE, &[]));
    let (runtime, _) = step!(receive_and_handle(runtime, RESPOND_CURRENT_STATE));
    require_flow(&runtime, FlowType::Push)?;
    Ok(next(runtime, StateId::PublisherNegotiation))
}

async fn process_notify_objects(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, (_, packets)) = step!(receive_and_handle(runtime, NOTIFY_OBJECTS_STATE));
    let (runtime, _) = step!(create_and_handle_and_stream(
        runtime,
        RESPOND_CURRENT_STATE,
        &packets,
    ));
    require_flow(&runtime, FlowType::Push)?;
    Ok(next(runtime, StateId::SubscriberNegotiation))
}

async fn subscriber_negotiation(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, _) = step!(create_and_handle_and_stream(runtime, NEGOTIATION_REQUEST, &[]));
    let (runtime, (response, _)) = step!(receive_and_handle(runtime, RESPOND_NEGOTIATION_REQUEST));
    if !response.has_ack() {
        return Err(StateMachineError::MissingAck("negotiation"));
    }
    Ok(next(runtime, StateId::SubscriberDataStream))
}

async fn publisher_negotiation(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, (_, packets)) = step!(receive_and_handle(runtime, NEGOTIATION_REQUEST));
    let (runtime, _) = step!(create_and_handle_and_stream(
        runtime,
        RESPOND_NEGOTIATION_REQUEST,
        &packets,
    ));
    Ok(next(runtime, StateId::PublisherDataStream))
}

async fn subscriber_data_stream(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let mut runtime = runtime;
    let mut received = 0usize;
    loop {
        let (next_runtime, (packet, _)) = step!(receive_and_handle(runtime, EXCHANGE_DATA_STREAM));
        runtime = next_runtime;
        received += 1;
        if !packet.has_active_data_stream() {
            break;
        }
    }
    debug!(received, "data stream closed");
    Ok(next(runtime, StateId::SubscriberCommit))
}

async fn publisher_data_stream(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, _) = step!(create_and_handle_and_stream(runtime, EXCHANGE_DATA_STREAM, &[]));
    Ok(next(runtime, StateId::PublisherCommit))
}

async fn subscriber_commit(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, _) = step!(create_and_handle_and_stream(runtime, COMMIT, &[]));
    info!(flow = %runtime.flow(), "subscriber committed");
    Ok(next(runtime, StateId::Final))
}

async fn publisher_commit(
    runtime: StateMachineRuntimeContext,
) -> StateMachineResult<StateTransitionInfo> {
    let (runtime, _) = step!(receive_and_handle(runtime, COMMIT));
    info!(flow = %runtime.flow(), "publisher received commit");
    Ok(next(runtime, StateId::Final))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use notp_objects::{
        Commit, InMemoryObjectStore, Object, ObjectManager, Tree, TreeEntry, ZERO_OID,
    };
    use notp_packets::Packetable;
    use notp_transport::{InMemoryStream, PacketHandler, PacketInspector};

    use crate::bag::Bag;
    use crate::packets::{
        ACTIVE_DATA_STREAM_MESSAGE, COMPLETED_DATA_STREAM_MESSAGE, REJECTED_MESSAGE,
    };
    use crate::payloads::{LocalRefStatePacket, ObjectStatePacket, RemoteRefStatePacket};
    use crate::runtime::{HandlerContext, HostHandlerReturn};

    const STREAM_SIZE: i32 = 3;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    struct Peer {
        transport: TransportLayer,
        sent: Arc<AtomicUsize>,
        received: Arc<AtomicUsize>,
    }

    impl Peer {
        fn new(sender: Arc<InMemoryStream>, receiver: Arc<InMemoryStream>) -> Self {
            let sent = Arc::new(AtomicUsize::new(0));
            let received = Arc::new(AtomicUsize::new(0));
            let on_sent: PacketHandler = {
                let sent = sent.clone();
                Arc::new(move |_: &Packet| {
                    sent.fetch_add(1, Ordering::SeqCst);
                })
            };
            let on_received: PacketHandler = {
                let received = received.clone();
                Arc::new(move |_: &Packet| {
                    received.fetch_add(1, Ordering::SeqCst);
                })
            };
            let inspector = PacketInspector::new(Some(on_sent), Some(on_received)).unwrap();
            Self {
                transport: TransportLayer::new(sender, receiver, Some(inspector)),
                sent,
                received,
            }
        }

        fn counts(&self) -> (usize, usize) {
            (
                self.sent.load(Ordering::SeqCst),
                self.received.load(Ordering::SeqCst),
            )
        }
    }

    /// Follower and leader transports wired to each other's inbox.
    fn connect(timeout: Duration) -> (Peer, Peer) {
        let follower_stream = Arc::new(InMemoryStream::new(timeout));
        let leader_stream = Arc::new(InMemoryStream::new(timeout));
        let follower = Peer::new(leader_stream.clone(), follower_stream.clone());
        let leader = Peer::new(follower_stream, leader_stream);
        (follower, leader)
    }

    #[derive(Clone, Copy, Debug, Default)]
    enum Fault {
        #[default]
        None,
        Terminate(StateId),
        Fail(StateId),
        Reject(StateId),
        ErrorCode(StateId, u16),
    }

    /// Acknowledges everything and streams `STREAM_SIZE + 1` packets when
    /// publishing.
    struct SampleHandler {
        publishes_in: FlowType,
        fault: Fault,
        remaining: Mutex<i32>,
        states: Mutex<Vec<u16>>,
    }

    impl SampleHandler {
        fn new(publishes_in: FlowType) -> Arc<Self> {
            Self::with_fault(publishes_in, Fault::None)
        }

        fn with_fault(publishes_in: FlowType, fault: Fault) -> Arc<Self> {
            Arc::new(Self {
                publishes_in,
                fault,
                remaining: Mutex::new(STREAM_SIZE),
                states: Mutex::new(Vec::new()),
            })
        }

        fn states(&self) -> Vec<u16> {
            self.states.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HostHandler for SampleHandler {
        async fn handle(
            &self,
            ctx: &mut HandlerContext,
            packet: &StatePacket,
            _packets: &[Packet],
        ) -> StateMachineResult<HostHandlerReturn> {
            let state = ctx.current_state_id();
            self.states.lock().unwrap().push(state);
            match self.fault {
                Fault::Terminate(at) if at.id() == state => {
                    return Ok(HostHandlerReturn {
                        terminate: true,
                        ..Default::default()
                    })
                }
                Fault::Fail(at) if at.id() == state => {
                    return Err(StateMachineError::Handler("refused".into()))
                }
                _ => {}
            }

            let mut ret = HostHandlerReturn {
                message_value: combine_u32(ACK_MESSAGE, UNKNOWN_MESSAGE),
                packetables: vec![
                    Box::new(Packet::new(b"sample data".to_vec())) as Box<dyn Packetable>
                ],
                ..Default::default()
            };
            let publishing = ctx.flow() == self.publishes_in;
            if publishing && state == StateId::PublisherDataStream.id() {
                let mut remaining = self.remaining.lock().unwrap();
                if *remaining > 0 {
                    ret.message_value = combine_u32(ACK_MESSAGE, ACTIVE_DATA_STREAM_MESSAGE);
                    ret.has_more = true;
                } else {
                    ret.message_value = combine_u32(ACK_MESSAGE, COMPLETED_DATA_STREAM_MESSAGE);
                }
                *remaining -= 1;
            } else if !publishing && state == StateId::SubscriberDataStream.id() {
                ret.message_value = packet.message_value;
            }

            match self.fault {
                Fault::Reject(at) if at.id() == state => {
                    ret.message_value = combine_u32(REJECTED_MESSAGE, UNKNOWN_MESSAGE);
                }
                Fault::ErrorCode(at, code) if at.id() == state => ret.error_code = code,
                _ => {}
            }
            Ok(ret)
        }
    }

    fn ids(states: &[StateId]) -> Vec<u16> {
        states.iter().map(|s| s.id()).collect()
    }

    #[tokio::test]
    async fn push_flow() {
        init_tracing();
        let (follower_peer, leader_peer) = connect(Duration::from_secs(5));
        let follower_handler = SampleHandler::new(FlowType::Push);
        let leader_handler = SampleHandler::new(FlowType::Pull);
        let follower =
            new_follower_state_machine(follower_handler.clone(), follower_peer.transport.clone())
                .unwrap();
        let leader =
            new_leader_state_machine(leader_handler.clone(), leader_peer.transport.clone())
                .unwrap();

        let (f, l) = tokio::join!(
            follower.run(Bag::new(), FlowType::Push),
            leader.run(Bag::new(), FlowType::Unknown),
        );
        let (f, l) = (f.unwrap(), l.unwrap());

        assert!(f.is_final() && l.is_final());
        assert_eq!(l.flow(), FlowType::Push);
        assert!(f.bag().flow_id().is_some());
        assert_eq!(f.bag().flow_id(), l.bag().flow_id());
        assert_eq!(follower_peer.counts(), (7, 4));
        assert_eq!(leader_peer.counts(), (4, 7));

        use StateId::*;
        assert_eq!(
            follower_handler.states(),
            ids(&[
                NotifyObjects,
                NotifyObjects,
                PublisherNegotiation,
                PublisherNegotiation,
                PublisherDataStream,
                PublisherDataStream,
                PublisherDataStream,
                PublisherDataStream,
                PublisherCommit,
            ])
        );
        assert_eq!(
            leader_handler.states(),
            ids(&[
                ProcessNotifyObjects,
                ProcessNotifyObjects,
                SubscriberNegotiation,
                SubscriberNegotiation,
                SubscriberDataStream,
                SubscriberDataStream,
                SubscriberDataStream,
                SubscriberDataStream,
                SubscriberCommit,
            ])
        );
    }

    #[tokio::test]
    async fn pull_flow() {
        init_tracing();
        let (follower_peer, leader_peer) = connect(Duration::from_secs(5));
        let follower_handler = SampleHandler::new(FlowType::Push);
        let leader_handler = SampleHandler::new(FlowType::Pull);
        let follower =
            new_follower_state_machine(follower_handler.clone(), follower_peer.transport.clone())
                .unwrap();
        let leader =
            new_leader_state_machine(leader_handler.clone(), leader_peer.transport.clone())
                .unwrap();

        let (f, l) = tokio::join!(
            follower.run(Bag::new(), FlowType::Pull),
            leader.run(Bag::new(), FlowType::Unknown),
        );
        let (f, l) = (f.unwrap(), l.unwrap());

        assert_eq!(f.flow(), FlowType::Pull);
        assert_eq!(l.flow(), FlowType::Pull);
        assert_eq!(follower_peer.counts(), (4, 7));
        assert_eq!(leader_peer.counts(), (7, 4));

        use StateId::*;
        assert_eq!(
            follower_handler.states(),
            ids(&[
                RequestObjects,
                RequestObjects,
                SubscriberNegotiation,
                SubscriberNegotiation,
                SubscriberDataStream,
                SubscriberDataStream,
                SubscriberDataStream,
                SubscriberDataStream,
                SubscriberCommit,
            ])
        );
        assert_eq!(
            leader_handler.states(),
            ids(&[
                ProcessRequestObjects,
                ProcessRequestObjects,
                PublisherNegotiation,
                PublisherNegotiation,
                PublisherDataStream,
                PublisherDataStream,
                PublisherDataStream,
                PublisherDataStream,
                PublisherCommit,
            ])
        );
    }

    #[tokio::test]
    async fn rejected_negotiation_is_missing_ack() {
        let (follower_peer, leader_peer) = connect(Duration::from_millis(300));
        let follower_handler =
            SampleHandler::with_fault(FlowType::Push, Fault::Reject(StateId::PublisherNegotiation));
        let follower =
            new_follower_state_machine(follower_handler, follower_peer.transport.clone()).unwrap();
        let leader = new_leader_state_machine(
            SampleHandler::new(FlowType::Pull),
            leader_peer.transport.clone(),
        )
        .unwrap();

        let (f, l) = tokio::join!(
            follower.run(Bag::new(), FlowType::Push),
            leader.run(Bag::new(), FlowType::Unknown),
        );
        assert!(matches!(l, Err(StateMachineError::MissingAck("negotiation"))));
        // The leader stops without a commit, so the follower gives up waiting.
        assert!(matches!(f, Err(StateMachineError::Transport(_))));
    }

    #[tokio::test]
    async fn handler_terminate_ends_both_runs() {
        let (follower_peer, leader_peer) = connect(Duration::from_secs(5));
        let follower_handler = SampleHandler::new(FlowType::Push);
        let leader_handler = SampleHandler::with_fault(
            FlowType::Pull,
            Fault::Terminate(StateId::ProcessNotifyObjects),
        );
        let follower =
            new_follower_state_machine(follower_handler.clone(), follower_peer.transport.clone())
                .unwrap();
        let leader =
            new_leader_state_machine(leader_handler.clone(), leader_peer.transport.clone())
                .unwrap();

        let (f, l) = tokio::join!(
            follower.run(Bag::new(), FlowType::Push),
            leader.run(Bag::new(), FlowType::Unknown),
        );
        assert!(f.unwrap().is_final());
        assert!(l.unwrap().is_final());
        assert_eq!(follower_handler.states(), ids(&[StateId::NotifyObjects]));
        assert_eq!(leader_handler.states(), ids(&[StateId::ProcessNotifyObjects]));
    }

    #[tokio::test]
    async fn handler_error_terminates_the_peer() {
        let (follower_peer, leader_peer) = connect(Duration::from_secs(5));
        let follower_handler =
            SampleHandler::with_fault(FlowType::Push, Fault::Fail(StateId::NotifyObjects));
        let leader_handler = SampleHandler::new(FlowType::Pull);
        let follower =
            new_follower_state_machine(follower_handler, follower_peer.transport.clone()).unwrap();
        let leader =
            new_leader_state_machine(leader_handler.clone(), leader_peer.transport.clone())
                .unwrap();

        let (f, l) = tokio::join!(
            follower.run(Bag::new(), FlowType::Push),
            leader.run(Bag::new(), FlowType::Unknown),
        );
        assert!(matches!(f, Err(StateMachineError::Handler(_))));
        assert!(l.unwrap().is_final());
        assert!(leader_handler.states().is_empty());
    }

    #[tokio::test]
    async fn remote_error_code_aborts_the_receiver() {
        let (follower_peer, leader_peer) = connect(Duration::from_millis(300));
        let follower_handler = SampleHandler::with_fault(
            FlowType::Push,
            Fault::ErrorCode(StateId::NotifyObjects, 7),
        );
        let follower =
            new_follower_state_machine(follower_handler, follower_peer.transport.clone()).unwrap();
        let leader = new_leader_state_machine(
            SampleHandler::new(FlowType::Pull),
            leader_peer.transport.clone(),
        )
        .unwrap();

        let (f, l) = tokio::join!(
            follower.run(Bag::new(), FlowType::Push),
            leader.run(Bag::new(), FlowType::Unknown),
        );
        assert!(matches!(l, Err(StateMachineError::RemoteError { code: 7 })));
        assert!(f.is_err());
    }

    #[tokio::test]
    async fn unknown_flow_type_fails_both_sides() {
        let (follower_peer, leader_peer) = connect(Duration::from_secs(5));
        let follower = new_follower_state_machine(
            SampleHandler::new(FlowType::Push),
            follower_peer.transport.clone(),
        )
        .unwrap();
        let leader = new_leader_state_machine(
            SampleHandler::new(FlowType::Pull),
            leader_peer.transport.clone(),
        )
        .unwrap();

        let (f, l) = tokio::join!(
            follower.run(Bag::new(), FlowType::Unknown),
            leader.run(Bag::new(), FlowType::Unknown),
        );
        assert!(matches!(f, Err(StateMachineError::UnknownFlowType(0))));
        assert!(matches!(l, Err(StateMachineError::UnknownFlowType(0))));
    }

    #[test]
    fn state_ids() {
        for state in StateId::ALL {
            assert_eq!(StateId::from_id(state.id()), Some(state));
        }
        assert_eq!(StateId::from_id(3), None);
        assert_eq!(StateId::Final.id(), FINAL_STATE_ID);
        assert_eq!(StateId::Initial.id(), INITIAL_STATE_ID);
        assert_eq!(StateId::PublisherCommit.id(), 21);
        assert_eq!(StateId::SubscriberDataStream.to_string(), "subscriber-data-stream");
        assert_eq!(ParticipantStateTable.states().len(), 14);
    }

    #[tokio::test]
    async fn table_rejects_unknown_state() {
        let (peer, _) = connect(Duration::from_millis(100));
        let runtime = StateMachineRuntimeContext::new(
            StateId::StartFlow.id(),
            SampleHandler::new(FlowType::Push),
            peer.transport,
        );
        let err = ParticipantStateTable
            .transition(99, runtime)
            .await
            .unwrap_err();
        assert!(matches!(err, StateMachineError::UnknownState(99)));
    }

    /// Pushes a queue of objects, announcing `head` first.
    struct ObjectPublisher {
        head: String,
        queue: Mutex<VecDeque<Object>>,
    }

    #[async_trait]
    impl HostHandler for ObjectPublisher {
        async fn handle(
            &self,
            ctx: &mut HandlerContext,
            packet: &StatePacket,
            packets: &[Packet],
        ) -> StateMachineResult<HostHandlerReturn> {
            let mut ret = HostHandlerReturn {
                message_value: combine_u32(ACK_MESSAGE, UNKNOWN_MESSAGE),
                ..Default::default()
            };
            let state = StateId::from_id(ctx.current_state_id());
            match (state, packet.message_code) {
                (Some(StateId::NotifyObjects), NOTIFY_OBJECTS_STATE) => {
                    ret.packetables.push(Box::new(RemoteRefStatePacket {
                        ref_prev_commit: ZERO_OID.to_string(),
                        ref_commit: self.head.clone(),
                    }));
                }
                (Some(StateId::NotifyObjects), RESPOND_CURRENT_STATE) => {
                    let local: LocalRefStatePacket = convert_packetable(&packets[0])?;
                    ctx.set("remote_up_to_date", local.is_up_to_date);
                }
                (Some(StateId::PublisherDataStream), _) => {
                    let mut queue = self.queue.lock().unwrap();
                    if let Some(object) = queue.pop_front() {
                        let info = ObjectManager::new()
                            .get_object_info(&object)
                            .map_err(|e| StateMachineError::Handler(e.to_string()))?;
                        ret.packetables.push(Box::new(ObjectStatePacket {
                            oid: object.oid().to_string(),
                            otype: info.object_type().to_string(),
                            content: object.into_content(),
                        }));
                    }
                    ret.has_more = !queue.is_empty();
                    let stream = if ret.has_more {
                        ACTIVE_DATA_STREAM_MESSAGE
                    } else {
                        COMPLETED_DATA_STREAM_MESSAGE
                    };
                    ret.message_value = combine_u32(ACK_MESSAGE, stream);
                }
                _ => {}
            }
            Ok(ret)
        }
    }

    /// Stores streamed objects and verifies the announced head on commit.
    #[derive(Default)]
    struct ObjectSubscriber {
        store: InMemoryObjectStore,
    }

    #[async_trait]
    impl HostHandler for ObjectSubscriber {
        async fn handle(
            &self,
            ctx: &mut HandlerContext,
            packet: &StatePacket,
            packets: &[Packet],
        ) -> StateMachineResult<HostHandlerReturn> {
            let mut ret = HostHandlerReturn {
                message_value: combine_u32(ACK_MESSAGE, UNKNOWN_MESSAGE),
                ..Default::default()
            };
            let to_handler_error =
                |e: notp_objects::ObjectError| StateMachineError::Handler(e.to_string());
            match StateId::from_id(ctx.current_state_id()) {
                Some(StateId::ProcessNotifyObjects)
                    if packet.message_code == NOTIFY_OBJECTS_STATE =>
                {
                    let remote: RemoteRefStatePacket = convert_packetable(&packets[0])?;
                    ctx.set("head", remote.ref_commit);
                    ret.packetables.push(Box::new(LocalRefStatePacket {
                        ref_commit: ZERO_OID.to_string(),
                        has_conflicts: false,
                        is_up_to_date: false,
                    }));
                }
                Some(StateId::ProcessNotifyObjects) => {
                    ret.packetables = packets
                        .iter()
                        .map(|p| Box::new(p.clone()) as Box<dyn Packetable>)
                        .collect();
                }
                Some(StateId::SubscriberDataStream) => {
                    for raw in packets {
                        let incoming: ObjectStatePacket = convert_packetable(raw)?;
                        let object = Object::new(incoming.content).map_err(to_handler_error)?;
                        assert_eq!(object.oid(), incoming.oid);
                        self.store.insert(object);
                    }
                    ret.message_value = packet.message_value;
                }
                Some(StateId::SubscriberCommit) => {
                    let head = ctx
                        .get("head")
                        .and_then(BagValue::as_str)
                        .ok_or(StateMachineError::Handler("no head announced".into()))?
                        .to_string();
                    let (matched, history) = ObjectManager::new()
                        .build_commit_history(&head, ZERO_OID, false, &self.store)
                        .map_err(to_handler_error)?;
                    ctx.set("synced", matched);
                    ctx.set("history", history.len() as u64);
                }
                _ => {}
            }
            Ok(ret)
        }
    }

    fn sample_objects() -> (String, Vec<Object>) {
        let manager = ObjectManager::new();
        let mut tree = Tree::new();
        tree.add_entry(
            TreeEntry::new("/", "blob", "abc", "name1", "code1", "policy", "cedar", "*", "policy")
                .unwrap(),
        )
        .unwrap();
        let tree = manager.create_tree_object(&tree).unwrap();
        let first =
            Commit::new(tree.oid(), ZERO_OID, "alice", None, "alice", None, "init").unwrap();
        let first = manager.create_commit_object(&first).unwrap();
        let second =
            Commit::new(tree.oid(), first.oid(), "alice", None, "alice", None, "update").unwrap();
        let second = manager.create_commit_object(&second).unwrap();
        (second.oid().to_string(), vec![tree, first, second])
    }

    #[tokio::test]
    async fn push_objects_end_to_end() {
        init_tracing();
        let (head, objects) = sample_objects();
        let (follower_peer, leader_peer) = connect(Duration::from_secs(5));
        let publisher = Arc::new(ObjectPublisher {
            head: head.clone(),
            queue: Mutex::new(objects.into()),
        });
        let subscriber = Arc::new(ObjectSubscriber::default());
        let follower =
            new_follower_state_machine(publisher, follower_peer.transport.clone()).unwrap();
        let leader =
            new_leader_state_machine(subscriber.clone(), leader_peer.transport.clone()).unwrap();

        let (f, l) = tokio::join!(
            follower.run(Bag::new().with("branch", "main"), FlowType::Push),
            leader.run(Bag::new(), FlowType::Unknown),
        );
        let (f, l) = (f.unwrap(), l.unwrap());

        assert_eq!(f.get("branch").and_then(BagValue::as_str), Some("main"));
        assert_eq!(f.get("remote_up_to_date").and_then(BagValue::as_bool), Some(false));
        assert_eq!(l.get("head").and_then(BagValue::as_str), Some(head.as_str()));
        assert_eq!(l.get("synced").and_then(BagValue::as_bool), Some(true));
        assert_eq!(l.get("history").and_then(BagValue::as_u64), Some(2));
        assert_eq!(subscriber.store.len(), 3);
        assert!(subscriber.store.contains(&head));
        // StartFlow, NotifyObjects, RespondNegotiation and three objects.
        assert_eq!(follower_peer.counts(), (6, 4));
    }
}
