//! Create/send and receive/handle steps shared by every transition.

use notp_packets::{combine_u32, convert_packetable, Packet, Packetable};
use tracing::{debug, warn};

use crate::error::{StateMachineError, StateMachineResult};
use crate::packets::{StatePacket, ACTION_RESPONSE, START_FLOW, TERMINATE_MESSAGE, UNKNOWN_MESSAGE};
use crate::runtime::StateMachineRuntimeContext;

/// Result of an exchange step.
#[derive(Debug)]
pub enum Step<T> {
    Next(StateMachineRuntimeContext, T),
    /// The run ends gracefully; the peer has been told or told us.
    Terminated(StateMachineRuntimeContext),
}

/// Packet produced for one outgoing message.
#[derive(Debug)]
pub struct Created {
    pub packet: StatePacket,
    pub packetables: Vec<Box<dyn Packetable>>,
    pub has_more: bool,
}

/// Flow control messages never reach the host handler.
pub fn should_handle(message_code: u16) -> bool {
    message_code != START_FLOW && message_code != ACTION_RESPONSE
}

fn boxed(packets: &[Packet]) -> Vec<Box<dyn Packetable>> {
    packets
        .iter()
        .map(|p| Box::new(p.clone()) as Box<dyn Packetable>)
        .collect()
}

/// Build a state packet, letting the host handler fill in its value and
/// payload.
pub async fn create_and_handle(
    runtime: StateMachineRuntimeContext,
    message_code: u16,
    message_value: u64,
    packets: &[Packet],
) -> StateMachineResult<Step<Created>> {
    let mut packet = StatePacket::new(message_code, message_value, 0);
    if !should_handle(message_code) {
        let created = Created {
            packet,
            packetables: boxed(packets),
            has_more: false,
        };
        return Ok(Step::Next(runtime, created));
    }

    let mut ctx = runtime.handler_context();
    let result = runtime.handle_stream(&mut ctx, &packet, packets).await;
    let runtime = runtime.with_bag(ctx.into_bag());
    let ret = match result {
        Ok(ret) => ret,
        Err(err) => {
            warn!(error = %err, state = runtime.current_state_id(), "host handler failed");
            notify_termination(&runtime).await;
            return Err(err);
        }
    };
    if ret.terminate {
        debug!(code = message_code, "host handler terminated the run");
        notify_termination(&runtime).await;
        return Ok(Step::Terminated(runtime));
    }
    packet.message_value = ret.message_value;
    packet.error_code = ret.error_code;
    let created = Created {
        packet,
        packetables: ret.packetables,
        has_more: ret.has_more,
    };
    Ok(Step::Next(runtime, created))
}

/// Create and send packets for `message_code` until the host handler has
/// nothing more. Returns the last packet sent.
pub async fn create_and_handle_and_stream(
    runtime: StateMachineRuntimeContext,
    message_code: u16,
    packets: &[Packet],
) -> StateMachineResult<Step<StatePacket>> {
    let value = combine_u32(UNKNOWN_MESSAGE, UNKNOWN_MESSAGE);
    create_and_handle_and_stream_with_value(runtime, message_code, value, packets).await
}

/// Like [`create_and_handle_and_stream`] with an explicit starting message value.
pub async fn create_and_handle_and_stream_with_value(
    runtime: StateMachineRuntimeContext,
    message_code: u16,
    message_value: u64,
    packets: &[Packet],
) -> StateMachineResult<Step<StatePacket>> {
    let mut runtime = runtime;
    loop {
        let step = create_and_handle(runtime, message_code, message_value, packets).await?;
        let created = match step {
            Step::Next(next, created) => {
                runtime = next;
                created
            }
            Step::Terminated(next) => return Ok(Step::Terminated(next)),
        };

        let mut stream: Vec<Box<dyn Packetable>> =
            Vec::with_capacity(created.packetables.len() + 1);
        stream.push(Box::new(created.packet));
        stream.extend(created.packetables);
        if let Err(err) = runtime.send_stream(&stream).await {
            notify_termination(&runtime).await;
            return Err(err);
        }
        debug!(
            code = message_code,
            value = created.packet.message_value,
            packets = stream.len(),
            "sent state packet"
        );
        if !created.has_more {
            return Ok(Step::Next(runtime, created.packet));
        }
    }
}

/// Tell the peer to end its run.
pub async fn send_termination(runtime: &StateMachineRuntimeContext) -> StateMachineResult<()> {
    runtime.send(Box::new(StatePacket::terminate())).await
}

/// [`send_termination`] for paths that are already ending; failures are
/// only logged.
async fn notify_termination(runtime: &StateMachineRuntimeContext) {
    if let Err(err) = send_termination(runtime).await {
        warn!(error = %err, state = runtime.current_state_id(), "failed to send termination");
    }
}

/// Receive a frame led by `expected` and pass it through the host handler.
///
/// Returns the state packet (with the handler's value and error code when
/// handled) and the payload packets that follow it.
pub async fn receive_and_handle(
    runtime: StateMachineRuntimeContext,
    expected: u16,
) -> StateMachineResult<Step<(StatePacket, Vec<Packet>)>> {
    let mut packets = runtime.receive_stream().await?;
    if packets.is_empty() {
        return Err(StateMachineError::MissingPacket("state"));
    }
    let payload = packets.split_off(1);
    let mut packet: StatePacket = convert_packetable(&packets[0])?;
    if packet.has_error() {
        return Err(StateMachineError::RemoteError {
            code: packet.error_code,
        });
    }
    if packet.message_code == TERMINATE_MESSAGE {
        warn!(
            expected,
            state = runtime.current_state_id(),
            "peer terminated the run"
        );
        return Ok(Step::Terminated(runtime));
    }
    if packet.message_code != expected {
        return Err(StateMachineError::UnexpectedMessage {
            expected,
            actual: packet.message_code,
        });
    }
    debug!(
        code = packet.message_code,
        value = packet.message_value,
        packets = payload.len(),
        "received state packet"
    );
    if !should_handle(packet.message_code) {
        return Ok(Step::Next(runtime, (packet, payload)));
    }

    let mut ctx = runtime.handler_context();
    let result = runtime.handle_stream(&mut ctx, &packet, &payload).await;
    let runtime = runtime.with_bag(ctx.into_bag());
    let ret = match result {
        Ok(ret) => ret,
        Err(err) => {
            warn!(error = %err, state = runtime.current_state_id(), "host handler failed");
            notify_termination(&runtime).await;
            return Err(err);
        }
    };
    if ret.terminate {
        debug!(code = expected, "host handler terminated the run");
        notify_termination(&runtime).await;
        return Ok(Step::Terminated(runtime));
    }
    packet.message_value = ret.message_value;
    packet.error_code = ret.error_code;
    let handled = ret
        .packetables
        .iter()
        .map(|p| Packet::from_packetable(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Step::Next(runtime, (packet, handled)))
}
