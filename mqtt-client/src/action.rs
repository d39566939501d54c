use mqtt_core::{Frame, PacketId};

use crate::event::Event;

/// Describes what the engine must do in response to a stimulus. Handlers (spec §4.3) build
/// these but never execute them — only `Engine::dispatch` has access to the transport, timer,
/// and client sink needed to carry an action out.
///
/// Shaped after rumq's `(Notification, Option<Packet>)` handler return pair
/// (`examples/other_examples/.../rumq-client-src-eventloop.rs.rs`), generalized into a full sum
/// type so a single stimulus can require several distinct effects (e.g. writing a frame *and*
/// arming a timer *and* updating in-flight bookkeeping).
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Sequence(Vec<Action>),
    SendToNetwork(Frame),
    SendToClient(Event),
    SetKeepAlive(u64),
    StartPingRespTimer(u64),
    SetPendingPingResponse(bool),
    ForciblyCloseTransport,
    StoreSentInFlightFrame(PacketId, Frame),
    RemoveSentInFlightFrame(PacketId),
    StoreRecvInFlightFrameId(PacketId),
    RemoveRecvInFlightFrameId(PacketId),
    /// No effect. Used instead of `Option<Action>` so handlers always return one value.
    Noop,
}

impl Action {
    pub fn seq(actions: impl IntoIterator<Item = Action>) -> Action {
        let actions: Vec<Action> = actions.into_iter().filter(|a| *a != Action::Noop).collect();
        match actions.len() {
            0 => Action::Noop,
            1 => actions.into_iter().next().unwrap(),
            _ => Action::Sequence(actions),
        }
    }

    /// Flattens nested `Sequence`/`Noop` into a single action list, in execution order.
    pub fn flatten(self) -> Vec<Action> {
        match self {
            Action::Noop => vec![],
            Action::Sequence(actions) => actions.into_iter().flat_map(Action::flatten).collect(),
            other => vec![other],
        }
    }
}
