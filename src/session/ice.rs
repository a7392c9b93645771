//! One-shot wait for ICE gathering completion
//!
//! The offer must not be sent until candidate gathering reaches `Complete`.
//! Two hazards make the wait subtle: gathering may already be complete when
//! the wait is installed (the completion event will never fire again), and
//! the state-change callback may report `Complete` more than once. The wait
//! therefore subscribes first, then probes the current state, and routes
//! both paths through a gate that resolves at most once.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::peer_connection::RTCPeerConnection;

/// Single-resolution completion gate
///
/// `fire` may be called any number of times from any thread; only the first
/// call resolves the paired receiver.
pub(crate) struct CompletionGate {
    tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl CompletionGate {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    pub(crate) fn fire(&self) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(());
        }
    }
}

/// Future resolving once the peer connection finishes gathering candidates
///
/// Resolves immediately if gathering is already complete at call time.
pub(crate) fn gathering_complete(pc: &Arc<RTCPeerConnection>) -> oneshot::Receiver<()> {
    let (gate, rx) = CompletionGate::new();

    let gate_cb = Arc::clone(&gate);
    pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
        if state == RTCIceGathererState::Complete {
            gate_cb.fire();
        }
        Box::pin(async {})
    }));

    // Probe after subscribing: a transition between probe and subscribe
    // cannot be missed, and the gate absorbs the duplicate when both paths
    // observe completion.
    if pc.ice_gathering_state() == RTCIceGatheringState::Complete {
        gate.fire();
    }

    rx
}
