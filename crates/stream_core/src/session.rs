//! Single-slot ownership of the active stream of a logical session

use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Ownership of one stream. Dropping the ticket does not cancel the stream;
/// the slot decides when a ticket is superseded.
#[derive(Debug, Clone)]
pub struct StreamTicket {
    id: u64,
    token: CancellationToken,
}

impl StreamTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token observed by the pipeline running this stream
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Default)]
struct SlotState {
    next_id: u64,
    active: Option<StreamTicket>,
}

/// Holds at most one active stream; beginning a new one cancels the previous
#[derive(Debug, Clone, Default)]
pub struct StreamSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl StreamSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SlotState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel any in-flight stream and take ownership of the slot
    pub fn begin(&self) -> StreamTicket {
        let mut state = self.state();
        if let Some(previous) = state.active.take() {
            debug!("Superseding stream {}", previous.id);
            previous.token.cancel();
        }
        state.next_id += 1;
        let ticket = StreamTicket {
            id: state.next_id,
            token: CancellationToken::new(),
        };
        state.active = Some(ticket.clone());
        ticket
    }

    /// Clear the slot if `ticket` still owns it; returns whether it did
    pub fn release(&self, ticket: &StreamTicket) -> bool {
        let mut state = self.state();
        match &state.active {
            Some(active) if active.id == ticket.id => {
                state.active = None;
                true
            }
            _ => false,
        }
    }

    /// Cancel the active stream, if any
    pub fn cancel(&self) -> bool {
        match self.state().active.take() {
            Some(active) => {
                debug!("Cancelling stream {}", active.id);
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_current(&self, ticket: &StreamTicket) -> bool {
        matches!(&self.state().active, Some(active) if active.id == ticket.id)
    }

    pub fn is_active(&self) -> bool {
        self.state().active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_cancels_previous() {
        let slot = StreamSlot::new();
        let first = slot.begin();
        assert!(slot.is_current(&first));

        let second = slot.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!slot.is_current(&first));
        assert!(slot.is_current(&second));
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_stale_release_keeps_newer_stream() {
        let slot = StreamSlot::new();
        let first = slot.begin();
        let second = slot.begin();

        assert!(!slot.release(&first));
        assert!(slot.is_active());
        assert!(slot.release(&second));
        assert!(!slot.is_active());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_cancel_active() {
        let slot = StreamSlot::new();
        assert!(!slot.cancel());
        let ticket = slot.begin();
        assert!(slot.cancel());
        assert!(ticket.is_cancelled());
        assert!(!slot.is_active());
    }

    #[test]
    fn test_clones_share_the_slot() {
        let slot = StreamSlot::new();
        let other = slot.clone();
        let ticket = slot.begin();
        other.begin();
        assert!(ticket.is_cancelled());
    }
}
