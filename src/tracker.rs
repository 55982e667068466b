use crate::error::{Result, SonoraError};
use crate::ids::{EventHandle, FileHandle};

/// Entity an in-flight event instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// A [`TriggerEvent`](crate::TriggerEvent) created by a start trigger
    Trigger(EventHandle),
    /// The programmer-sound event of a standalone file
    ProgrammerSound(FileHandle),
}

/// Event instances that were created but are not attached to their object yet.
///
/// Owned and mutated by the owning thread only. Engine callbacks never reach it.
#[derive(Debug, Default)]
pub struct PendingEventTracker {
    pending: Vec<EventKey>,
}

impl PendingEventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracking the same event twice means its lifecycle was mismanaged upstream.
    pub fn track(&mut self, key: EventKey) -> Result<()> {
        if self.pending.contains(&key) {
            return Err(SonoraError::ProtocolViolation(format!(
                "{:?} is already pending",
                key
            )));
        }
        self.pending.push(key);
        Ok(())
    }

    /// Returns false when the key was not pending.
    pub fn untrack(&mut self, key: EventKey) -> bool {
        match self.pending.iter().position(|pending| *pending == key) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Offers every pending event to `finalize` and drops the ones it accepts.
    ///
    /// Returns how many were finalized. The rest stay for the next tick.
    pub fn drain(&mut self, mut finalize: impl FnMut(EventKey) -> bool) -> usize {
        let before = self.pending.len();
        self.pending.retain(|key| !finalize(*key));
        before - self.pending.len()
    }

    pub fn contains(&self, key: EventKey) -> bool {
        self.pending.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_tracking_fails() {
        let mut tracker = PendingEventTracker::new();
        tracker.track(EventKey::Trigger(EventHandle(1))).unwrap();
        assert!(tracker.track(EventKey::Trigger(EventHandle(1))).is_err());
        tracker.track(EventKey::ProgrammerSound(FileHandle(1))).unwrap();
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_untrack_absent_is_noop() {
        let mut tracker = PendingEventTracker::new();
        tracker.track(EventKey::Trigger(EventHandle(1))).unwrap();
        assert!(!tracker.untrack(EventKey::Trigger(EventHandle(2))));
        assert!(tracker.untrack(EventKey::Trigger(EventHandle(1))));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_drain_keeps_unfinalized() {
        let mut tracker = PendingEventTracker::new();
        for handle in 1..=3 {
            tracker.track(EventKey::Trigger(EventHandle(handle))).unwrap();
        }

        let finalized = tracker.drain(|key| key == EventKey::Trigger(EventHandle(2)));
        assert_eq!(finalized, 1);
        assert!(tracker.contains(EventKey::Trigger(EventHandle(1))));
        assert!(!tracker.contains(EventKey::Trigger(EventHandle(2))));

        assert_eq!(tracker.drain(|_| false), 0);
        assert_eq!(tracker.drain(|_| true), 2);
        assert!(tracker.is_empty());
    }
}
