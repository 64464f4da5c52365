use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Single-slot trigger channel.
///
/// Raising an already-raised slot is a no-op: at most one pulse is buffered. `take`
/// clears the slot atomically, so exactly one consumer observes each pulse.
#[derive(Clone, Debug, Default)]
pub struct PulseSlot {
    raised: Arc<AtomicBool>,
}

impl PulseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Consumes the buffered pulse, if any.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_at_most_once() {
        let slot = PulseSlot::new();
        slot.raise();
        slot.raise();
        assert!(slot.take());
        assert!(!slot.take());
    }

    #[test]
    fn clones_share_the_slot() {
        let slot = PulseSlot::new();
        let input = slot.clone();
        input.raise();
        assert!(slot.is_raised());
        slot.clear();
        assert!(!input.is_raised());
    }

    #[test]
    fn raise_from_another_thread() {
        let slot = PulseSlot::new();
        let remote = slot.clone();
        std::thread::spawn(move || remote.raise()).join().unwrap();
        assert!(slot.take());
    }
}
