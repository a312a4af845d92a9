//! Parameter bridge between the render side and the document.
//!
//! The render side writes changed values into a [`ParameterCell`] without
//! locking; the synchronizer periodically drains the cells and copies the
//! values into Parameter nodes. Values are stored as `f32` bits in atomics.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// One parameter's shared slot.
///
/// Two buffers: `render` holds the value the unit is running with, `document`
/// the value last copied into the tree. `needs_update` is raised by the render
/// side and cleared by whoever drains the cell.
#[derive(Debug)]
pub struct ParameterCell {
    render: AtomicU32,
    document: AtomicU32,
    needs_update: AtomicBool,
}

impl ParameterCell {
    pub fn new(value: f32) -> Self {
        Self {
            render: AtomicU32::new(value.to_bits()),
            document: AtomicU32::new(value.to_bits()),
            needs_update: AtomicBool::new(false),
        }
    }

    /// Document-side write. Does not raise `needs_update`, so the value is
    /// not echoed back into the tree.
    pub fn store(&self, value: f32) {
        self.render.store(value.to_bits(), Ordering::Relaxed);
        self.document.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Render-side write.
    pub fn publish(&self, value: f32) {
        self.render.store(value.to_bits(), Ordering::Relaxed);
        self.needs_update.store(true, Ordering::Release);
    }

    pub fn value(&self) -> f32 {
        f32::from_bits(self.render.load(Ordering::Relaxed))
    }

    pub fn document_value(&self) -> f32 {
        f32::from_bits(self.document.load(Ordering::Relaxed))
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update.load(Ordering::Acquire)
    }

    /// Drain a pending render-side change. `None` when nothing changed since
    /// the last drain or the value settled back to what the document holds.
    pub fn take_update(&self) -> Option<f32> {
        if !self.needs_update.swap(false, Ordering::AcqRel) {
            return None;
        }
        let value = self.render.load(Ordering::Relaxed);
        let previous = self.document.swap(value, Ordering::Relaxed);
        (previous != value).then(|| f32::from_bits(value))
    }
}

/// Flush cadence: fast while changes keep arriving, backing off by doubling
/// toward `max` while idle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveInterval {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl AdaptiveInterval {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn record(&mut self, had_changes: bool) {
        self.current = if had_changes {
            self.min
        } else {
            (self.current * 2).min(self.max)
        };
    }
}

impl Default for AdaptiveInterval {
    fn default() -> Self {
        Self::new(Duration::from_millis(15), Duration::from_millis(250))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn render_writes_are_drained_once() {
        let cell = ParameterCell::new(0.5);
        assert_eq!(cell.take_update(), None);

        cell.publish(0.75);
        assert!(cell.needs_update());
        assert_eq!(cell.take_update(), Some(0.75));
        assert_eq!(cell.take_update(), None);
        assert_eq!(cell.document_value(), 0.75);
    }

    #[test]
    fn document_writes_do_not_echo() {
        let cell = ParameterCell::new(0.0);
        cell.store(0.3);
        assert!(!cell.needs_update());
        assert_eq!(cell.value(), 0.3);

        cell.publish(0.3);
        assert_eq!(cell.take_update(), None);
    }

    #[test]
    fn cell_is_shared_across_threads() {
        let cell = Arc::new(ParameterCell::new(0.0));
        let writer = Arc::clone(&cell);
        std::thread::spawn(move || writer.publish(0.9))
            .join()
            .unwrap();
        assert_eq!(cell.take_update(), Some(0.9));
    }

    #[test]
    fn interval_backs_off_and_snaps_back() {
        let mut interval =
            AdaptiveInterval::new(Duration::from_millis(15), Duration::from_millis(100));
        interval.record(false);
        assert_eq!(interval.current(), Duration::from_millis(30));
        interval.record(false);
        interval.record(false);
        interval.record(false);
        assert_eq!(interval.current(), Duration::from_millis(100));
        interval.record(true);
        assert_eq!(interval.current(), Duration::from_millis(15));
    }
}
