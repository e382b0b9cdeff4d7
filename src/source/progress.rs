//! Optional byte-level progress observation.
//!
//! The reader and writer report byte counts through this hook so progress
//! display stays decoupled from parsing and classification. Purely
//! observational; no return value is consumed.

use std::sync::Arc;

/// Receives `(bytes_processed, bytes_total)` updates per chunk.
///
/// `bytes_total` is `None` when the source size is unknown and progress
/// degrades to an unbounded counter.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, bytes_processed: u64, bytes_total: Option<u64>);
}

/// A shareable progress observer handle.
pub type ProgressObserverRef = Arc<dyn ProgressObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        updates: Mutex<Vec<(u64, Option<u64>)>>,
    }

    impl ProgressObserver for Recorder {
        fn on_progress(&self, bytes_processed: u64, bytes_total: Option<u64>) {
            self.updates
                .lock()
                .unwrap()
                .push((bytes_processed, bytes_total));
        }
    }

    #[test]
    fn test_observer_is_object_safe() {
        let recorder = Arc::new(Recorder {
            updates: Mutex::new(Vec::new()),
        });
        let observer: ProgressObserverRef = recorder.clone();
        observer.on_progress(512, Some(1024));
        assert_eq!(*recorder.updates.lock().unwrap(), vec![(512, Some(1024))]);
    }
}
