//! Single producer, single consumer parameter snapshot channel.
//!
//! The control thread publishes complete, immutable parameter snapshots. The real-time
//! thread picks up the newest one without ever blocking or freeing memory: replaced
//! snapshots are handed back to a [`basedrop::Collector`], which frees them on the
//! control thread when it gets collected.

use std::sync::Arc;

use basedrop::{Handle, Owned};
use crossbeam_queue::ArrayQueue;

// -------------------------------------------------------------------------------------------------

/// Number of not yet consumed snapshots which may be queued. When the render thread is
/// slower than the control thread, the oldest pending snapshot gets replaced.
const SNAPSHOT_QUEUE_SIZE: usize = 4;

// -------------------------------------------------------------------------------------------------

/// Create a new snapshot channel with the given initial value.
pub fn snapshot_channel<T: Send + 'static>(
    handle: &Handle,
    initial: T,
) -> (SnapshotSender<T>, SnapshotReceiver<T>) {
    let queue = Arc::new(ArrayQueue::new(SNAPSHOT_QUEUE_SIZE));
    let sender = SnapshotSender {
        queue: Arc::clone(&queue),
        handle: handle.clone(),
    };
    let receiver = SnapshotReceiver {
        queue,
        current: Owned::new(handle, initial),
    };
    (sender, receiver)
}

// -------------------------------------------------------------------------------------------------

/// Control thread side of a snapshot channel.
pub struct SnapshotSender<T: Send + 'static> {
    queue: Arc<ArrayQueue<Owned<T>>>,
    handle: Handle,
}

impl<T: Send + 'static> SnapshotSender<T> {
    /// Publish a new snapshot. Returns true if an older, not yet consumed snapshot
    /// got replaced.
    pub fn send(&self, snapshot: T) -> bool {
        let owned = Owned::new(&self.handle, snapshot);
        self.queue.force_push(owned).is_some()
    }
}

// -------------------------------------------------------------------------------------------------

/// Real-time thread side of a snapshot channel.
pub struct SnapshotReceiver<T: Send + 'static> {
    queue: Arc<ArrayQueue<Owned<T>>>,
    current: Owned<T>,
}

impl<T: Send + 'static> SnapshotReceiver<T> {
    /// Fetch the newest published snapshot, if any. Returns true when the current
    /// snapshot changed.
    pub fn update(&mut self) -> bool {
        let mut changed = false;
        while let Some(snapshot) = self.queue.pop() {
            // old snapshot is passed to the collector, not freed here
            self.current = snapshot;
            changed = true;
        }
        changed
    }

    /// Access the current snapshot.
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Fetch the newest published snapshot and return it.
    pub fn latest(&mut self) -> &T {
        self.update();
        &self.current
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use basedrop::Collector;

    #[test]
    fn latest_snapshot_wins() {
        let mut collector = Collector::new();
        let (sender, mut receiver) = snapshot_channel(&collector.handle(), 0_u32);
        assert_eq!(*receiver.current(), 0);
        assert!(!receiver.update());

        for value in 1..=10 {
            sender.send(value);
        }
        assert!(receiver.update());
        assert_eq!(*receiver.current(), 10);
        assert!(!receiver.update());

        sender.send(11);
        assert_eq!(*receiver.latest(), 11);

        drop(sender);
        drop(receiver);
        collector.collect();
        assert_eq!(collector.alloc_count(), 0);
    }

    #[test]
    fn crosses_threads() {
        let collector = Collector::new();
        let (sender, mut receiver) = snapshot_channel(&collector.handle(), vec![0.0_f32; 4]);
        let thread = std::thread::spawn(move || {
            while receiver.current()[0] < 1.0 {
                receiver.update();
                std::thread::yield_now();
            }
            receiver.current().clone()
        });
        sender.send(vec![1.0; 4]);
        let received = thread.join().unwrap();
        assert_eq!(received, vec![1.0; 4]);
    }
}
