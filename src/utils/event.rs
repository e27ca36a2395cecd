use std::collections::VecDeque;

// -------------------------------------------------------------------------------------------------

/// Something that happens at an absolute sample frame.
pub(crate) trait TimedEvent {
    fn frame(&self) -> u64;
}

// -------------------------------------------------------------------------------------------------

/// Frame sorted, bounded event list for real-time threads.
///
/// Implementors provide a preallocated deque. The list never grows past
/// [`queue_capacity`](Self::queue_capacity): pushing into a full list rejects the event.
pub(crate) trait EventQueue {
    type Event: TimedEvent;

    fn queue(&self) -> &VecDeque<Self::Event>;
    fn queue_mut(&mut self) -> &mut VecDeque<Self::Event>;

    fn queue_capacity(&self) -> usize {
        self.queue().capacity()
    }

    /// Distance from `current_frame` to the earliest event, or `usize::MAX` when empty.
    fn frames_until_next(&self, current_frame: u64) -> usize {
        match self.queue().front() {
            Some(event) => event.frame().saturating_sub(current_frame) as usize,
            None => usize::MAX,
        }
    }

    /// Insert behind all events with the same or an earlier frame.
    fn push_sorted(&mut self, event: Self::Event) -> bool {
        if self.queue().len() >= self.queue_capacity() {
            return false;
        }
        let frame = event.frame();
        let queue = self.queue_mut();
        let position = queue.partition_point(|other| other.frame() <= frame);
        queue.insert(position, event);
        true
    }

    /// Remove all events up to and including `current_frame` and hand them to `consumer`.
    fn pop_due<F: FnMut(Self::Event)>(&mut self, current_frame: u64, mut consumer: F) -> usize {
        let mut popped = 0;
        while self
            .queue()
            .front()
            .is_some_and(|event| event.frame() <= current_frame)
        {
            let Some(event) = self.queue_mut().pop_front() else {
                break;
            };
            consumer(event);
            popped += 1;
        }
        popped
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(u64, char);

    impl TimedEvent for Marker {
        fn frame(&self) -> u64 {
            self.0
        }
    }

    struct Markers {
        queue: VecDeque<Marker>,
    }

    impl EventQueue for Markers {
        type Event = Marker;

        fn queue_capacity(&self) -> usize {
            3
        }
        fn queue(&self) -> &VecDeque<Marker> {
            &self.queue
        }
        fn queue_mut(&mut self) -> &mut VecDeque<Marker> {
            &mut self.queue
        }
    }

    #[test]
    fn sorted_and_bounded() {
        let mut markers = Markers {
            queue: VecDeque::with_capacity(3),
        };
        assert_eq!(markers.frames_until_next(10), usize::MAX);
        assert!(markers.push_sorted(Marker(20, 'a')));
        assert!(markers.push_sorted(Marker(5, 'b')));
        assert!(markers.push_sorted(Marker(20, 'c')));
        assert!(!markers.push_sorted(Marker(1, 'd')));
        assert_eq!(markers.frames_until_next(2), 3);
        assert_eq!(markers.frames_until_next(8), 0);

        let mut fired = Vec::new();
        assert_eq!(markers.pop_due(5, |m| fired.push(m.1)), 1);
        assert_eq!(markers.pop_due(20, |m| fired.push(m.1)), 2);
        assert_eq!(fired, vec!['b', 'a', 'c']);
    }
}
