//! Cancellable, frame-accurate event triggering.
//!
//! The control thread publishes whole phrases as [`ScheduledBatch`]es, cancellation and
//! replacement requests through a single ordered lock-free queue. The render thread applies all
//! messages in order at the start of each callback and then fires due events. Fired events
//! are popped, so an event never fires twice.

use std::{collections::VecDeque, sync::Arc};

use basedrop::{Handle, Owned};
use crossbeam_queue::ArrayQueue;

use super::event::{EventParameters, Phrase, SourceId, VoiceId};
use crate::{
    utils::event::{EventQueue, TimedEvent},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Max number of not yet applied trigger messages.
const TRIGGER_MESSAGE_QUEUE_SIZE: usize = 64;

/// Default number of pending events the render side can hold.
pub const DEFAULT_PENDING_EVENTS: usize = 4096;

// -------------------------------------------------------------------------------------------------

/// An event with an absolute fire time, as passed to the voice layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    /// Absolute sample frame at which the event fires.
    pub fire_frame: u64,
    pub voice: VoiceId,
    pub parameters: EventParameters,
    pub source: SourceId,
    /// Index of the event within its source and phrase.
    pub index: usize,
    pub phrase_index: u64,
}

impl TimedEvent for TriggerEvent {
    fn frame(&self) -> u64 {
        self.fire_frame
    }
}

// -------------------------------------------------------------------------------------------------

/// Events of a single phrase, ready to be inserted into the render side queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledBatch {
    pub phrase_index: u64,
    pub events: Vec<TriggerEvent>,
}

impl ScheduledBatch {
    /// Convert a phrase's relative events to absolute trigger events. Events which
    /// would fire before `from_frame` are skipped.
    pub fn from_phrase(phrase: &Phrase, from_frame: u64) -> Self {
        let events = Self::trigger_events(phrase)
            .filter(|event| event.fire_frame >= from_frame)
            .collect();
        Self {
            phrase_index: phrase.index,
            events,
        }
    }

    /// Collect the events of a single source from all given phrases which fire after
    /// `after_frame`. `phrase_index` is the index of the last phrase.
    pub fn from_source(phrases: &[Phrase], source: SourceId, after_frame: u64) -> Self {
        let events = phrases
            .iter()
            .flat_map(Self::trigger_events)
            .filter(|event| event.source == source && event.fire_frame > after_frame)
            .collect();
        Self {
            phrase_index: phrases.last().map_or(0, |phrase| phrase.index),
            events,
        }
    }

    fn trigger_events(phrase: &Phrase) -> impl Iterator<Item = TriggerEvent> + '_ {
        phrase.events.iter().map(|event| TriggerEvent {
            fire_frame: phrase.start_frame + event.time_offset,
            voice: event.voice,
            parameters: event.parameters,
            source: event.source,
            index: event.index,
            phrase_index: phrase.index,
        })
    }
}

// -------------------------------------------------------------------------------------------------

/// Messages from the control to the render thread.
pub enum TriggerMessage {
    /// Add all events of the batch to the pending events.
    Schedule(Owned<ScheduledBatch>),
    /// Drop pending events of the given source, or of all sources when `None`, which
    /// would fire after `at_frame`.
    Cancel {
        source: Option<SourceId>,
        at_frame: u64,
    },
    /// Drop pending events of the given source which would fire after `at_frame` and
    /// insert the batch's events of that source which fire after `at_frame`. Both use
    /// the same threshold on the render side, so no event can fire twice.
    Replace {
        source: SourceId,
        at_frame: u64,
        batch: Owned<ScheduledBatch>,
    },
}

// -------------------------------------------------------------------------------------------------

/// Counters of a single [`TriggerQueue::apply_messages`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TriggerStats {
    pub scheduled: usize,
    pub cancelled: usize,
    /// Events which got dropped because the pending event queue is full.
    pub dropped: usize,
}

// -------------------------------------------------------------------------------------------------

/// Create a connected trigger sender and render side queue, which can hold up to
/// `pending_capacity` pending events.
pub fn trigger_queue(handle: &Handle, pending_capacity: usize) -> (TriggerSender, TriggerQueue) {
    let messages = Arc::new(ArrayQueue::new(TRIGGER_MESSAGE_QUEUE_SIZE));
    let sender = TriggerSender {
        messages: Arc::clone(&messages),
        handle: handle.clone(),
    };
    let capacity = pending_capacity.max(1);
    let queue = TriggerQueue {
        messages,
        events: VecDeque::with_capacity(capacity),
        capacity,
    };
    (sender, queue)
}

// -------------------------------------------------------------------------------------------------

/// Control thread side of the trigger queue.
pub struct TriggerSender {
    messages: Arc<ArrayQueue<TriggerMessage>>,
    handle: Handle,
}

impl TriggerSender {
    /// Publish all events of the given phrase which fire at or after `from_frame`.
    /// Returns the number of published events.
    pub fn schedule(&self, phrase: &Phrase, from_frame: u64) -> Result<usize, Error> {
        let batch = ScheduledBatch::from_phrase(phrase, from_frame);
        let count = batch.events.len();
        self.messages
            .push(TriggerMessage::Schedule(Owned::new(&self.handle, batch)))
            .map_err(|_| {
                log::warn!("Trigger queue is full: dropping phrase {}", phrase.index);
                Error::QueueFull("trigger")
            })?;
        Ok(count)
    }

    /// Cancel all pending events of the given source which fire after `at_frame`.
    pub fn cancel(&self, source: SourceId, at_frame: u64) -> Result<(), Error> {
        self.push_cancel(Some(source), at_frame)
    }

    /// Replace all pending events of the given source which fire after `at_frame` with the
    /// source's events from the given phrases. Pass no phrases to cancel the source only.
    /// Returns the number of published events.
    pub fn replace(
        &self,
        source: SourceId,
        at_frame: u64,
        phrases: &[Phrase],
    ) -> Result<usize, Error> {
        let batch = ScheduledBatch::from_source(phrases, source, at_frame);
        let count = batch.events.len();
        self.messages
            .push(TriggerMessage::Replace {
                source,
                at_frame,
                batch: Owned::new(&self.handle, batch),
            })
            .map_err(|_| {
                log::warn!("Trigger queue is full: failed to replace events of {source:?}");
                Error::QueueFull("trigger")
            })?;
        Ok(count)
    }

    /// Cancel all pending events of all sources which fire after `at_frame`.
    pub fn cancel_all(&self, at_frame: u64) -> Result<(), Error> {
        self.push_cancel(None, at_frame)
    }

    fn push_cancel(&self, source: Option<SourceId>, at_frame: u64) -> Result<(), Error> {
        self.messages
            .push(TriggerMessage::Cancel { source, at_frame })
            .map_err(|_| {
                log::warn!("Trigger queue is full: failed to cancel events");
                Error::QueueFull("trigger")
            })
    }
}

// -------------------------------------------------------------------------------------------------

/// Render thread side of the trigger queue. Holds pending events, sorted by fire time,
/// in a preallocated deque.
pub struct TriggerQueue {
    messages: Arc<ArrayQueue<TriggerMessage>>,
    events: VecDeque<TriggerEvent>,
    capacity: usize,
}

impl TriggerQueue {
    /// Number of pending, not yet fired events.
    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    /// Apply all queued control messages, in order. Cancellations only drop events
    /// which fire after `max(at_frame, current_frame)`, so events which are already due
    /// still fire. Replacements only insert events after that same frame, so events which
    /// may have fired already are never inserted again.
    pub fn apply_messages(&mut self, current_frame: u64) -> TriggerStats {
        let mut stats = TriggerStats::default();
        while let Some(message) = self.messages.pop() {
            // batch memory is released by the collector
            match message {
                TriggerMessage::Schedule(batch) => {
                    self.insert_events(batch.events.iter(), &mut stats);
                }
                TriggerMessage::Cancel { source, at_frame } => {
                    let threshold = at_frame.max(current_frame);
                    stats.cancelled += self.remove_events_after(source, threshold);
                }
                TriggerMessage::Replace {
                    source,
                    at_frame,
                    batch,
                } => {
                    let threshold = at_frame.max(current_frame);
                    stats.cancelled += self.remove_events_after(Some(source), threshold);
                    let events = batch
                        .events
                        .iter()
                        .filter(|event| event.source == source && event.fire_frame > threshold);
                    self.insert_events(events, &mut stats);
                }
            }
        }
        stats
    }

    fn insert_events<'a>(
        &mut self,
        events: impl Iterator<Item = &'a TriggerEvent>,
        stats: &mut TriggerStats,
    ) {
        for event in events {
            if self.push_sorted(*event) {
                stats.scheduled += 1;
            } else {
                stats.dropped += 1;
            }
        }
    }

    /// Remove events of the given source, or of all sources, which fire after `threshold`.
    fn remove_events_after(&mut self, source: Option<SourceId>, threshold: u64) -> usize {
        let count = self.events.len();
        self.events.retain(|event| {
            event.fire_frame <= threshold || source.is_some_and(|source| source != event.source)
        });
        count - self.events.len()
    }

    /// Frames until the next pending event is due, `usize::MAX` when nothing is pending.
    pub fn frames_until_next_event(&self, current_frame: u64) -> usize {
        self.frames_until_next(current_frame)
    }

    /// Fire all events that are due at `current_frame`, in order.
    /// Returns the number of fired events.
    pub fn fire_due_events<F: FnMut(TriggerEvent)>(&mut self, current_frame: u64, f: F) -> usize {
        self.pop_due(current_frame, f)
    }
}

impl EventQueue for TriggerQueue {
    type Event = TriggerEvent;

    fn queue_capacity(&self) -> usize {
        self.capacity
    }

    fn queue(&self) -> &VecDeque<Self::Event> {
        &self.events
    }

    fn queue_mut(&mut self) -> &mut VecDeque<Self::Event> {
        &mut self.events
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use basedrop::Collector;

    use crate::scheduler::{ScheduledEvent, SCALES};

    fn phrase(index: u64, event_count: usize, spacing: u64) -> Phrase {
        let events = (0..event_count)
            .map(|i| ScheduledEvent {
                time_offset: i as u64 * spacing,
                voice: VoiceId::Pluck,
                parameters: EventParameters {
                    note: 64,
                    velocity: 0.5,
                    timbre: 0.5,
                    micro_timing: 0,
                },
                source: if i % 2 == 0 {
                    SourceId::Lane(0)
                } else {
                    SourceId::Melodic
                },
                index: i,
            })
            .collect();
        Phrase {
            index,
            start_frame: index * event_count as u64 * spacing,
            length_frames: event_count as u64 * spacing,
            scale: &SCALES[0],
            events,
        }
    }

    /// Render `phrase(0, 100, 10)` in blocks of 32 frames, firing events. `control` is
    /// called with the block start frame before each block's messages get applied.
    /// Returns the fired events and the number of cancelled ones.
    fn run_with<F>(mut control: F) -> (Vec<TriggerEvent>, usize)
    where
        F: FnMut(u64, &TriggerSender),
    {
        const BLOCK_SIZE: u64 = 32;
        let collector = Collector::new();
        let (sender, mut queue) = trigger_queue(&collector.handle(), 256);
        sender.schedule(&phrase(0, 100, 10), 0).unwrap();

        let mut fired = Vec::new();
        let mut cancelled = 0;
        let mut frame = 0;
        while frame < 1200 {
            control(frame, &sender);
            cancelled += queue.apply_messages(frame).cancelled;
            for block_frame in frame..frame + BLOCK_SIZE {
                queue.fire_due_events(block_frame, |event| fired.push(event));
            }
            frame += BLOCK_SIZE;
        }
        (fired, cancelled)
    }

    /// Like [`run_with`], sending a lane cancel within the block containing `cancel_sent_at`.
    fn run(cancel_at_frame: u64, cancel_sent_at: u64) -> (Vec<TriggerEvent>, usize) {
        run_with(|frame, sender| {
            if (frame..frame + 32).contains(&cancel_sent_at) {
                sender.cancel(SourceId::Lane(0), cancel_at_frame).unwrap();
            }
        })
    }

    fn assert_unique(fired: &[TriggerEvent]) {
        let mut keys = fired
            .iter()
            .map(|e| (e.phrase_index, e.source, e.index))
            .collect::<Vec<_>>();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), fired.len(), "an event fired more than once");
    }

    #[test]
    fn cancellation_in_time() {
        let (fired, cancelled) = run(500, 100);
        // every event fires at most once
        let mut indices = fired.iter().map(|e| e.index).collect::<Vec<_>>();
        indices.dedup();
        assert_eq!(indices.len(), fired.len());
        assert_eq!(fired.len() + cancelled, 100);
        // lane events up to frame 500 fire, later ones are cancelled
        assert!(fired
            .iter()
            .filter(|e| e.source == SourceId::Lane(0))
            .all(|e| e.fire_frame <= 500));
        assert_eq!(cancelled, 24);
        assert_eq!(
            fired.iter().filter(|e| e.source == SourceId::Melodic).count(),
            50
        );
        assert!(fired.windows(2).all(|w| w[0].fire_frame <= w[1].fire_frame));
    }

    #[test]
    fn late_cancellation() {
        // cancel requested for frame 300, but applied at frame 608: events which already
        // fired stay fired, all later lane events are dropped
        let (fired, cancelled) = run(300, 620);
        assert_eq!(fired.len() + cancelled, 100);
        let lane_events = fired
            .iter()
            .filter(|e| e.source == SourceId::Lane(0))
            .collect::<Vec<_>>();
        assert!(lane_events.iter().all(|e| e.fire_frame <= 600));
        assert_eq!(lane_events.len(), 31);
        assert_eq!(cancelled, 19);
    }

    #[test]
    fn stale_replacement_never_refires() {
        // replacement requested for frame 300, but applied at frame 640: lane events up to
        // frame 640 already fired or are due now and must not be inserted again
        let (fired, cancelled) = run_with(|frame, sender| {
            if frame == 640 {
                let count = sender
                    .replace(SourceId::Lane(0), 300, &[phrase(0, 100, 10)])
                    .unwrap();
                assert_eq!(count, 34);
            }
        });
        assert_unique(&fired);
        assert_eq!(fired.len(), 100);
        assert_eq!(cancelled, 17);
        assert!(fired.windows(2).all(|w| w[0].fire_frame <= w[1].fire_frame));
    }

    #[test]
    fn disable_and_reenable() {
        let (fired, _) = run_with(|frame, sender| {
            if frame == 96 {
                // disabled at 300, sent early
                sender.replace(SourceId::Lane(0), 300, &[]).unwrap();
            } else if frame == 704 {
                // re-enabled at 500, applied late at 704
                sender
                    .replace(SourceId::Lane(0), 500, &[phrase(0, 100, 10)])
                    .unwrap();
            }
        });
        assert_unique(&fired);
        let lane_frames = fired
            .iter()
            .filter(|e| e.source == SourceId::Lane(0))
            .map(|e| e.fire_frame)
            .collect::<Vec<_>>();
        assert!(lane_frames.iter().all(|f| *f <= 300 || *f > 704));
        assert_eq!(lane_frames.len(), 16 + 14);
        assert_eq!(
            fired.iter().filter(|e| e.source == SourceId::Melodic).count(),
            50
        );
    }

    #[test]
    fn cancel_all_sources() {
        let collector = Collector::new();
        let (sender, mut queue) = trigger_queue(&collector.handle(), 256);
        sender.schedule(&phrase(0, 10, 100), 0).unwrap();
        sender.cancel_all(250).unwrap();
        let stats = queue.apply_messages(0);
        assert_eq!(stats.scheduled, 10);
        assert_eq!(stats.cancelled, 7);
        assert_eq!(queue.pending_count(), 3);
        assert_eq!(queue.frames_until_next_event(0), 0);
        assert_eq!(queue.fire_due_events(1000, |_| ()), 3);
        assert_eq!(queue.frames_until_next_event(0), usize::MAX);
    }

    #[test]
    fn overflow_drops_events() {
        let mut collector = Collector::new();
        let (sender, mut queue) = trigger_queue(&collector.handle(), 8);
        // events before the given start frame are not published
        assert_eq!(sender.schedule(&phrase(0, 20, 10), 50).unwrap(), 15);
        let stats = queue.apply_messages(0);
        assert_eq!(stats.scheduled, 8);
        assert_eq!(stats.dropped, 7);
        assert_eq!(queue.pending_count(), 8);

        for _ in 0..TRIGGER_MESSAGE_QUEUE_SIZE {
            sender.cancel_all(0).unwrap();
        }
        assert_eq!(sender.cancel_all(0), Err(Error::QueueFull("trigger")));

        drop(sender);
        drop(queue);
        collector.collect();
        assert_eq!(collector.alloc_count(), 0);
    }
}
