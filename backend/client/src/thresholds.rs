use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

pub const MESSAGE_DURATION: Duration = Duration::from_secs(4);

/// Exact counts that earn a message, least to most urgent.
pub const THRESHOLDS: [(u64, &str); 6] = [
    (15, "Running low on eggs! 🥚"),
    (10, "Only 10 eggs left! Better make them count! 🍳"),
    (5, "Down to 5 eggs! The end is near! 😱"),
    (3, "Just 3 eggs remaining! Choose wisely! 🎯"),
    (2, "Only 2 eggs left! The suspense! 😰"),
    (1, "LAST EGG! Make it count! 🥚💥"),
];

const HIGHEST_THRESHOLD: u64 = THRESHOLDS[0].0;

pub fn message_for(count: u64) -> Option<&'static str> {
    THRESHOLDS
        .iter()
        .find(|(threshold, _)| *threshold == count)
        .map(|(_, message)| *message)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThresholdEvent {
    Show(&'static str),
    /// The count climbed back above every threshold.
    Hide,
}

#[derive(Debug, Default)]
pub struct ThresholdTracker {
    shown: BTreeSet<u64>,
}

impl ThresholdTracker {
    pub fn check(&mut self, count: u64) -> Option<ThresholdEvent> {
        if count > HIGHEST_THRESHOLD {
            self.shown.clear();
            return Some(ThresholdEvent::Hide);
        }

        let message = message_for(count)?;
        self.shown
            .insert(count)
            .then_some(ThresholdEvent::Show(message))
    }

    pub fn reset(&mut self) {
        self.shown.clear();
    }

    pub fn has_shown(&self, count: u64) -> bool {
        self.shown.contains(&count)
    }

    pub fn is_clear(&self) -> bool {
        self.shown.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub message: &'static str,
    pub shown_at: Instant,
}

impl Toast {
    pub fn new(message: &'static str, shown_at: Instant) -> Self {
        Self { message, shown_at }
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) < MESSAGE_DURATION
    }
}
