//! # Egg Session
//!
//! Everything one open counter view knows: the local count, its egg grid, which
//! threshold messages were already shown, the current toast and the sync flags.
//! Nothing here touches the network. [`crate::engine::SyncEngine`] owns a session
//! and feeds it user input, save results and poll results.
//!
//! ## Sync flags
//! - `saving` is a busy flag, not a lock. A save asked for while one is in
//!   flight is dropped
//! - `polling` keeps poll ticks from stacking up behind a slow server
//! - A poll result is ignored while a save is in flight or when it matches the
//!   local count
//! - A failed save marks the session degraded until the next save succeeds
//!
//! The count itself is unbounded. The grid only draws the first
//! [`MAX_RENDERED_EGGS`], changes above that move the count and leave the grid full.

use std::{fmt, time::Instant};

use tracing::debug;

use crate::{
    grid::{EggGrid, EggId, MAX_RENDERED_EGGS, Removal, rendered},
    thresholds::{ThresholdEvent, ThresholdTracker, Toast},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Saving,
    Polling,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Saving => write!(f, "saving"),
            SyncState::Polling => write!(f, "polling"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub count: u64,
    pub threshold: Option<ThresholdEvent>,
}

#[derive(Debug, Default)]
pub struct EggSession {
    count: u64,
    grid: EggGrid,
    thresholds: ThresholdTracker,
    toast: Option<Toast>,
    saving: bool,
    polling: bool,
    save_failed: bool,
}

impl EggSession {
    /// Fresh session showing `count`. The count is not written back.
    pub fn load(count: u64, now: Instant) -> (Self, Update) {
        let mut session = Self {
            count,
            grid: EggGrid::with_count(count),
            ..Self::default()
        };

        let threshold = session.check_thresholds(now);
        (session, Update { count, threshold })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn grid(&self) -> &EggGrid {
        &self.grid
    }

    pub fn thresholds(&self) -> &ThresholdTracker {
        &self.thresholds
    }

    fn check_thresholds(&mut self, now: Instant) -> Option<ThresholdEvent> {
        let event = self.thresholds.check(self.count);

        match &event {
            Some(ThresholdEvent::Show(message)) => self.toast = Some(Toast::new(*message, now)),
            Some(ThresholdEvent::Hide) => self.toast = None,
            None => {}
        }

        event
    }

    pub fn increase(&mut self, now: Instant) -> Update {
        self.count = self.count.saturating_add(1);
        if self.grid.len() < rendered(self.count) {
            self.grid.push();
        }

        Update {
            count: self.count,
            threshold: self.check_thresholds(now),
        }
    }

    /// Takes the newest egg. `None` once the carton is empty, no removal while
    /// the count is still above what the grid draws.
    pub fn decrease(&mut self, now: Instant) -> Option<(Update, Option<Removal>)> {
        if self.count > MAX_RENDERED_EGGS {
            self.count -= 1;
            let update = Update {
                count: self.count,
                threshold: self.check_thresholds(now),
            };
            return Some((update, None));
        }

        let last = self.grid.last()?;
        self.remove_egg(last, now)
            .map(|(update, removal)| (update, Some(removal)))
    }

    pub fn remove_egg(&mut self, id: EggId, now: Instant) -> Option<(Update, Removal)> {
        if self.count == 0 {
            return None;
        }

        let removal = self.grid.remove(id)?;
        self.count -= 1;
        if self.grid.len() < rendered(self.count) {
            self.grid.push();
        }

        let update = Update {
            count: self.count,
            threshold: self.check_thresholds(now),
        };
        Some((update, removal))
    }

    /// The count to send, or `None` when a save is already in flight.
    pub fn begin_save(&mut self) -> Option<u64> {
        if self.saving {
            debug!("Save already in flight, dropping save of {}", self.count);
            return None;
        }

        self.saving = true;
        Some(self.count)
    }

    pub fn finish_save(&mut self, succeeded: bool) {
        self.saving = false;
        self.save_failed = !succeeded;
    }

    pub fn begin_poll(&mut self) -> bool {
        if self.polling {
            return false;
        }

        self.polling = true;
        true
    }

    /// Adopts the server count unless a save is in flight or nothing changed.
    pub fn finish_poll(&mut self, server_count: u64, now: Instant) -> Option<Update> {
        self.polling = false;

        if self.saving || server_count == self.count {
            return None;
        }

        self.count = server_count;
        self.thresholds.reset();
        self.grid.rebuild(server_count);

        Some(Update {
            count: server_count,
            threshold: self.check_thresholds(now),
        })
    }

    pub fn abandon_poll(&mut self) {
        self.polling = false;
    }

    /// Rebuilds the grid if it drifted from the count.
    pub fn heal(&mut self) -> bool {
        self.grid.reconcile(self.count)
    }

    pub fn is_degraded(&self) -> bool {
        self.save_failed
    }

    pub fn visible_message(&self, now: Instant) -> Option<&'static str> {
        self.toast
            .as_ref()
            .filter(|toast| toast.is_visible(now))
            .map(|toast| toast.message)
    }

    pub fn state(&self) -> SyncState {
        if self.saving {
            SyncState::Saving
        } else if self.polling {
            SyncState::Polling
        } else {
            SyncState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::thresholds::MESSAGE_DURATION;

    const LOW: &str = "Running low on eggs! 🥚";

    #[test]
    fn test_descend_to_fifteen_then_rise() {
        let now = Instant::now();
        let (mut session, update) = EggSession::load(55, now);
        assert_eq!(update.threshold, Some(ThresholdEvent::Hide));

        let mut shown = Vec::new();
        for _ in 0..40 {
            let (update, _) = session.decrease(now).unwrap();
            if let Some(ThresholdEvent::Show(message)) = update.threshold {
                shown.push(message);
            }
        }

        assert_eq!(session.count(), 15);
        assert_eq!(session.grid().len(), 15);
        assert_eq!(shown, vec![LOW]);
        assert_eq!(session.visible_message(now), Some(LOW));

        let update = session.increase(now);
        assert_eq!(update.count, 16);
        assert_eq!(update.threshold, Some(ThresholdEvent::Hide));
        assert!(session.thresholds().is_clear());
        assert_eq!(session.visible_message(now), None);
    }

    #[test]
    fn test_load_below_threshold_shows_message() {
        let now = Instant::now();
        let (session, update) = EggSession::load(5, now);

        assert_eq!(
            update.threshold,
            Some(ThresholdEvent::Show("Down to 5 eggs! The end is near! 😱"))
        );
        assert!(session.visible_message(now).is_some());
        assert!(
            session
                .visible_message(now + MESSAGE_DURATION + Duration::from_millis(1))
                .is_none()
        );
    }

    #[test]
    fn test_cannot_go_below_zero() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(1, now);

        assert!(session.decrease(now).is_some());
        assert!(session.decrease(now).is_none());
        assert_eq!(session.count(), 0);
    }

    #[test]
    fn test_clicked_egg_is_removed_once() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(8, now);
        let first = session.grid().eggs()[0].id;

        let (update, removal) = session.remove_egg(first, now).unwrap();
        assert_eq!(update.count, 7);
        assert_eq!(removal.shifted.len(), 7);

        assert!(session.remove_egg(first, now).is_none());
        assert_eq!(session.count(), 7);
    }

    #[test]
    fn test_huge_server_count_keeps_grid_bounded() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(20, now);

        assert!(session.begin_poll());
        let update = session.finish_poll(1 << 40, now).unwrap();
        assert_eq!(update.count, 1 << 40);
        assert_eq!(session.count(), 1 << 40);
        assert_eq!(session.grid().len() as u64, MAX_RENDERED_EGGS);

        let (update, removal) = session.decrease(now).unwrap();
        assert_eq!(update.count, (1 << 40) - 1);
        assert!(removal.is_none());
        assert_eq!(session.grid().len() as u64, MAX_RENDERED_EGGS);
        assert!(!session.heal());
    }

    #[test]
    fn test_increase_saturates() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(u64::MAX, now);

        assert_eq!(session.increase(now).count, u64::MAX);
        assert_eq!(session.grid().len() as u64, MAX_RENDERED_EGGS);
    }

    #[test]
    fn test_click_above_cap_refills_grid() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(MAX_RENDERED_EGGS + 1, now);
        let first = session.grid().eggs()[0].id;

        let (update, removal) = session.remove_egg(first, now).unwrap();
        assert_eq!(update.count, MAX_RENDERED_EGGS);
        assert_eq!(removal.removed, first);
        assert_eq!(session.grid().len() as u64, MAX_RENDERED_EGGS);

        let (_, removal) = session.decrease(now).unwrap();
        assert!(removal.is_some());
        assert_eq!(session.grid().len() as u64, MAX_RENDERED_EGGS - 1);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SyncState::Idle.to_string(), "idle");
        assert_eq!(SyncState::Saving.to_string(), "saving");
        assert_eq!(SyncState::Polling.to_string(), "polling");
    }

    #[test]
    fn test_second_save_is_dropped() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(20, now);

        session.increase(now);
        assert_eq!(session.begin_save(), Some(21));
        assert_eq!(session.state(), SyncState::Saving);

        session.increase(now);
        assert_eq!(session.begin_save(), None);

        session.finish_save(true);
        assert_eq!(session.state(), SyncState::Idle);
        assert!(!session.is_degraded());
    }

    #[test]
    fn test_failed_save_degrades_until_next_success() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(20, now);

        session.begin_save();
        session.finish_save(false);
        assert!(session.is_degraded());

        session.begin_save();
        session.finish_save(true);
        assert!(!session.is_degraded());
    }

    #[test]
    fn test_poll_ignored_while_saving() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(20, now);

        session.begin_save();
        assert!(session.begin_poll());
        assert!(session.finish_poll(3, now).is_none());
        assert_eq!(session.count(), 20);
    }

    #[test]
    fn test_poll_adopts_server_count_and_resets_thresholds() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(10, now);
        assert!(session.thresholds().has_shown(10));

        assert!(session.begin_poll());
        assert!(!session.begin_poll());
        assert_eq!(session.state(), SyncState::Polling);

        let update = session.finish_poll(10, now);
        assert!(update.is_none());

        session.begin_poll();
        let update = session.finish_poll(5, now).unwrap();
        assert_eq!(update.count, 5);
        assert_eq!(session.grid().len(), 5);
        assert!(session.thresholds().has_shown(5));
        assert!(!session.thresholds().has_shown(10));
        assert_eq!(session.state(), SyncState::Idle);
    }

    #[test]
    fn test_abandoned_poll_frees_the_slot() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(20, now);

        assert!(session.begin_poll());
        session.abandon_poll();
        assert!(session.begin_poll());
    }

    #[test]
    fn test_heal_is_noop_when_in_sync() {
        let now = Instant::now();
        let (mut session, _) = EggSession::load(12, now);
        assert!(!session.heal());
    }
}
