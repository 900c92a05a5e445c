//! # Egg Grid
//!
//! One egg per counted egg, laid out six to a row and filled bottom-left to
//! top-right. The last egg in the list is the top-right one.
//!
//! ## Ordering
//! - Full rebuilds cascade top row first, 100ms per row, rows counted back from
//!   the newest egg
//! - An increment appends one egg at the end with its own appear animation
//! - A decrement takes the last egg, a click takes the clicked egg
//! - A removal shifts every egg after it back one slot, those are the ones that
//!   slide into place
//! - Self-heal rebuilds with a short repeating stagger instead of the row cascade
//! - At most [`MAX_RENDERED_EGGS`] are ever built, larger counts show the rest as
//!   a number

use std::{fmt, time::Duration};

pub const COLUMNS_PER_ROW: usize = 6;
pub const ROW_DELAY: Duration = Duration::from_millis(100);
pub const MAX_RENDERED_EGGS: u64 = 600;

const HEAL_STAGGER: Duration = Duration::from_millis(50);
const HEAL_STAGGER_PERIOD: usize = 20;

/// Eggs a grid for `count` actually holds.
pub fn rendered(count: u64) -> usize {
    count.min(MAX_RENDERED_EGGS) as usize
}

/// Eggs counted but not drawn.
pub fn hidden(count: u64) -> u64 {
    count.saturating_sub(MAX_RENDERED_EGGS)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EggId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entrance {
    /// Part of a full rebuild, starts after the given delay.
    Cascade(Duration),
    Appear,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Egg {
    pub id: EggId,
    pub entrance: Entrance,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Removal {
    pub removed: EggId,
    /// Eggs that moved one slot back, in grid order.
    pub shifted: Vec<EggId>,
}

#[derive(Debug, Default)]
pub struct EggGrid {
    eggs: Vec<Egg>,
    next_id: u64,
}

impl EggGrid {
    pub fn with_count(count: u64) -> Self {
        let mut grid = Self::default();
        grid.rebuild(count);
        grid
    }

    fn mint(&mut self) -> EggId {
        let id = EggId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.eggs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eggs.is_empty()
    }

    pub fn eggs(&self) -> &[Egg] {
        &self.eggs
    }

    pub fn last(&self) -> Option<EggId> {
        self.eggs.last().map(|egg| egg.id)
    }

    pub fn rebuild(&mut self, count: u64) {
        let count = rendered(count);
        self.eggs.clear();

        for index in 0..count {
            let row_from_top = (count - 1 - index) / COLUMNS_PER_ROW;
            let id = self.mint();

            self.eggs.push(Egg {
                id,
                entrance: Entrance::Cascade(ROW_DELAY * row_from_top as u32),
            });
        }
    }

    pub fn push(&mut self) -> EggId {
        let id = self.mint();
        self.eggs.push(Egg {
            id,
            entrance: Entrance::Appear,
        });
        id
    }

    /// `None` when the egg is already gone, which makes double clicks harmless.
    pub fn remove(&mut self, id: EggId) -> Option<Removal> {
        let index = self.eggs.iter().position(|egg| egg.id == id)?;
        self.eggs.remove(index);

        Some(Removal {
            removed: id,
            shifted: self.eggs[index..].iter().map(|egg| egg.id).collect(),
        })
    }

    /// Rebuilds when the grid drifted from `count`, returns whether it did.
    pub fn reconcile(&mut self, count: u64) -> bool {
        let count = rendered(count);
        if self.eggs.len() == count {
            return false;
        }

        self.eggs.clear();
        for index in 0..count {
            let id = self.mint();
            self.eggs.push(Egg {
                id,
                entrance: Entrance::Cascade(HEAL_STAGGER * (index % HEAL_STAGGER_PERIOD) as u32),
            });
        }

        true
    }
}

impl fmt::Display for EggGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<_> = self.eggs.chunks(COLUMNS_PER_ROW).collect();

        for row in rows.iter().rev() {
            let line: Vec<&str> = row.iter().map(|_| "🥚").collect();
            writeln!(f, "{}", line.join(" "))?;
        }

        Ok(())
    }
}
