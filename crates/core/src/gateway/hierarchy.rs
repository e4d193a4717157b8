//! # Hierarchy Cursor
//!
//! Pure walk over the tier fallback order. The gateway drives this
//! after every failed attempt; it never touches the clock or the
//! network, which keeps the traversal rules directly testable.

/// Where the fallback loop should go after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Try the next tier in this pass.
    NextTier,
    /// The pass is exhausted; start over from the top tier.
    Restart,
    /// All passes are spent.
    Exhausted,
}

/// Position within the fallback hierarchy across restart passes.
#[derive(Debug, Clone)]
pub struct HierarchyCursor {
    tier_index: usize,
    passes_used: u32,
    tier_count: usize,
    max_passes: u32,
}

impl HierarchyCursor {
    /// `max_passes` is the total number of full hierarchy passes, so
    /// the attempt count is bounded by `max_passes * tier_count`.
    pub fn new(tier_count: usize, max_passes: u32) -> Self {
        Self {
            tier_index: 0,
            passes_used: 0,
            tier_count,
            max_passes,
        }
    }

    pub fn tier_index(&self) -> usize {
        self.tier_index
    }

    /// Completed passes. Zero while still inside the first pass, so a
    /// success on any tier of the first pass reports zero restarts.
    pub fn restarts(&self) -> u32 {
        self.passes_used
    }

    pub fn advance(&mut self) -> Step {
        if self.tier_count == 0 || self.max_passes == 0 {
            return Step::Exhausted;
        }
        if self.tier_index + 1 < self.tier_count {
            self.tier_index += 1;
            return Step::NextTier;
        }
        self.passes_used += 1;
        if self.passes_used >= self.max_passes {
            return Step::Exhausted;
        }
        self.tier_index = 0;
        Step::Restart
    }
}
