//! Folding per-record results into the next watermark.

use sync_core::RecordIdentity;

use crate::Watermark;

/// Computes the watermark a strategy may return after one invocation.
///
/// The watermark may only move past records whose writes were confirmed, and
/// never past a record that failed, because the next delta pass relies on
/// failed records still being above the watermark.
///
/// - **Ordered** trackers expect identities in ascending `(updated_at, key)`
///   order and stop advancing at the first failure.
/// - **Unordered** trackers accept any order; on failure they adopt the
///   highest applied identity only if it sorts below the lowest failed one,
///   and otherwise keep the starting watermark.
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    start: Watermark,
    ordered: bool,
    max_applied: Option<RecordIdentity>,
    min_failed: Option<RecordIdentity>,
}

impl WatermarkTracker {
    pub fn ordered(start: Watermark) -> Self {
        Self::new(start, true)
    }

    pub fn unordered(start: Watermark) -> Self {
        Self::new(start, false)
    }

    fn new(start: Watermark, ordered: bool) -> Self {
        Self {
            start,
            ordered,
            max_applied: None,
            min_failed: None,
        }
    }

    pub fn start(&self) -> &Watermark {
        &self.start
    }

    /// Record a confirmed write (applied or already up to date).
    pub fn applied(&mut self, identity: &RecordIdentity) {
        if self.ordered && self.min_failed.is_some() {
            return;
        }
        if self.max_applied.as_ref().map_or(true, |max| identity > max) {
            self.max_applied = Some(identity.clone());
        }
    }

    /// Record a write that did not go through.
    pub fn failed(&mut self, identity: &RecordIdentity) {
        if self.min_failed.as_ref().map_or(true, |min| identity < min) {
            self.min_failed = Some(identity.clone());
        }
    }

    pub fn has_failures(&self) -> bool {
        self.min_failed.is_some()
    }

    pub fn finish(self) -> Watermark {
        let Some(max_applied) = self.max_applied else {
            return self.start;
        };

        match &self.min_failed {
            Some(failed) if *failed <= max_applied => {
                tracing::debug!(
                    "Holding watermark at {}: failed record {} sorts below applied record {}",
                    self.start,
                    failed,
                    max_applied
                );
                self.start
            }
            _ => self.start.advanced_to(&max_applied),
        }
    }
}
