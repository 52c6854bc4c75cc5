//! Blocked time windows and conflict detection.
//!
//! A job part occupies its driver from `start - pre_buffer` until
//! `start + service + post_buffer`. Windows are half-open: a window ending at
//! 10:30 and another starting at 10:30 do not conflict.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WindowConfig;

/// A half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Interval start (inclusive).
    pub start: DateTime<Utc>,
    /// Interval end (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Length of this window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether an instant falls within this window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        overlap(self, other)
    }

    /// Smallest window covering both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Conflict test between two buffered windows.
///
/// Symmetric, and windows sharing only a boundary instant do not overlap.
pub fn overlap(a: &TimeWindow, b: &TimeWindow) -> bool {
    a.start < b.end && b.start < a.end
}

/// Window geometry resolved into durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pre_buffer: Duration,
    service: Duration,
    post_buffer: Duration,
    stagger: Duration,
}

impl WindowPolicy {
    /// Build a policy from configuration.
    pub fn from_config(cfg: &WindowConfig) -> Self {
        Self {
            pre_buffer: minutes(cfg.pre_buffer_mins),
            service: minutes(cfg.service_mins),
            post_buffer: minutes(cfg.post_buffer_mins),
            stagger: minutes(cfg.stagger_mins),
        }
    }

    /// Start time of part `unit_index` (1-based) of a job beginning at
    /// `base_start`. Index 0 is treated as the first part.
    ///
    /// `None` when the result falls outside the representable range.
    pub fn part_start(&self, base_start: DateTime<Utc>, unit_index: u32) -> Option<DateTime<Utc>> {
        let offset = i32::try_from(unit_index.saturating_sub(1)).ok()?;
        base_start.checked_add_signed(self.stagger.checked_mul(offset)?)
    }

    /// Blocked window for a part starting at `part_start`.
    pub fn blocked(&self, part_start: DateTime<Utc>) -> Option<TimeWindow> {
        let occupied = self.service.checked_add(&self.post_buffer)?;
        Some(TimeWindow {
            start: part_start.checked_sub_signed(self.pre_buffer)?,
            end: part_start.checked_add_signed(occupied)?,
        })
    }

    /// Blocked window for part `unit_index` of a job beginning at `base_start`.
    pub fn blocked_for_unit(&self, base_start: DateTime<Utc>, unit_index: u32) -> Option<TimeWindow> {
        self.blocked(self.part_start(base_start, unit_index)?)
    }
}

fn minutes(value: i64) -> Duration {
    Duration::try_minutes(value).unwrap_or(Duration::MAX)
}
