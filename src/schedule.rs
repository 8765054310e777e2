//! Schedule gate for periodic meter reads.
//!
//! The meter sleeps outside a daily active-hours window that it reports in
//! its reply frames. The gate combines a weekday policy with the last learned
//! window to decide whether a scheduled read is worth attempting at all.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Weekday policy for scheduled reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkWeek {
    /// Monday through Friday.
    #[default]
    FiveDay,
    /// Monday through Saturday.
    SixDay,
}

impl WorkWeek {
    /// True if reads are allowed on the given weekday.
    pub fn includes(self, weekday: Weekday) -> bool {
        match self {
            WorkWeek::FiveDay => !matches!(weekday, Weekday::Sat | Weekday::Sun),
            WorkWeek::SixDay => weekday != Weekday::Sun,
        }
    }
}

/// The meter's learned daily wake window, in whole hours (0-23).
///
/// Both endpoints start unknown and are filled in from decoded replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveHours {
    pub start: Option<u8>,
    pub end: Option<u8>,
}

impl ActiveHours {
    /// Both endpoints known, in range, and distinct.
    ///
    /// Equal endpoints or an out-of-range hour mean the window is not
    /// constraining; a single bad observation must never permanently block
    /// reads.
    fn is_constraining(&self) -> Option<(u8, u8)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= 23 && end <= 23 && start != end => {
                Some((start, end))
            }
            _ => None,
        }
    }

    /// True if `hour` falls inside the window. A start greater than the end
    /// denotes a window wrapping past midnight. Both endpoints are inclusive.
    fn contains(&self, hour: u8) -> bool {
        match self.is_constraining() {
            Some((start, end)) if start < end => (start..=end).contains(&hour),
            Some((start, end)) => hour >= start || hour <= end,
            None => true,
        }
    }
}

/// Decide whether a scheduled read should run now.
///
/// Refuses outside the weekday policy; additionally requires the current hour
/// to fall inside the learned active-hours window when that window is
/// constraining.
pub fn should_read(week: WorkWeek, weekday: Weekday, hour: u8, window: &ActiveHours) -> bool {
    if !week.includes(weekday) {
        return false;
    }
    window.contains(hour)
}
