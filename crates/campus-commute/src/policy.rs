//! Named matching policies.
//!
//! The periodic sweep and the on-demand trigger select candidates differently and
//! are kept as two separate configurations.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

use campus_core::MinuteOfDay;

/// Which preferences a run considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Preferences within the tolerance of `now + horizon_minutes`, on that instant's date.
    Window {
        /// How far ahead of now the sweep looks.
        horizon_minutes: u16,
    },
    /// Every active preference for today.
    WholeDay,
}

/// A named set of matching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    /// Name used in logs.
    pub name: &'static str,
    /// Maximum gap, in minutes, between chained times.
    pub tolerance: u16,
    /// Candidate selection.
    pub selection: Selection,
}

impl MatchPolicy {
    /// The periodic sweep: tolerance 5, one hour ahead.
    #[must_use]
    pub const fn scheduled() -> Self {
        Self {
            name: "scheduled",
            tolerance: 5,
            selection: Selection::Window {
                horizon_minutes: 60,
            },
        }
    }

    /// The "match now" trigger: tolerance 10, all of today.
    #[must_use]
    pub const fn on_demand() -> Self {
        Self {
            name: "on_demand",
            tolerance: 10,
            selection: Selection::WholeDay,
        }
    }

    /// Resolve the run's target at `now`.
    #[must_use]
    pub fn target(&self, now: NaiveDateTime) -> Target {
        match self.selection {
            Selection::Window { horizon_minutes } => {
                let at = now + Duration::minutes(i64::from(horizon_minutes));
                Target {
                    date: at.date(),
                    time: Some(MinuteOfDay::from(at.time())),
                }
            }
            Selection::WholeDay => Target {
                date: now.date(),
                time: None,
            },
        }
    }
}

/// The date, and for windowed policies the time, a run evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Match date.
    pub date: NaiveDate,
    /// Time of day to match around; `None` for the whole day.
    pub time: Option<MinuteOfDay>,
}

impl Target {
    /// Weekday of the match date.
    #[must_use]
    pub fn weekday(self) -> Weekday {
        self.date.weekday()
    }

    /// Whether a preference time is selected.
    #[must_use]
    pub const fn selects(self, time: MinuteOfDay, tolerance: u16) -> bool {
        match self.time {
            Some(target) => target.within(time, tolerance),
            None => true,
        }
    }
}
