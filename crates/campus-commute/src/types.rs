//! Types for the commute crate.

use std::time::Duration;

use campus_core::UserId;
use campus_store::CommuteGroup;
use chrono::NaiveDate;
use serde::Serialize;

use crate::policy::{MatchPolicy, Selection};

/// Outcome of one matching run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Policy name.
    pub policy: &'static str,
    /// Date matched for.
    pub match_date: NaiveDate,
    /// Preferences selected.
    pub candidates: usize,
    /// Groups planned.
    pub chunks: usize,
    /// Groups newly created.
    pub groups_created: usize,
    /// Memberships newly written.
    pub members_added: usize,
    /// Groups that failed and were skipped.
    pub chunks_failed: usize,
}

/// A group with its member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    /// The group.
    #[serde(flatten)]
    pub group: CommuteGroup,
    /// Members, in user ID order.
    pub members: Vec<UserId>,
}

/// Configuration for commute matching.
#[derive(Debug, Clone)]
pub struct CommuteConfig {
    /// Seconds between scheduled sweeps.
    pub sweep_interval_seconds: u64,
    /// Maximum members per group.
    pub group_size_cap: usize,
    /// Policy of the periodic sweep.
    pub scheduled: MatchPolicy,
    /// Policy of the on-demand trigger.
    pub on_demand: MatchPolicy,
}

impl Default for CommuteConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 60,
            group_size_cap: 4,
            scheduled: MatchPolicy::scheduled(),
            on_demand: MatchPolicy::on_demand(),
        }
    }
}

impl CommuteConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `COMMUTE_SWEEP_INTERVAL_SECONDS`: Seconds between scheduled sweeps
    /// - `COMMUTE_GROUP_SIZE_CAP`: Maximum members per group (at least 2)
    /// - `COMMUTE_SCHEDULED_TOLERANCE`: Tolerance of the periodic sweep, in minutes
    /// - `COMMUTE_SCHEDULED_HORIZON_MINUTES`: How far ahead the periodic sweep looks
    /// - `COMMUTE_ON_DEMAND_TOLERANCE`: Tolerance of the on-demand trigger, in minutes
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_parse("COMMUTE_SWEEP_INTERVAL_SECONDS") {
            config.sweep_interval_seconds = n;
        }
        if let Some(n) = env_parse::<usize>("COMMUTE_GROUP_SIZE_CAP") {
            config.group_size_cap = n.max(2);
        }
        if let Some(n) = env_parse("COMMUTE_SCHEDULED_TOLERANCE") {
            config.scheduled.tolerance = n;
        }
        if let Some(n) = env_parse("COMMUTE_SCHEDULED_HORIZON_MINUTES") {
            config.scheduled.selection = Selection::Window { horizon_minutes: n };
        }
        if let Some(n) = env_parse("COMMUTE_ON_DEMAND_TOLERANCE") {
            config.on_demand.tolerance = n;
        }

        config
    }

    /// Get the sweep interval as a `Duration`.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
