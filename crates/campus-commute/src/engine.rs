//! Commute matching engine.
//!
//! A run selects candidate preferences for its policy's target, plans groups with
//! [`cluster::plan`](crate::cluster::plan), and commits each planned group on its
//! own. A group that fails to commit is logged and skipped; the rest of the run
//! continues.
//!
//! Re-running for the same date never duplicates anything: membership is unique
//! per `(date, direction, location, user)` in the store, a planned group whose
//! members are all grouped already is left alone, and a single newcomer joins a
//! chunk-mate's group when it has room instead of founding a group of one.
//!
//! Members of a group can also talk to each other; group messages live in the
//! store's group channel and are visible to members only.

use std::sync::Arc;

use campus_core::{Direction, GroupId, UserId};
use campus_store::{
    Channel, CommuteGroup, CommuteStore, MemberAdd, MessageStore, NewCommuteGroup, StoredMessage,
};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::cluster::{self, Candidate, Chunk};
use crate::error::{CommuteError, Result};
use crate::policy::{MatchPolicy, Target};
use crate::types::{GroupView, SweepReport};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ChunkOutcome {
    created: bool,
    added: usize,
}

/// Batch matcher for commute preferences.
pub struct CommuteMatchEngine<S> {
    store: Arc<S>,
    group_size_cap: usize,
    rng: Mutex<StdRng>,
    /// Serializes runs so a scheduled sweep and an on-demand trigger never interleave.
    sweep: Mutex<()>,
}

impl<S: CommuteStore> CommuteMatchEngine<S> {
    /// Create an engine shuffling with an entropy-seeded generator.
    #[must_use]
    pub fn new(store: Arc<S>, group_size_cap: usize) -> Self {
        Self::with_rng(store, group_size_cap, StdRng::from_entropy())
    }

    /// Create an engine with an explicit generator, for repeatable groupings.
    #[must_use]
    pub fn with_rng(store: Arc<S>, group_size_cap: usize, rng: StdRng) -> Self {
        Self {
            store,
            group_size_cap: group_size_cap.max(2),
            rng: Mutex::new(rng),
            sweep: Mutex::new(()),
        }
    }

    /// Run `policy` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if candidates cannot be read. Failures while committing a
    /// single group are counted in the report instead.
    pub fn run(&self, policy: &MatchPolicy, now: NaiveDateTime) -> Result<SweepReport> {
        let _sweep = self.sweep.lock();
        let target = policy.target(now);

        let candidates = self.select(policy, target)?;
        let candidate_count = candidates.len();
        let chunks = {
            let mut rng = self.rng.lock();
            cluster::plan(candidates, policy.tolerance, self.group_size_cap, &mut *rng)
        };

        let mut report = SweepReport {
            policy: policy.name,
            match_date: target.date,
            candidates: candidate_count,
            chunks: chunks.len(),
            groups_created: 0,
            members_added: 0,
            chunks_failed: 0,
        };

        for chunk in &chunks {
            match self.commit_chunk(target.date, chunk) {
                Ok(outcome) => {
                    report.groups_created += usize::from(outcome.created);
                    report.members_added += outcome.added;
                }
                Err(e) => {
                    report.chunks_failed += 1;
                    warn!(
                        policy = policy.name,
                        direction = %chunk.direction,
                        location = %chunk.location,
                        error = %e,
                        "Failed to commit commute group, skipping"
                    );
                }
            }
        }

        if report.groups_created > 0 || report.chunks_failed > 0 {
            info!(
                policy = policy.name,
                match_date = %report.match_date,
                candidates = report.candidates,
                groups_created = report.groups_created,
                members_added = report.members_added,
                chunks_failed = report.chunks_failed,
                "Commute matching run complete"
            );
        } else {
            debug!(
                policy = policy.name,
                match_date = %report.match_date,
                candidates = report.candidates,
                "Commute matching run found nothing new"
            );
        }
        Ok(report)
    }

    fn select(&self, policy: &MatchPolicy, target: Target) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for direction in [Direction::Arrival, Direction::Departure] {
            let preferences = self
                .store
                .schedules_for_day(target.weekday(), direction, None)?;
            candidates.extend(
                preferences
                    .iter()
                    .filter(|p| target.selects(p.time, policy.tolerance))
                    .map(Candidate::from),
            );
        }
        Ok(candidates)
    }

    fn commit_chunk(&self, match_date: NaiveDate, chunk: &Chunk) -> Result<ChunkOutcome> {
        let mut existing = Vec::new();
        let mut ungrouped = Vec::new();
        for &user_id in &chunk.members {
            match self.store.group_find_existing(
                match_date,
                chunk.direction,
                &chunk.location,
                user_id,
            )? {
                Some(group) => existing.push(group),
                None => ungrouped.push(user_id),
            }
        }

        let (group, created) = match ungrouped.len() {
            0 => return Ok(ChunkOutcome::default()),
            1 => match self.first_with_room(&existing)? {
                Some(group) => (group, false),
                None => {
                    debug!(
                        user_id = %ungrouped[0],
                        location = %chunk.location,
                        groups = existing.len(),
                        "Chunk-mates' groups are full, newcomer left ungrouped"
                    );
                    return Ok(ChunkOutcome::default());
                }
            },
            _ => {
                let group = self.store.group_create(NewCommuteGroup {
                    match_date,
                    direction: chunk.direction,
                    location: chunk.location.clone(),
                    time_slot: chunk.time_slot,
                })?;
                (group, true)
            }
        };

        let mut added = 0;
        for user_id in ungrouped {
            match self.store.group_member_add(group.group_id, user_id)? {
                MemberAdd::Added => added += 1,
                MemberAdd::AlreadyGrouped(other) => {
                    debug!(user_id = %user_id, group_id = %other, "User already grouped");
                }
            }
        }

        if created {
            debug!(
                group_id = %group.group_id,
                location = %group.location,
                time_slot = %group.time_slot,
                members = added,
                "Created commute group"
            );
        }
        Ok(ChunkOutcome { created, added })
    }

    fn first_with_room(&self, groups: &[CommuteGroup]) -> Result<Option<CommuteGroup>> {
        for group in groups {
            if self.store.group_members(group.group_id)?.len() < self.group_size_cap {
                return Ok(Some(group.clone()));
            }
        }
        Ok(None)
    }

    /// Groups of a user on a date, with members.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn groups_for_user(&self, user_id: UserId, match_date: NaiveDate) -> Result<Vec<GroupView>> {
        self.store
            .groups_for_user_on(user_id, match_date)?
            .into_iter()
            .map(|group| self.view(group))
            .collect()
    }

    /// A group with its members, visible to members only.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` if the group is absent or `user_id` is not a member.
    pub fn group_for_member(&self, user_id: UserId, group_id: GroupId) -> Result<GroupView> {
        let group = self
            .store
            .group_get(group_id)?
            .ok_or(CommuteError::GroupNotFound(group_id))?;
        let view = self.view(group)?;
        if !view.members.contains(&user_id) {
            return Err(CommuteError::GroupNotFound(group_id));
        }
        Ok(view)
    }

    fn ensure_member(&self, user_id: UserId, group_id: GroupId) -> Result<()> {
        let is_member = self
            .store
            .group_members(group_id)?
            .iter()
            .any(|m| m.user_id == user_id);
        if is_member {
            Ok(())
        } else {
            Err(CommuteError::GroupNotFound(group_id))
        }
    }

    fn view(&self, group: CommuteGroup) -> Result<GroupView> {
        let members = self
            .store
            .group_members(group.group_id)?
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        Ok(GroupView { group, members })
    }
}

impl<S: CommuteStore + MessageStore> CommuteMatchEngine<S> {
    /// The most recent messages of a group, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` if the group is absent or `user_id` is not a member.
    pub fn group_messages(
        &self,
        user_id: UserId,
        group_id: GroupId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        self.ensure_member(user_id, group_id)?;
        Ok(self.store.list_messages(Channel::Group(group_id), limit)?)
    }

    /// Post to a group. Whitespace-only text is ignored and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` if the group is absent or `user_id` is not a member.
    pub fn post_group_message(
        &self,
        user_id: UserId,
        group_id: GroupId,
        text: &str,
    ) -> Result<Option<StoredMessage>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.ensure_member(user_id, group_id)?;
        let saved = self
            .store
            .save_message(Channel::Group(group_id), user_id, text)?;
        debug!(group_id = %group_id, message_id = %saved.message_id, "Group message saved");
        Ok(Some(saved))
    }
}
