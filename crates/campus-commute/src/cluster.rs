//! Pure grouping algorithm.
//!
//! Candidates are bucketed by `(direction, location)`, sorted by time and merged into
//! chained clusters: consecutive times at most `tolerance` minutes apart belong to
//! the same cluster, even if the ends of the chain are further apart. Each cluster
//! is shuffled and cut into groups of at most `cap` members.
//!
//! Nothing here touches storage, and the only source of randomness is the `Rng`
//! passed in, so a seeded generator gives exact, repeatable groupings.

use std::collections::BTreeMap;

use campus_core::{Direction, MinuteOfDay, UserId};
use campus_store::CommutePreference;
use rand::seq::SliceRandom;
use rand::Rng;

/// One user's time for a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The user.
    pub user_id: UserId,
    /// Arrival or departure.
    pub direction: Direction,
    /// Meeting point.
    pub location: String,
    /// Target time.
    pub time: MinuteOfDay,
}

impl From<&CommutePreference> for Candidate {
    fn from(preference: &CommutePreference) -> Self {
        Self {
            user_id: preference.user_id,
            direction: preference.direction,
            location: preference.location.clone(),
            time: preference.time,
        }
    }
}

/// A planned group: members sharing a bucket and a compatible time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Arrival or departure.
    pub direction: Direction,
    /// Meeting point.
    pub location: String,
    /// Floor average of the members' times.
    pub time_slot: MinuteOfDay,
    /// Members, in shuffled order.
    pub members: Vec<UserId>,
}

type BucketKey = (Direction, String);

/// Group candidates by `(direction, location)`.
///
/// Buckets come back in key order. Within a bucket a user appears once, with their
/// earliest time.
#[must_use]
pub fn bucket(candidates: Vec<Candidate>) -> BTreeMap<BucketKey, Vec<Candidate>> {
    let mut buckets: BTreeMap<BucketKey, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        buckets
            .entry((candidate.direction, candidate.location.clone()))
            .or_default()
            .push(candidate);
    }
    for members in buckets.values_mut() {
        members.sort_by_key(|c| (c.time, c.user_id));
        let mut seen = std::collections::HashSet::new();
        members.retain(|c| seen.insert(c.user_id));
    }
    buckets
}

/// Split time-sorted candidates into chained clusters, dropping clusters of one.
#[must_use]
pub fn chain_clusters(sorted: &[Candidate], tolerance: u16) -> Vec<Vec<Candidate>> {
    let mut clusters = Vec::new();
    let mut current: Vec<Candidate> = Vec::new();

    for candidate in sorted {
        let breaks_chain = current
            .last()
            .is_some_and(|prev| !prev.time.within(candidate.time, tolerance));
        if breaks_chain {
            clusters.push(std::mem::take(&mut current));
        }
        current.push(candidate.clone());
    }
    if !current.is_empty() {
        clusters.push(current);
    }

    clusters.retain(|c| c.len() >= 2);
    clusters
}

/// Shuffle a cluster and cut it into groups of at most `cap`. A trailing group of
/// one is dropped.
pub fn split_cluster<R: Rng + ?Sized>(
    mut cluster: Vec<Candidate>,
    cap: usize,
    rng: &mut R,
) -> Vec<Chunk> {
    cluster.shuffle(rng);

    cluster
        .chunks(cap.max(2))
        .filter(|chunk| chunk.len() >= 2)
        .filter_map(|chunk| {
            let times: Vec<MinuteOfDay> = chunk.iter().map(|c| c.time).collect();
            let first = chunk.first()?;
            Some(Chunk {
                direction: first.direction,
                location: first.location.clone(),
                time_slot: MinuteOfDay::floor_average(&times)?,
                members: chunk.iter().map(|c| c.user_id).collect(),
            })
        })
        .collect()
}

/// Plan every group for a set of candidates.
pub fn plan<R: Rng + ?Sized>(
    candidates: Vec<Candidate>,
    tolerance: u16,
    cap: usize,
    rng: &mut R,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for members in bucket(candidates).into_values() {
        for cluster in chain_clusters(&members, tolerance) {
            chunks.extend(split_cluster(cluster, cap, rng));
        }
    }
    chunks
}
