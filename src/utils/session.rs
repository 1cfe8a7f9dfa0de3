//! Per-run Signing Session
//!
//! Holds the state shared by every transaction in one run:
//! - the seed cache, keyed by Seed ID
//! - the ordered queue of seed-source files not yet read
//!
//! The session is owned by the pipeline and passed by reference into each
//! step. Seeds live only here and are zeroized when the session drops.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;

use crate::types::SeedId;
use crate::wallet::Seed;

/// Session state for one signing run
#[derive(Debug, Default)]
pub struct SigningSession {
    /// Seeds loaded so far
    seeds: HashMap<SeedId, Seed>,
    /// Seed files not yet consumed, in command-line order
    pending_seed_files: VecDeque<PathBuf>,
    /// Number of seed files consumed
    files_read: usize,
}

impl SigningSession {
    /// Create a session that will read seeds from `seed_files` on demand
    pub fn new(seed_files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            seeds: HashMap::new(),
            pending_seed_files: seed_files.into_iter().collect(),
            files_read: 0,
        }
    }

    pub fn has_seed(&self, seed_id: &SeedId) -> bool {
        self.seeds.contains_key(seed_id)
    }

    pub fn seed(&self, seed_id: &SeedId) -> Option<&Seed> {
        self.seeds.get(seed_id)
    }

    /// Cache a seed. Returns `false` if a seed with that ID was already cached.
    pub fn cache_seed(&mut self, seed: Seed) -> bool {
        if self.seeds.contains_key(seed.id()) {
            return false;
        }
        self.seeds.insert(seed.id().clone(), seed);
        true
    }

    /// IDs of every cached seed
    pub fn cached_seed_ids(&self) -> BTreeSet<SeedId> {
        self.seeds.keys().cloned().collect()
    }

    /// Take the next unread seed file
    pub fn next_seed_file(&mut self) -> Option<PathBuf> {
        let next = self.pending_seed_files.pop_front();
        if next.is_some() {
            self.files_read += 1;
        }
        next
    }

    pub fn files_read(&self) -> usize {
        self.files_read
    }
}
