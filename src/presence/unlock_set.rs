//! Unlock flags and the presence signature derived from them

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Result, RoomError};

/// Retrieval keys for Case 01 (The Silent Switchboard)
pub const CASE01_KEYS: [&str; 4] = ["REC-01", "REC-02", "REC-03", "REC-04"];

/// Fixed set of named flags. A flag only ever goes from locked to unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockSet {
    flags: BTreeMap<String, bool>,
}

impl UnlockSet {
    /// All keys locked
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            flags: keys.into_iter().map(|k| (k.into(), false)).collect(),
        }
    }

    /// Rebuild from a persisted map. Keys outside the set are ignored and
    /// missing ones start locked.
    pub fn restore<I, K>(keys: I, persisted: &BTreeMap<String, bool>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut set = Self::new(keys);
        for (key, unlocked) in set.flags.iter_mut() {
            *unlocked = persisted.get(key).copied().unwrap_or(false);
        }
        set
    }

    /// Unlock `key`. Returns whether anything changed.
    pub fn unlock(&mut self, key: &str) -> Result<bool> {
        match self.flags.get_mut(key) {
            Some(unlocked) if *unlocked => Ok(false),
            Some(unlocked) => {
                *unlocked = true;
                Ok(true)
            }
            None => Err(RoomError::UnknownKey(key.to_string())),
        }
    }

    pub fn is_unlocked(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }

    /// Every key, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    /// Unlocked keys, sorted
    pub fn unlocked_keys(&self) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|(_, unlocked)| **unlocked)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Sorted, comma-joined unlocked keys; `""` when nothing is unlocked
    pub fn signature(&self) -> String {
        self.unlocked_keys().join(",")
    }

    /// All keys unlocked
    pub fn is_solved(&self) -> bool {
        solved(self)
    }

    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }
}

/// Conjunction over the set. Computed on demand, never stored.
pub fn solved(set: &UnlockSet) -> bool {
    !set.flags.is_empty() && set.flags.values().all(|unlocked| *unlocked)
}

/// Keys named in a signature
pub fn signature_keys(signature: &str) -> BTreeSet<String> {
    signature
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
