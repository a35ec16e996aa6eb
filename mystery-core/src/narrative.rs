//! Narrative context ledger.
//!
//! Each actor starts with a canonical `context1` and up to four locked
//! fragments. Presenting the right evidence merges a fragment into
//! `context1`, which is what the inference endpoint sees. Merges are
//! append-only, happen at most once per fragment, and the final fragment
//! is gated on every other non-empty fragment having been merged first.

use serde::{Deserialize, Serialize};

/// Separator placed between merged blocks of `context1`.
const SEPARATOR: &str = "\n\n";

/// A locked block of backstory that evidence can unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fragment {
    #[serde(rename = "context2")]
    Context2,
    #[serde(rename = "context3")]
    Context3,
    #[serde(rename = "context4")]
    Context4,
    #[serde(rename = "lastcontext")]
    Last,
}

impl Fragment {
    pub const ALL: [Fragment; 4] = [
        Fragment::Context2,
        Fragment::Context3,
        Fragment::Context4,
        Fragment::Last,
    ];

    /// Fragments that must be merged before [`Fragment::Last`].
    pub const PREREQUISITES: [Fragment; 3] =
        [Fragment::Context2, Fragment::Context3, Fragment::Context4];

    /// The field name used in character files and mappings.
    pub fn key(self) -> &'static str {
        match self {
            Fragment::Context2 => "context2",
            Fragment::Context3 => "context3",
            Fragment::Context4 => "context4",
            Fragment::Last => "lastcontext",
        }
    }
}

/// Entry of the context-unlock mapping: a fragment name, or `false` for
/// evidence that deliberately unlocks nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Unlock {
    Fragment(Fragment),
    Flag(bool),
}

impl Unlock {
    pub fn fragment(self) -> Option<Fragment> {
        match self {
            Unlock::Fragment(fragment) => Some(fragment),
            Unlock::Flag(_) => None,
        }
    }
}

/// Result of a merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The fragment was appended to `context1`.
    Appended,
    /// The fragment was already part of `context1`.
    AlreadyMerged,
    /// The actor has no text for this fragment.
    Empty,
    /// The final fragment was triggered before its prerequisites.
    OutOfSequence,
}

impl MergeOutcome {
    pub fn appended(self) -> bool {
        self == MergeOutcome::Appended
    }
}

/// An actor's narrative ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub context1: String,
    #[serde(default)]
    pub context2: String,
    #[serde(default)]
    pub context3: String,
    #[serde(default)]
    pub context4: String,
    #[serde(default)]
    pub lastcontext: String,
    /// Fragments in the order they were merged.
    #[serde(default)]
    merged: Vec<Fragment>,
}

impl Ledger {
    pub fn new(
        context1: impl Into<String>,
        context2: impl Into<String>,
        context3: impl Into<String>,
        context4: impl Into<String>,
        lastcontext: impl Into<String>,
    ) -> Self {
        Self {
            context1: context1.into(),
            context2: context2.into(),
            context3: context3.into(),
            context4: context4.into(),
            lastcontext: lastcontext.into(),
            merged: Vec::new(),
        }
    }

    /// The trimmed text of a fragment; empty when the actor has none.
    pub fn fragment(&self, fragment: Fragment) -> &str {
        match fragment {
            Fragment::Context2 => self.context2.trim(),
            Fragment::Context3 => self.context3.trim(),
            Fragment::Context4 => self.context4.trim(),
            Fragment::Last => self.lastcontext.trim(),
        }
    }

    /// Fragments merged so far, oldest first.
    pub fn merged(&self) -> &[Fragment] {
        &self.merged
    }

    /// Whether a fragment's text is already part of `context1`.
    ///
    /// Empty fragments are never merged.
    pub fn is_merged(&self, fragment: Fragment) -> bool {
        let text = self.fragment(fragment);
        if text.is_empty() {
            return false;
        }
        self.merged.contains(&fragment) || self.context1.contains(text)
    }

    /// Whether every non-empty prerequisite of the final fragment is merged.
    pub fn prerequisites_met(&self) -> bool {
        Fragment::PREREQUISITES
            .iter()
            .all(|&f| self.fragment(f).is_empty() || self.is_merged(f))
    }

    /// Append a fragment to `context1` unless it is empty, already present,
    /// or (for the final fragment) out of sequence.
    pub fn merge(&mut self, fragment: Fragment) -> MergeOutcome {
        if self.fragment(fragment).is_empty() {
            return MergeOutcome::Empty;
        }
        if fragment == Fragment::Last && !self.prerequisites_met() {
            tracing::debug!("final fragment triggered before its prerequisites");
            return MergeOutcome::OutOfSequence;
        }
        if self.is_merged(fragment) {
            if !self.merged.contains(&fragment) {
                self.merged.push(fragment);
            }
            return MergeOutcome::AlreadyMerged;
        }

        let text = self.fragment(fragment).to_string();
        if !self.context1.trim().is_empty() {
            self.context1.push_str(SEPARATOR);
        }
        self.context1.push_str(&text);
        self.merged.push(fragment);
        MergeOutcome::Appended
    }

    /// Rebuild the merge order for ledgers saved without one.
    ///
    /// Fragments found in `context1` but missing from the order are appended
    /// by the position of their last occurrence.
    pub fn reconcile(&mut self) {
        let mut found: Vec<(usize, Fragment)> = Fragment::ALL
            .iter()
            .filter(|f| !self.merged.contains(f))
            .filter_map(|&f| {
                let text = self.fragment(f);
                if text.is_empty() {
                    None
                } else {
                    self.context1.rfind(text).map(|pos| (pos, f))
                }
            })
            .collect();
        found.sort_by_key(|(pos, _)| *pos);
        self.merged.extend(found.into_iter().map(|(_, f)| f));
    }
}
