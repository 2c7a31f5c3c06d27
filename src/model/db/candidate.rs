use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub full_name: String,
    pub motto: String,
    /// URL of the candidate's picture.
    pub image: String,
    /// The election this candidate stands in.
    pub election: Id,
    /// Number of committed votes. Only ever changed by casting a vote.
    #[serde(default)]
    pub vote_count: u64,
    /// Ballots whose increment is counted in `vote_count` but not yet
    /// settled. A ballot listed here can be withdrawn exactly once.
    #[serde(default)]
    pub pending_ballots: Vec<Id>,
}

impl CandidateCore {
    pub fn new(full_name: String, motto: String, image: String, election: Id) -> Self {
        Self {
            full_name,
            motto,
            image,
            election,
            vote_count: 0,
            pending_ballots: Vec::new(),
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example(election: Id) -> Self {
            Self::new(
                "Chris Riches".into(),
                "Free coffee for everyone".into(),
                "/uploads/chris.png".into(),
                election,
            )
        }

        pub fn example2(election: Id) -> Self {
            Self::new(
                "Parry Hotter".into(),
                "Longer library hours".into(),
                "/uploads/parry.png".into(),
                election,
            )
        }
    }
}
