//! The vote transaction coordinator.
//!
//! Casting a vote touches three records: the voter's voted-election set, the
//! election's voter set and the candidate's tally. The coordinator is the only
//! code allowed to change any of them, and it changes all three or none.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::error::Error;
use crate::model::mongodb::{hex_id, Id};
use crate::store::Store;

mod locks;

pub use locks::BallotLocks;

/// Why a vote was not recorded.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Candidate not found in this election")]
    CandidateNotFound,
    #[error("Voter not found")]
    VoterNotFound,
    #[error("You have already voted in this election")]
    AlreadyVoted,
    #[error("Election not found")]
    ElectionNotFound,
    #[error(transparent)]
    Internal(#[from] Error),
}

impl From<VoteError> for Error {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::CandidateNotFound => Error::not_found("Candidate"),
            VoteError::VoterNotFound => Error::not_found("Voter"),
            VoteError::AlreadyVoted => Error::AlreadyVoted,
            VoteError::ElectionNotFound => Error::not_found("Election"),
            VoteError::Internal(e) => e,
        }
    }
}

/// Proof that a vote was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    #[serde(with = "hex_id")]
    pub voter_id: Id,
    #[serde(with = "hex_id")]
    pub election_id: Id,
    #[serde(with = "hex_id")]
    pub candidate_id: Id,
    /// The candidate's tally immediately after this vote.
    pub vote_count: u64,
    pub cast_at: DateTime<Utc>,
}

/// A ledger write that was attempted, and so may have taken effect even if
/// it reported an error. Undone if the vote fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Claimed,
    ElectionVoterAdded,
    TallyIncremented,
}

/// One attempt at casting a vote.
#[derive(Debug, Clone, Copy)]
struct Ballot {
    /// Marks this attempt's tally increment so it can be withdrawn exactly.
    id: Id,
    voter: Id,
    election: Id,
    candidate: Id,
}

/// Applies votes atomically. Lives in managed state.
#[derive(Default)]
pub struct VoteCoordinator {
    locks: BallotLocks,
}

impl VoteCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a vote by `voter_id` for `candidate_id` in `election_id`.
    ///
    /// Preconditions are checked in order: the candidate stands in the
    /// election, the voter exists, the voter has not voted in the election,
    /// and the election exists.
    pub async fn cast_vote<S>(
        &self,
        store: &S,
        voter_id: Id,
        election_id: Id,
        candidate_id: Id,
    ) -> Result<VoteReceipt, VoteError>
    where
        S: Store + ?Sized,
    {
        let _pair = self.locks.acquire(voter_id, election_id).await;

        store
            .candidate_by_id(candidate_id)
            .await?
            .filter(|candidate| candidate.election == election_id)
            .ok_or(VoteError::CandidateNotFound)?;
        let voter = store
            .voter_by_id(voter_id)
            .await?
            .ok_or(VoteError::VoterNotFound)?;
        if voter.has_voted_in(election_id) {
            return Err(VoteError::AlreadyVoted);
        }
        store
            .election_by_id(election_id)
            .await?
            .ok_or(VoteError::ElectionNotFound)?;

        let ballot = Ballot {
            id: Id::new(),
            voter: voter_id,
            election: election_id,
            candidate: candidate_id,
        };
        let mut applied = Vec::with_capacity(3);
        match Self::apply(store, ballot, &mut applied).await {
            Ok(vote_count) => {
                info!("Voter {voter_id} voted for candidate {candidate_id} in election {election_id}");
                // The vote has committed; a failure here only leaves a stale marker.
                if let Err(e) = store.settle_tally(candidate_id, ballot.id).await {
                    warn!("Failed to settle ballot {} on candidate {candidate_id}: {e}", ballot.id);
                }
                Ok(VoteReceipt {
                    voter_id,
                    election_id,
                    candidate_id,
                    vote_count,
                    cast_at: Utc::now(),
                })
            }
            Err(err) => {
                Self::roll_back(store, ballot, applied).await;
                Err(err)
            }
        }
    }

    /// Perform the three ledger writes, recording each one before it is
    /// attempted.
    async fn apply<S>(
        store: &S,
        ballot: Ballot,
        applied: &mut Vec<Applied>,
    ) -> Result<u64, VoteError>
    where
        S: Store + ?Sized,
    {
        applied.push(Applied::Claimed);
        if !store.claim_ballot(ballot.voter, ballot.election).await? {
            // Another server process won the race since we checked. The claim
            // is theirs, so it must not be released.
            applied.pop();
            return Err(VoteError::AlreadyVoted);
        }

        applied.push(Applied::ElectionVoterAdded);
        if !store
            .add_election_voter(ballot.election, ballot.voter)
            .await?
        {
            return Err(VoteError::ElectionNotFound);
        }

        applied.push(Applied::TallyIncremented);
        store
            .increment_tally(ballot.candidate, ballot.election, ballot.id)
            .await?
            .ok_or(VoteError::CandidateNotFound)
    }

    /// Undo attempted writes, most recent first.
    async fn roll_back<S>(store: &S, ballot: Ballot, applied: Vec<Applied>)
    where
        S: Store + ?Sized,
    {
        let Ballot {
            id,
            voter,
            election,
            candidate,
        } = ballot;
        for step in applied.into_iter().rev() {
            debug!("Rolling back {step:?} for voter {voter} in election {election}");
            let result = match step {
                Applied::Claimed => store.release_ballot(voter, election).await,
                Applied::ElectionVoterAdded => store.remove_election_voter(election, voter).await,
                Applied::TallyIncremented => store.withdraw_tally(candidate, id).await,
            };
            if let Err(e) = result {
                error!("Failed to roll back {step:?} for voter {voter} in election {election}: {e}");
            }
        }
    }
}
