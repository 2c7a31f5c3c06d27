//! Persistent stores for voters, elections and candidates.
//!
//! Each store is an async trait so the server can run against MongoDB in
//! production and against an in-memory backend during development and tests.

use std::{ops::Deref, sync::Arc};

use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::error::Result;
use crate::model::{
    db::{Candidate, Election, ElectionPatch, NewCandidate, NewElection, NewVoter, Voter},
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
#[cfg(test)]
pub use memory::{Fault, Timing};
pub use mongo::MongoStore;

/// The identity store.
#[rocket::async_trait]
pub trait VoterStore: Send + Sync {
    /// Insert a new voter. Fails with a validation error if the email is taken.
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter>;

    async fn voter_by_id(&self, id: Id) -> Result<Option<Voter>>;

    /// Look up a voter by (already normalized) email.
    async fn voter_by_email(&self, email: &str) -> Result<Option<Voter>>;

    /// Fetch every voter in `ids` that exists. Order is unspecified.
    async fn voters_by_ids(&self, ids: &[Id]) -> Result<Vec<Voter>>;
}

/// The election store.
#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    async fn insert_election(&self, election: NewElection) -> Result<Election>;

    async fn elections(&self) -> Result<Vec<Election>>;

    async fn election_by_id(&self, id: Id) -> Result<Option<Election>>;

    /// Apply `patch` and return the updated election, or `None` if it doesn't exist.
    async fn update_election(&self, id: Id, patch: &ElectionPatch) -> Result<Option<Election>>;

    /// Atomically delete an election, its candidates, and every voter's
    /// record of having voted in it.
    async fn delete_election(&self, id: Id) -> Result<Option<Election>>;
}

/// The candidate store.
#[rocket::async_trait]
pub trait CandidateStore: Send + Sync {
    /// Atomically insert a candidate and append it to its election.
    /// Returns `None` if the election does not exist.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Option<Candidate>>;

    async fn candidate_by_id(&self, id: Id) -> Result<Option<Candidate>>;

    async fn candidates_for_election(&self, election: Id) -> Result<Vec<Candidate>>;

    /// Atomically delete a candidate and pull it from every election listing it.
    async fn delete_candidate(&self, id: Id) -> Result<Option<Candidate>>;
}

/// Single-document primitives that make up a vote, plus their compensations.
///
/// Only the vote coordinator may call these: together they keep voter
/// voted-sets, election voter-sets and candidate tallies consistent.
///
/// A write may take effect even when the call reports an error, so every
/// compensation only undoes what its forward write actually did, and is
/// harmless when that write never happened or was already undone.
#[rocket::async_trait]
pub trait BallotLedger: Send + Sync {
    /// Add `election` to the voter's voted set iff it is not already present.
    /// Returns whether this call added it.
    async fn claim_ballot(&self, voter: Id, election: Id) -> Result<bool>;

    /// Undo [`BallotLedger::claim_ballot`].
    async fn release_ballot(&self, voter: Id, election: Id) -> Result<()>;

    /// Add `voter` to the election's voter set. Returns false if there is no such election.
    async fn add_election_voter(&self, election: Id, voter: Id) -> Result<bool>;

    /// Undo [`BallotLedger::add_election_voter`].
    async fn remove_election_voter(&self, election: Id, voter: Id) -> Result<()>;

    /// Increment the tally of `candidate` on behalf of `ballot`, provided the
    /// candidate still belongs to `election`, and mark the ballot pending.
    /// Repeating the call for the same ballot doesn't count it twice.
    /// Returns the tally, or `None` if no such candidate.
    async fn increment_tally(&self, candidate: Id, election: Id, ballot: Id)
        -> Result<Option<u64>>;

    /// Undo [`BallotLedger::increment_tally`]: decrement the tally iff `ballot`
    /// is pending on the candidate.
    async fn withdraw_tally(&self, candidate: Id, ballot: Id) -> Result<()>;

    /// Forget a pending ballot once its vote has committed. The tally is kept.
    async fn settle_tally(&self, candidate: Id, ballot: Id) -> Result<()>;
}

/// Everything the server needs from its persistence layer.
pub trait Store: VoterStore + ElectionStore + CandidateStore + BallotLedger {}

impl<T> Store for T where T: VoterStore + ElectionStore + CandidateStore + BallotLedger {}

/// A shared handle on the store backend, held in managed state.
#[derive(Clone)]
pub struct Db(Arc<dyn Store>);

impl Db {
    pub fn new(store: impl Store + 'static) -> Self {
        Self(Arc::new(store))
    }
}

impl Deref for Db {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Db {
    type Error = ();

    /// Get the store from the managed state.
    ///
    /// Panics iff the [`Db`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Db>>().await.unwrap();
        request::Outcome::Success(db.inner().clone())
    }
}
