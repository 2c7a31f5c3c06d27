use std::collections::BTreeMap;
use std::sync::Arc;

use rocket::tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{
    db::{Candidate, Election, ElectionPatch, NewCandidate, NewElection, NewVoter, Voter},
    mongodb::Id,
};

use super::{BallotLedger, CandidateStore, ElectionStore, VoterStore};

#[derive(Default)]
struct Tables {
    voters: BTreeMap<Id, Voter>,
    elections: BTreeMap<Id, Election>,
    candidates: BTreeMap<Id, Candidate>,
}

/// An in-memory store. Every multi-record operation happens under a single
/// write lock, so it is trivially atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    #[cfg(test)]
    faults: Arc<std::sync::Mutex<std::collections::HashMap<Fault, Timing>>>,
}

/// Ledger writes that can be made to fail, to exercise rollback paths.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Fault {
    ClaimBallot,
    AddElectionVoter,
    IncrementTally,
}

/// When an injected failure strikes relative to the write itself.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// Nothing is written.
    Before,
    /// The write takes effect but the caller sees an error, like a lost
    /// acknowledgement.
    After,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Make every subsequent call of the given write fail, without writing.
    pub fn fail(&self, fault: Fault) {
        self.fail_at(fault, Timing::Before);
    }

    /// Make every subsequent call of the given write fail at the given point.
    pub fn fail_at(&self, fault: Fault, timing: Timing) {
        self.faults.lock().unwrap().insert(fault, timing);
    }

    /// Stop injecting the given failure.
    pub fn heal(&self, fault: Fault) {
        self.faults.lock().unwrap().remove(&fault);
    }

    /// Drop an election record without cascading, leaving its candidates dangling.
    pub async fn forget_election(&self, id: Id) {
        self.tables.write().await.elections.remove(&id);
    }

    fn trip(&self, fault: Fault, timing: Timing) -> Result<()> {
        if self.faults.lock().unwrap().get(&fault) == Some(&timing) {
            return Err(Error::Internal(format!("injected {fault:?} failure {timing:?} write")));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl VoterStore for MemoryStore {
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let mut tables = self.tables.write().await;
        if tables.voters.values().any(|v| v.email == voter.email) {
            return Err(Error::invalid("email", "Email already exists"));
        }
        let voter = Voter {
            id: Id::new(),
            voter,
        };
        tables.voters.insert(voter.id, voter.clone());
        Ok(voter)
    }

    async fn voter_by_id(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.tables.read().await.voters.get(&id).cloned())
    }

    async fn voter_by_email(&self, email: &str) -> Result<Option<Voter>> {
        let tables = self.tables.read().await;
        Ok(tables.voters.values().find(|v| v.email == email).cloned())
    }

    async fn voters_by_ids(&self, ids: &[Id]) -> Result<Vec<Voter>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.voters.get(id))
            .cloned()
            .collect())
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.tables
            .write()
            .await
            .elections
            .insert(election.id, election.clone());
        Ok(election)
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        Ok(self.tables.read().await.elections.values().cloned().collect())
    }

    async fn election_by_id(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.tables.read().await.elections.get(&id).cloned())
    }

    async fn update_election(&self, id: Id, patch: &ElectionPatch) -> Result<Option<Election>> {
        let mut tables = self.tables.write().await;
        Ok(tables.elections.get_mut(&id).map(|election| {
            patch.apply_to(election);
            election.clone()
        }))
    }

    async fn delete_election(&self, id: Id) -> Result<Option<Election>> {
        let mut tables = self.tables.write().await;
        let election = match tables.elections.remove(&id) {
            Some(election) => election,
            None => return Ok(None),
        };
        tables.candidates.retain(|_, c| c.election != id);
        for voter in tables.voters.values_mut() {
            voter.voted_elections.retain(|e| *e != id);
        }
        Ok(Some(election))
    }
}

#[rocket::async_trait]
impl CandidateStore for MemoryStore {
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Option<Candidate>> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let election = match tables.elections.get_mut(&candidate.election) {
            Some(election) => election,
            None => return Ok(None),
        };
        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        election.candidates.push(candidate.id);
        tables.candidates.insert(candidate.id, candidate.clone());
        Ok(Some(candidate))
    }

    async fn candidate_by_id(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.tables.read().await.candidates.get(&id).cloned())
    }

    async fn candidates_for_election(&self, election: Id) -> Result<Vec<Candidate>> {
        let tables = self.tables.read().await;
        Ok(tables
            .candidates
            .values()
            .filter(|c| c.election == election)
            .cloned()
            .collect())
    }

    async fn delete_candidate(&self, id: Id) -> Result<Option<Candidate>> {
        let mut tables = self.tables.write().await;
        let candidate = tables.candidates.remove(&id);
        if candidate.is_some() {
            for election in tables.elections.values_mut() {
                election.candidates.retain(|c| *c != id);
            }
        }
        Ok(candidate)
    }
}

#[rocket::async_trait]
impl BallotLedger for MemoryStore {
    async fn claim_ballot(&self, voter: Id, election: Id) -> Result<bool> {
        #[cfg(test)]
        self.trip(Fault::ClaimBallot, Timing::Before)?;
        let mut tables = self.tables.write().await;
        let claimed = match tables.voters.get_mut(&voter) {
            Some(voter) if !voter.has_voted_in(election) => {
                voter.voted_elections.push(election);
                true
            }
            _ => false,
        };
        #[cfg(test)]
        self.trip(Fault::ClaimBallot, Timing::After)?;
        Ok(claimed)
    }

    async fn release_ballot(&self, voter: Id, election: Id) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(voter) = tables.voters.get_mut(&voter) {
            voter.voted_elections.retain(|e| *e != election);
        }
        Ok(())
    }

    async fn add_election_voter(&self, election: Id, voter: Id) -> Result<bool> {
        #[cfg(test)]
        self.trip(Fault::AddElectionVoter, Timing::Before)?;
        let mut tables = self.tables.write().await;
        let found = match tables.elections.get_mut(&election) {
            Some(election) => {
                if !election.voters.contains(&voter) {
                    election.voters.push(voter);
                }
                true
            }
            None => false,
        };
        #[cfg(test)]
        self.trip(Fault::AddElectionVoter, Timing::After)?;
        Ok(found)
    }

    async fn remove_election_voter(&self, election: Id, voter: Id) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(election) = tables.elections.get_mut(&election) {
            election.voters.retain(|v| *v != voter);
        }
        Ok(())
    }

    async fn increment_tally(
        &self,
        candidate: Id,
        election: Id,
        ballot: Id,
    ) -> Result<Option<u64>> {
        #[cfg(test)]
        self.trip(Fault::IncrementTally, Timing::Before)?;
        let mut tables = self.tables.write().await;
        let tally = tables
            .candidates
            .get_mut(&candidate)
            .filter(|c| c.election == election)
            .map(|c| {
                if !c.pending_ballots.contains(&ballot) {
                    c.pending_ballots.push(ballot);
                    c.vote_count += 1;
                }
                c.vote_count
            });
        #[cfg(test)]
        self.trip(Fault::IncrementTally, Timing::After)?;
        Ok(tally)
    }

    async fn withdraw_tally(&self, candidate: Id, ballot: Id) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(candidate) = tables.candidates.get_mut(&candidate) {
            if candidate.pending_ballots.contains(&ballot) {
                candidate.pending_ballots.retain(|b| *b != ballot);
                candidate.vote_count -= 1;
            }
        }
        Ok(())
    }

    async fn settle_tally(&self, candidate: Id, ballot: Id) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(candidate) = tables.candidates.get_mut(&candidate) {
            candidate.pending_ballots.retain(|b| *b != ballot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::db::{CandidateCore, ElectionCore, VoterCore};

    use super::*;

    async fn tally_of(store: &MemoryStore, candidate: Id) -> u64 {
        store
            .candidate_by_id(candidate)
            .await
            .unwrap()
            .unwrap()
            .vote_count
    }

    #[rocket::async_test]
    async fn duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.insert_voter(VoterCore::example()).await.unwrap();
        let err = store.insert_voter(VoterCore::example()).await.unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { field: "email", .. }));
    }

    #[rocket::async_test]
    async fn candidate_insert_requires_election() {
        let store = MemoryStore::new();
        let orphan = store
            .insert_candidate(CandidateCore::example(Id::new()))
            .await
            .unwrap();
        assert!(orphan.is_none());
        assert!(store.tables.read().await.candidates.is_empty());

        let election = store.insert_election(ElectionCore::example()).await.unwrap();
        let candidate = store
            .insert_candidate(CandidateCore::example(election.id))
            .await
            .unwrap()
            .unwrap();
        let election = store.election_by_id(election.id).await.unwrap().unwrap();
        assert_eq!(election.candidates, vec![candidate.id]);
    }

    #[rocket::async_test]
    async fn delete_candidate_pulls_references() {
        let store = MemoryStore::new();
        let election = store.insert_election(ElectionCore::example()).await.unwrap();
        let first = store
            .insert_candidate(CandidateCore::example(election.id))
            .await
            .unwrap()
            .unwrap();
        let second = store
            .insert_candidate(CandidateCore::example2(election.id))
            .await
            .unwrap()
            .unwrap();

        let deleted = store.delete_candidate(first.id).await.unwrap();
        assert_eq!(deleted.map(|c| c.id), Some(first.id));

        let election = store.election_by_id(election.id).await.unwrap().unwrap();
        assert_eq!(election.candidates, vec![second.id]);
        assert!(store.candidate_by_id(first.id).await.unwrap().is_none());
        assert!(store.delete_candidate(first.id).await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn delete_election_cascades() {
        let store = MemoryStore::new();
        let election = store.insert_election(ElectionCore::example()).await.unwrap();
        let other = store.insert_election(ElectionCore::example2()).await.unwrap();
        let candidate = store
            .insert_candidate(CandidateCore::example(election.id))
            .await
            .unwrap()
            .unwrap();
        let survivor = store
            .insert_candidate(CandidateCore::example(other.id))
            .await
            .unwrap()
            .unwrap();
        let voter = store.insert_voter(VoterCore::example()).await.unwrap();
        assert!(store.claim_ballot(voter.id, election.id).await.unwrap());
        assert!(store.claim_ballot(voter.id, other.id).await.unwrap());

        store.delete_election(election.id).await.unwrap().unwrap();

        assert!(store.election_by_id(election.id).await.unwrap().is_none());
        assert!(store.candidate_by_id(candidate.id).await.unwrap().is_none());
        assert!(store.candidate_by_id(survivor.id).await.unwrap().is_some());
        let voter = store.voter_by_id(voter.id).await.unwrap().unwrap();
        assert_eq!(voter.voted_elections, vec![other.id]);
    }

    #[rocket::async_test]
    async fn claim_is_conditional() {
        let store = MemoryStore::new();
        let voter = store.insert_voter(VoterCore::example()).await.unwrap();
        let election = Id::new();
        assert!(store.claim_ballot(voter.id, election).await.unwrap());
        assert!(!store.claim_ballot(voter.id, election).await.unwrap());

        store.release_ballot(voter.id, election).await.unwrap();
        assert!(store.claim_ballot(voter.id, election).await.unwrap());
    }

    #[rocket::async_test]
    async fn tally_only_increments_within_election() {
        let store = MemoryStore::new();
        let election = store.insert_election(ElectionCore::example()).await.unwrap();
        let candidate = store
            .insert_candidate(CandidateCore::example(election.id))
            .await
            .unwrap()
            .unwrap();

        let ballot = Id::new();
        assert_eq!(
            store
                .increment_tally(candidate.id, Id::new(), ballot)
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            store
                .increment_tally(candidate.id, election.id, ballot)
                .await
                .unwrap(),
            Some(1)
        );
    }

    #[rocket::async_test]
    async fn tally_compensation_is_exact() {
        let store = MemoryStore::new();
        let election = store.insert_election(ElectionCore::example()).await.unwrap();
        let candidate = store
            .insert_candidate(CandidateCore::example(election.id))
            .await
            .unwrap()
            .unwrap();
        let (settled, pending) = (Id::new(), Id::new());

        store
            .increment_tally(candidate.id, election.id, settled)
            .await
            .unwrap();
        store.settle_tally(candidate.id, settled).await.unwrap();

        // Retrying a ballot doesn't count it twice.
        for _ in 0..2 {
            store
                .increment_tally(candidate.id, election.id, pending)
                .await
                .unwrap();
        }
        assert_eq!(tally_of(&store, candidate.id).await, 2);

        // Withdrawing only takes back what the ballot added, once.
        store.withdraw_tally(candidate.id, pending).await.unwrap();
        store.withdraw_tally(candidate.id, pending).await.unwrap();
        store.withdraw_tally(candidate.id, settled).await.unwrap();
        store.withdraw_tally(candidate.id, Id::new()).await.unwrap();
        assert_eq!(tally_of(&store, candidate.id).await, 1);
    }

    #[rocket::async_test]
    async fn update_election_patches_fields() {
        let store = MemoryStore::new();
        let election = store.insert_election(ElectionCore::example()).await.unwrap();
        let patch = ElectionPatch {
            title: Some("Renamed".into()),
            ..Default::default()
        };
        let updated = store
            .update_election(election.id, &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description, election.description);

        assert!(store
            .update_election(Id::new(), &patch)
            .await
            .unwrap()
            .is_none());
    }
}
