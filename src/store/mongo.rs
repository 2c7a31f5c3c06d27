use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    db::{Candidate, Election, ElectionPatch, NewCandidate, NewElection, NewVoter, Voter},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

use super::{BallotLedger, CandidateStore, ElectionStore, VoterStore};

/// A store backed by MongoDB. Multi-document writes use transactions, so the
/// server must be part of a replica set.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    voters: Coll<Voter>,
    new_voters: Coll<NewVoter>,
    elections: Coll<Election>,
    new_elections: Coll<NewElection>,
    candidates: Coll<Candidate>,
    new_candidates: Coll<NewCandidate>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            voters: Coll::from_db(db),
            new_voters: Coll::from_db(db),
            elections: Coll::from_db(db),
            new_elections: Coll::from_db(db),
            candidates: Coll::from_db(db),
            new_candidates: Coll::from_db(db),
        }
    }
}

/// Options that make `find_one_and_update` return the updated document.
fn return_after() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

/// Extract the `ObjectId` of a freshly inserted document.
fn inserted_id(result: mongodb::results::InsertOneResult) -> Result<Id> {
    result
        .inserted_id
        .as_object_id()
        .map(Id::from)
        .ok_or_else(|| Error::Internal("Inserted document has no ObjectId".to_string()))
}

#[rocket::async_trait]
impl VoterStore for MongoStore {
    async fn insert_voter(&self, voter: NewVoter) -> Result<Voter> {
        let id = match self.new_voters.insert_one(&voter, None).await {
            Ok(result) => inserted_id(result)?,
            // Lost a race against another registration with the same email.
            Err(e) if is_duplicate_key_error(&e) => {
                return Err(Error::invalid("email", "Email already exists"));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Voter { id, voter })
    }

    async fn voter_by_id(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn voter_by_email(&self, email: &str) -> Result<Option<Voter>> {
        Ok(self.voters.find_one(doc! { "email": email }, None).await?)
    }

    async fn voters_by_ids(&self, ids: &[Id]) -> Result<Vec<Voter>> {
        let filter = doc! {
            "_id": { "$in": ids.to_vec() },
        };
        Ok(self.voters.find(filter, None).await?.try_collect().await?)
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn insert_election(&self, election: NewElection) -> Result<Election> {
        let id = inserted_id(self.new_elections.insert_one(&election, None).await?)?;
        Ok(Election { id, election })
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        Ok(self.elections.find(None, None).await?.try_collect().await?)
    }

    async fn election_by_id(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn update_election(&self, id: Id, patch: &ElectionPatch) -> Result<Option<Election>> {
        if patch.is_empty() {
            return self.election_by_id(id).await;
        }

        let mut set = Document::new();
        if let Some(title) = &patch.title {
            set.insert("title", title.as_str());
        }
        if let Some(description) = &patch.description {
            set.insert("description", description.as_str());
        }
        if let Some(thumbnail) = &patch.thumbnail {
            set.insert("thumbnail", thumbnail.as_str());
        }
        let update = doc! { "$set": set };
        Ok(self
            .elections
            .find_one_and_update(id.as_doc(), update, return_after())
            .await?)
    }

    async fn delete_election(&self, id: Id) -> Result<Option<Election>> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Delete the election itself.
        let election = self
            .elections
            .find_one_and_delete_with_session(id.as_doc(), None, &mut session)
            .await?;
        if election.is_none() {
            session.abort_transaction().await?;
            return Ok(None);
        }

        // Delete its candidates.
        self.candidates
            .delete_many_with_session(doc! { "election": id }, None, &mut session)
            .await?;

        // Remove the election from all voters' voted sets.
        let filter = doc! { "voted_elections": id };
        let update = doc! { "$pull": { "voted_elections": id } };
        self.voters
            .update_many_with_session(filter, update, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(election)
    }
}

#[rocket::async_trait]
impl CandidateStore for MongoStore {
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Option<Candidate>> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let election_id = candidate.election;
        let election = self
            .elections
            .find_one_with_session(election_id.as_doc(), None, &mut session)
            .await?;
        if election.is_none() {
            session.abort_transaction().await?;
            return Ok(None);
        }

        let id = inserted_id(
            self.new_candidates
                .insert_one_with_session(&candidate, None, &mut session)
                .await?,
        )?;
        let update = doc! { "$push": { "candidates": id } };
        self.elections
            .update_one_with_session(election_id.as_doc(), update, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(Some(Candidate { id, candidate }))
    }

    async fn candidate_by_id(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.candidates.find_one(id.as_doc(), None).await?)
    }

    async fn candidates_for_election(&self, election: Id) -> Result<Vec<Candidate>> {
        let filter = doc! { "election": election };
        Ok(self.candidates.find(filter, None).await?.try_collect().await?)
    }

    async fn delete_candidate(&self, id: Id) -> Result<Option<Candidate>> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let candidate = self
            .candidates
            .find_one_and_delete_with_session(id.as_doc(), None, &mut session)
            .await?;
        if candidate.is_none() {
            session.abort_transaction().await?;
            return Ok(None);
        }

        // Pull it from every election that lists it, not just its owner.
        let filter = doc! { "candidates": id };
        let update = doc! { "$pull": { "candidates": id } };
        self.elections
            .update_many_with_session(filter, update, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(candidate)
    }
}

#[rocket::async_trait]
impl BallotLedger for MongoStore {
    async fn claim_ballot(&self, voter: Id, election: Id) -> Result<bool> {
        // The `$ne` guard makes check-and-set a single atomic document update.
        let filter = doc! {
            "_id": voter,
            "voted_elections": { "$ne": election },
        };
        let update = doc! { "$addToSet": { "voted_elections": election } };
        let result = self.voters.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    async fn release_ballot(&self, voter: Id, election: Id) -> Result<()> {
        let update = doc! { "$pull": { "voted_elections": election } };
        self.voters.update_one(voter.as_doc(), update, None).await?;
        Ok(())
    }

    async fn add_election_voter(&self, election: Id, voter: Id) -> Result<bool> {
        let update = doc! { "$addToSet": { "voters": voter } };
        let result = self
            .elections
            .update_one(election.as_doc(), update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn remove_election_voter(&self, election: Id, voter: Id) -> Result<()> {
        let update = doc! { "$pull": { "voters": voter } };
        self.elections
            .update_one(election.as_doc(), update, None)
            .await?;
        Ok(())
    }

    async fn increment_tally(
        &self,
        candidate: Id,
        election: Id,
        ballot: Id,
    ) -> Result<Option<u64>> {
        // Counting and marking the ballot pending is one document update, so
        // a withdrawal can tell whether this increment happened.
        let filter = doc! {
            "_id": candidate,
            "election": election,
            "pending_ballots": { "$ne": ballot },
        };
        let update = doc! {
            "$inc": { "vote_count": 1_i64 },
            "$push": { "pending_ballots": ballot },
        };
        if let Some(counted) = self
            .candidates
            .find_one_and_update(filter, update, return_after())
            .await?
        {
            return Ok(Some(counted.vote_count));
        }

        // Either there is no such candidate, or this ballot was already counted.
        let filter = doc! {
            "_id": candidate,
            "election": election,
            "pending_ballots": ballot,
        };
        let counted = self.candidates.find_one(filter, None).await?;
        Ok(counted.map(|c| c.vote_count))
    }

    async fn withdraw_tally(&self, candidate: Id, ballot: Id) -> Result<()> {
        let filter = doc! {
            "_id": candidate,
            "pending_ballots": ballot,
        };
        let update = doc! {
            "$inc": { "vote_count": -1_i64 },
            "$pull": { "pending_ballots": ballot },
        };
        self.candidates.update_one(filter, update, None).await?;
        Ok(())
    }

    async fn settle_tally(&self, candidate: Id, ballot: Id) -> Result<()> {
        let update = doc! { "$pull": { "pending_ballots": ballot } };
        self.candidates
            .update_one(candidate.as_doc(), update, None)
            .await?;
        Ok(())
    }
}
