use rocket::fs::TempFile;
use serde::Serialize;

use crate::model::{
    db::Candidate,
    mongodb::{hex_id, Id},
};

/// Multipart form for creating a candidate.
#[derive(FromForm)]
pub struct CandidateForm<'r> {
    #[field(name = "fullName")]
    pub full_name: Option<String>,
    pub motto: Option<String>,
    #[field(name = "currentElection")]
    pub current_election: Option<String>,
    pub image: Option<TempFile<'r>>,
}

/// A candidate as shown to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub full_name: String,
    pub motto: String,
    pub image: String,
    #[serde(with = "hex_id")]
    pub election: Id,
    pub vote_count: u64,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let Candidate { id, candidate } = candidate;
        Self {
            id,
            full_name: candidate.full_name,
            motto: candidate.motto,
            image: candidate.image,
            election: candidate.election,
            vote_count: candidate.vote_count,
        }
    }
}
