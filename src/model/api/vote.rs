use serde::Deserialize;

use crate::model::mongodb::{hex_id, Id};

/// A vote, naming everything explicitly.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(with = "hex_id")]
    pub candidate_id: Id,
    #[serde(with = "hex_id", alias = "currentVoterId")]
    pub voter_id: Id,
    #[serde(with = "hex_id", alias = "selectedElectionId")]
    pub election_id: Id,
}

/// A vote for the candidate named in the request path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateVoteRequest {
    #[serde(with = "hex_id", alias = "currentVoterId")]
    pub voter_id: Id,
    #[serde(with = "hex_id", alias = "selectedElectionId")]
    pub election_id: Id,
}

impl CandidateVoteRequest {
    pub fn for_candidate(self, candidate_id: Id) -> VoteRequest {
        VoteRequest {
            candidate_id,
            voter_id: self.voter_id,
            election_id: self.election_id,
        }
    }
}
