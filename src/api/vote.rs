use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::{
            auth::AuthToken,
            vote::{CandidateVoteRequest, VoteRequest},
        },
        mongodb::Id,
    },
    store::Db,
    vote::{VoteCoordinator, VoteReceipt},
};

pub fn routes() -> Vec<Route> {
    routes![vote, vote_for_candidate]
}

#[post("/vote", data = "<request>", format = "json")]
async fn vote(
    token: AuthToken,
    request: Json<VoteRequest>,
    db: Db,
    coordinator: &State<VoteCoordinator>,
) -> Result<Json<VoteReceipt>> {
    cast(token, request.into_inner(), &db, coordinator).await
}

#[patch("/candidates/<candidate_id>", data = "<request>", format = "json")]
async fn vote_for_candidate(
    token: AuthToken,
    candidate_id: Id,
    request: Json<CandidateVoteRequest>,
    db: Db,
    coordinator: &State<VoteCoordinator>,
) -> Result<Json<VoteReceipt>> {
    let request = request.into_inner().for_candidate(candidate_id);
    cast(token, request, &db, coordinator).await
}

async fn cast(
    token: AuthToken,
    request: VoteRequest,
    db: &Db,
    coordinator: &VoteCoordinator,
) -> Result<Json<VoteReceipt>> {
    token.require_voter(request.voter_id)?;
    let receipt = coordinator
        .cast_vote(
            &**db,
            request.voter_id,
            request.election_id,
            request.candidate_id,
        )
        .await?;
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use rocket::{
        futures::future::join_all,
        http::Status,
        local::asynchronous::Client,
        serde::json::{json, Value},
    };

    use crate::api::testing::{create_candidate, create_election, login_as, path, Login};
    use crate::model::api::voter::RegisterRequest;
    use crate::store::{CandidateStore, ElectionStore, MemoryStore, VoterStore};

    use super::*;

    fn ballot(voter: &Login, election: Id, candidate: Id) -> Value {
        json!({
            "candidateId": candidate.to_string(),
            "voterId": voter.id.to_string(),
            "electionId": election.to_string(),
        })
    }

    #[backend_test(admin)]
    async fn vote_once_per_election(client: Client, store: MemoryStore, admin: Login) {
        let election = create_election(&client, &admin, "Board election").await;
        let first = create_candidate(&client, &admin, election, "Grace Hopper").await;
        let second = create_candidate(&client, &admin, election, "Alan Turing").await;
        let voter = login_as(&client, RegisterRequest::example()).await;

        let response = client
            .post(path("/vote"))
            .header(voter.bearer())
            .json(&ballot(&voter, election, first))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["candidateId"], first.to_string());
        assert_eq!(body["voteCount"], 1);

        // A second vote in the same election, for anyone, is rejected.
        let response = client
            .post(path("/vote"))
            .header(voter.bearer())
            .json(&ballot(&voter, election, second))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["message"], "You have already voted in this election");

        let stored = store.voter_by_id(voter.id).await.unwrap().unwrap();
        assert_eq!(stored.voted_elections, vec![election]);
        let stored = store.election_by_id(election).await.unwrap().unwrap();
        assert_eq!(stored.voters, vec![voter.id]);
        assert_eq!(
            store.candidate_by_id(first).await.unwrap().unwrap().vote_count,
            1
        );
        assert_eq!(
            store.candidate_by_id(second).await.unwrap().unwrap().vote_count,
            0
        );

        // Logging in again reports the vote.
        let response = client
            .post(path("/voters/login"))
            .json(&RegisterRequest::example().login())
            .dispatch()
            .await;
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["votedElections"], json!([election.to_string()]));
    }

    #[backend_test(admin)]
    async fn vote_via_candidate_route(client: Client, store: MemoryStore, admin: Login) {
        let election = create_election(&client, &admin, "Board election").await;
        let other = create_election(&client, &admin, "Other election").await;
        let candidate = create_candidate(&client, &admin, election, "Grace Hopper").await;
        let voter = login_as(&client, RegisterRequest::example()).await;

        // The candidate isn't standing in the other election.
        let response = client
            .patch(path(&format!("/candidates/{candidate}")))
            .header(voter.bearer())
            .json(&json!({
                "voterId": voter.id.to_string(),
                "electionId": other.to_string(),
            }))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        let stored = store.voter_by_id(voter.id).await.unwrap().unwrap();
        assert!(stored.voted_elections.is_empty());

        // Legacy field names are accepted.
        let response = client
            .patch(path(&format!("/candidates/{candidate}")))
            .header(voter.bearer())
            .json(&json!({
                "currentVoterId": voter.id.to_string(),
                "selectedElectionId": election.to_string(),
            }))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(
            store
                .candidate_by_id(candidate)
                .await
                .unwrap()
                .unwrap()
                .vote_count,
            1
        );
    }

    #[backend_test(admin)]
    async fn vote_only_as_yourself(client: Client, store: MemoryStore, admin: Login) {
        let election = create_election(&client, &admin, "Board election").await;
        let candidate = create_candidate(&client, &admin, election, "Grace Hopper").await;
        let voter = login_as(&client, RegisterRequest::example()).await;

        let response = client
            .post(path("/vote"))
            .header(admin.bearer())
            .json(&ballot(&voter, election, candidate))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        let response = client
            .post(path("/vote"))
            .json(&ballot(&voter, election, candidate))
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        assert_eq!(
            store
                .candidate_by_id(candidate)
                .await
                .unwrap()
                .unwrap()
                .vote_count,
            0
        );
    }

    #[backend_test(admin)]
    async fn concurrent_requests_count_once(client: Client, store: MemoryStore, admin: Login) {
        let election = create_election(&client, &admin, "Board election").await;
        let candidate = create_candidate(&client, &admin, election, "Grace Hopper").await;
        let voter = login_as(&client, RegisterRequest::example()).await;

        let requests = (0..4).map(|_| {
            client
                .post(path("/vote"))
                .header(voter.bearer())
                .json(&ballot(&voter, election, candidate))
                .dispatch()
        });
        let statuses: Vec<Status> = join_all(requests)
            .await
            .iter()
            .map(|response| response.status())
            .collect();
        assert_eq!(statuses.iter().filter(|s| **s == Status::Ok).count(), 1);
        assert_eq!(
            statuses
                .iter()
                .filter(|s| **s == Status::BadRequest)
                .count(),
            3
        );
        assert_eq!(
            store
                .candidate_by_id(candidate)
                .await
                .unwrap()
                .unwrap()
                .vote_count,
            1
        );
    }
}
