use log::info;
use rocket::{form::Form, http::Status, response::status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    media::MediaStore,
    model::{
        api::{
            auth::AuthToken,
            candidate::{CandidateDescription, CandidateForm},
            Message,
        },
        db::NewCandidate,
        mongodb::Id,
    },
    store::{CandidateStore, Db, ElectionStore},
};

use super::required;

pub fn routes() -> Vec<Route> {
    routes![create_candidate, get_candidate, delete_candidate]
}

#[post("/candidates", data = "<form>")]
async fn create_candidate(
    token: AuthToken,
    mut form: Form<CandidateForm<'_>>,
    db: Db,
    media: &State<MediaStore>,
) -> Result<status::Custom<Json<CandidateDescription>>> {
    token.require_admin("add candidates")?;

    let full_name = required(form.full_name.as_deref(), "fullName")?;
    let motto = required(form.motto.as_deref(), "motto")?;
    let election_id: Id = required(form.current_election.as_deref(), "currentElection")?
        .parse()
        .map_err(|_| Error::invalid("currentElection", "Invalid election ID"))?;
    let image = form
        .image
        .as_mut()
        .ok_or_else(|| Error::invalid("image", "Fill in all fields"))?;

    // Check the election exists before storing the image.
    if db.election_by_id(election_id).await?.is_none() {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    let image = media.save(image, "image").await?;

    let candidate = db
        .insert_candidate(NewCandidate::new(full_name, motto, image, election_id))
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    info!(
        "Added candidate {} to election {election_id}",
        candidate.id
    );
    Ok(status::Custom(Status::Created, Json(candidate.into())))
}

#[get("/candidates/<candidate_id>")]
async fn get_candidate(
    _token: AuthToken,
    candidate_id: Id,
    db: Db,
) -> Result<Json<CandidateDescription>> {
    let candidate = db
        .candidate_by_id(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
    Ok(Json(candidate.into()))
}

#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(token: AuthToken, candidate_id: Id, db: Db) -> Result<Json<Message>> {
    token.require_admin("delete candidates")?;

    db.delete_candidate(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
    info!("Deleted candidate {candidate_id}");
    Ok(Json(Message::new("Candidate deleted")))
}
