use log::info;
use rocket::{form::Form, http::Status, response::status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    media::MediaStore,
    model::{
        api::{
            auth::AuthToken,
            candidate::CandidateDescription,
            election::{ElectionDescription, ElectionForm},
            voter::VoterDescription,
            Message,
        },
        db::{ElectionPatch, NewElection},
        mongodb::Id,
    },
    store::{CandidateStore, Db, ElectionStore, VoterStore},
};

use super::{optional, required};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        get_elections,
        get_election,
        update_election,
        delete_election,
        election_candidates,
        election_voters,
    ]
}

#[post("/elections", data = "<form>")]
async fn create_election(
    token: AuthToken,
    mut form: Form<ElectionForm<'_>>,
    db: Db,
    media: &State<MediaStore>,
) -> Result<status::Custom<Json<ElectionDescription>>> {
    token.require_admin("create elections")?;

    let title = required(form.title.as_deref(), "title")?;
    let description = required(form.description.as_deref(), "description")?;
    let thumbnail = form
        .thumbnail
        .as_mut()
        .ok_or_else(|| Error::invalid("thumbnail", "Fill in all fields"))?;
    let thumbnail = media.save(thumbnail, "thumbnail").await?;

    let election = db
        .insert_election(NewElection::new(title, description, thumbnail))
        .await?;
    info!("Created election {}", election.id);
    Ok(status::Custom(Status::Created, Json(election.into())))
}

#[get("/elections")]
async fn get_elections(_token: AuthToken, db: Db) -> Result<Json<Vec<ElectionDescription>>> {
    let elections = db.elections().await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
async fn get_election(
    _token: AuthToken,
    election_id: Id,
    db: Db,
) -> Result<Json<ElectionDescription>> {
    let election = db
        .election_by_id(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    Ok(Json(election.into()))
}

#[patch("/elections/<election_id>", data = "<form>")]
async fn update_election(
    token: AuthToken,
    election_id: Id,
    mut form: Form<ElectionForm<'_>>,
    db: Db,
    media: &State<MediaStore>,
) -> Result<Json<ElectionDescription>> {
    token.require_admin("update elections")?;

    // Check existence before storing any new thumbnail.
    if db.election_by_id(election_id).await?.is_none() {
        return Err(Error::not_found(format!("Election {election_id}")));
    }

    let mut patch = ElectionPatch {
        title: optional(form.title.as_deref()),
        description: optional(form.description.as_deref()),
        thumbnail: None,
    };
    if let Some(thumbnail) = form.thumbnail.as_mut().filter(|file| file.len() > 0) {
        patch.thumbnail = Some(media.save(thumbnail, "thumbnail").await?);
    }

    let election = db
        .update_election(election_id, &patch)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    info!("Updated election {election_id}");
    Ok(Json(election.into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(token: AuthToken, election_id: Id, db: Db) -> Result<Json<Message>> {
    token.require_admin("delete elections")?;

    db.delete_election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    info!("Deleted election {election_id} and its candidates");
    Ok(Json(Message::new("Election deleted")))
}

#[get("/elections/<election_id>/candidates")]
async fn election_candidates(
    _token: AuthToken,
    election_id: Id,
    db: Db,
) -> Result<Json<Vec<CandidateDescription>>> {
    if db.election_by_id(election_id).await?.is_none() {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    let candidates = db.candidates_for_election(election_id).await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>/voters")]
async fn election_voters(
    _token: AuthToken,
    election_id: Id,
    db: Db,
) -> Result<Json<Vec<VoterDescription>>> {
    let election = db
        .election_by_id(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    let voters = db.voters_by_ids(&election.voters).await?;
    Ok(Json(voters.into_iter().map(Into::into).collect()))
}
