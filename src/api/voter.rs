use log::info;
use rocket::{http::Status, response::status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::AuthToken,
            voter::{LoginRequest, LoginResponse, RegisterRequest, VoterDescription},
        },
        db::{voter::normalize_email, NewVoter},
        mongodb::Id,
    },
    store::{Db, VoterStore},
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![register, login, get_voter]
}

#[post("/voters/register", data = "<request>", format = "json")]
async fn register(
    request: Json<RegisterRequest>,
    db: Db,
    config: &State<Config>,
) -> Result<status::Custom<Json<VoterDescription>>> {
    request.validate()?;

    // Check email uniqueness. The store enforces this too, but checking first
    // saves hashing a password for nothing.
    let email = normalize_email(&request.email);
    if db.voter_by_email(&email).await?.is_some() {
        return Err(Error::invalid("email", "Email already exists"));
    }

    let is_admin = config.is_admin_email(&email);
    let voter = NewVoter::new(
        request.full_name.trim().to_string(),
        &email,
        &request.password,
        is_admin,
    )?;
    let voter = db.insert_voter(voter).await?;
    info!("Registered voter {} (admin: {is_admin})", voter.id);

    Ok(status::Custom(Status::Created, Json(voter.into())))
}

#[post("/voters/login", data = "<request>", format = "json")]
async fn login(
    request: Json<LoginRequest>,
    db: Db,
    config: &State<Config>,
) -> Result<Json<LoginResponse>> {
    if request.email.trim().is_empty() {
        return Err(Error::invalid("email", "Fill in all fields"));
    }
    if request.password.is_empty() {
        return Err(Error::invalid("password", "Fill in all fields"));
    }

    let rejected = || Error::Unauthenticated("Invalid email or password".to_string());
    let voter = db
        .voter_by_email(&normalize_email(&request.email))
        .await?
        .ok_or_else(rejected)?;
    if !voter.verify_password(&request.password)? {
        return Err(rejected());
    }

    let token = AuthToken::new(&voter).encode(config)?;
    Ok(Json(LoginResponse {
        id: voter.id,
        is_admin: voter.is_admin,
        token,
        voted_elections: voter.voter.voted_elections,
    }))
}

#[get("/voters/<voter_id>")]
async fn get_voter(_token: AuthToken, voter_id: Id, db: Db) -> Result<Json<VoterDescription>> {
    let voter = db
        .voter_by_id(voter_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))?;
    Ok(Json(voter.into()))
}
