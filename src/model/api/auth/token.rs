use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::RequestVoter;
use crate::model::{
    db::Voter,
    mongodb::{hex_id, Id},
};
use crate::store::{Db, VoterStore};

use super::user::Rights;

pub const BEARER_PREFIX: &str = "Bearer ";

/// An authentication token representing a specific voter with specific rights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "sub", with = "hex_id")]
    pub id: Id,
    #[serde(rename = "rgt")]
    pub rights: Rights,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given voter, with their current rights.
    pub fn new(voter: &Voter) -> Self {
        Self {
            id: voter.id,
            rights: Rights::of(voter),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.rights == Rights::Admin
    }

    /// Fail with `Forbidden` unless this token carries admin rights.
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("Only an admin can {action}")))
        }
    }

    /// Fail with `Forbidden` unless this token belongs to the given voter.
    pub fn require_voter(&self, voter_id: Id) -> Result<()> {
        if self.id == voter_id {
            Ok(())
        } else {
            Err(Error::Forbidden("You can only vote as yourself".to_string()))
        }
    }

    /// Sign this token into a JWT.
    pub fn encode(self, config: &Config) -> Result<String> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?)
    }

    /// Verify and decode a JWT.
    pub fn decode(token: &str, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }
}

/// JWT claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the `Authorization` header, and check the
    /// voter it names still exists. Rights are taken from the voter record, so
    /// revoking admin rights takes effect immediately.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwraps are safe as `Config` and `Db` are always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();
        let db = req.guard::<&State<Db>>().await.unwrap();

        let bearer = match req
            .headers()
            .get_one("Authorization")
            .and_then(|header| header.strip_prefix(BEARER_PREFIX))
        {
            Some(bearer) => bearer.trim(),
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthenticated("No bearer token".to_string()),
                ))
            }
        };

        let token = match Self::decode(bearer, config) {
            Ok(token) => token,
            Err(e) => return Outcome::Failure((Status::Unauthorized, e)),
        };

        match db.voter_by_id(token.id).await {
            Ok(Some(voter)) => {
                req.local_cache(|| RequestVoter(Some(voter.id)));
                Outcome::Success(Self::new(&voter))
            }
            Ok(None) => Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthenticated("Unknown voter".to_string()),
            )),
            Err(e) => Outcome::Failure((Status::InternalServerError, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use crate::model::db::VoterCore;

    use super::*;

    fn config(secret: &str) -> Config {
        Figment::new()
            .merge(("jwt_secret", secret))
            .extract()
            .unwrap()
    }

    fn voter(is_admin: bool) -> Voter {
        let mut voter = VoterCore::example();
        voter.is_admin = is_admin;
        Voter {
            id: Id::new(),
            voter,
        }
    }

    #[test]
    fn encode_decode() {
        let config = config("top secret");
        let voter = voter(true);
        let jwt = AuthToken::new(&voter).encode(&config).unwrap();

        let token = AuthToken::decode(&jwt, &config).unwrap();
        assert_eq!(token.id, voter.id);
        assert!(token.is_admin());
    }

    #[test]
    fn wrong_secret_rejected() {
        let jwt = AuthToken::new(&voter(false))
            .encode(&config("one secret"))
            .unwrap();
        let err = AuthToken::decode(&jwt, &config("another secret")).unwrap_err();
        assert_eq!(err.status(), Status::Unauthorized);
    }

    #[test]
    fn guards() {
        let voter = voter(false);
        let token = AuthToken::new(&voter);
        assert!(matches!(
            token.require_admin("add elections"),
            Err(Error::Forbidden(_))
        ));
        assert!(token.require_voter(voter.id).is_ok());
        assert!(matches!(
            token.require_voter(Id::new()),
            Err(Error::Forbidden(_))
        ));
    }
}
