use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::Voter,
    mongodb::{hex_id, hex_ids, Id},
};

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A registration form. Missing fields deserialise as empty and are rejected
/// by [`RegisterRequest::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

impl RegisterRequest {
    /// Check the form is complete and the passwords are acceptable.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("fullName", &self.full_name),
            ("email", &self.email),
            ("password", &self.password),
            ("password2", &self.password2),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid(field, "Fill in all fields"));
            }
        }
        if self.password.trim().len() < MIN_PASSWORD_LENGTH
            || self.password2.trim().len() < MIN_PASSWORD_LENGTH
        {
            return Err(Error::invalid(
                "password",
                format!("Passwords should be at least {MIN_PASSWORD_LENGTH} characters long"),
            ));
        }
        if self.password != self.password2 {
            return Err(Error::invalid("password2", "Passwords do not match"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// A successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub is_admin: bool,
    pub token: String,
    #[serde(with = "hex_ids")]
    pub voted_elections: Vec<Id>,
}

/// A voter as shown to clients: never includes the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub full_name: String,
    pub email: String,
    pub is_admin: bool,
    #[serde(with = "hex_ids")]
    pub voted_elections: Vec<Id>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id,
            full_name: voter.voter.full_name,
            email: voter.voter.email,
            is_admin: voter.voter.is_admin,
            voted_elections: voter.voter.voted_elections,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl RegisterRequest {
        pub fn example() -> Self {
            Self {
                full_name: "Ada Lovelace".into(),
                email: "Ada@Example.com".into(),
                password: "hunter22".into(),
                password2: "hunter22".into(),
            }
        }

        /// Registration for the configured test admin.
        pub fn admin() -> Self {
            Self {
                full_name: "Election Officer".into(),
                email: "officer@example.com".into(),
                password: "coordinator".into(),
                password2: "coordinator".into(),
            }
        }

        pub fn login(&self) -> LoginRequest {
            LoginRequest {
                email: self.email.clone(),
                password: self.password.clone(),
            }
        }
    }
}
