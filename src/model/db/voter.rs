use std::ops::{Deref, DerefMut};

use argon2::Config as Argon2Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::Id;

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub full_name: String,
    /// Always lowercase, so lookups are case-insensitive.
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    /// IDs of the elections this voter has already voted in.
    #[serde(default)]
    pub voted_elections: Vec<Id>,
}

impl VoterCore {
    /// Create a new voter, hashing their password.
    pub fn new(full_name: String, email: &str, password: &str, is_admin: bool) -> Result<Self> {
        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(password.as_bytes(), &salt, &Argon2Config::default())?;
        Ok(Self {
            full_name,
            email: normalize_email(email),
            password_hash,
            is_admin,
            voted_elections: Vec::new(),
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> Result<bool> {
        Ok(argon2::verify_encoded(&self.password_hash, password.as_ref())?)
    }

    /// Has this voter already voted in the given election?
    pub fn has_voted_in(&self, election_id: Id) -> bool {
        self.voted_elections.contains(&election_id)
    }
}

/// Emails are unique regardless of case.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
