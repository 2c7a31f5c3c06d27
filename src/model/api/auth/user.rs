use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::db::Voter;

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Rights {
    /// The rights held by the given voter.
    pub fn of(voter: &Voter) -> Self {
        if voter.is_admin {
            Self::Admin
        } else {
            Self::Voter
        }
    }
}
