//! Types that cross the HTTP boundary.
//!
//! IDs are serialised as plain hex strings and fields in camelCase.

use serde::Serialize;

pub mod auth;
pub mod candidate;
pub mod election;
pub mod vote;
pub mod voter;

/// A plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
