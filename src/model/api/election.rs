use rocket::fs::TempFile;
use serde::Serialize;

use crate::model::{
    db::Election,
    mongodb::{hex_id, hex_ids, Id},
};

/// Multipart form for creating or updating an election.
///
/// Every field is optional here; creation requires all of them, updates only
/// change the ones supplied.
#[derive(FromForm)]
pub struct ElectionForm<'r> {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<TempFile<'r>>,
}

/// An election as shown to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    #[serde(with = "hex_id")]
    pub id: Id,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    #[serde(with = "hex_ids")]
    pub candidates: Vec<Id>,
    #[serde(with = "hex_ids")]
    pub voters: Vec<Id>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let Election { id, election } = election;
        Self {
            id,
            title: election.title,
            description: election.description,
            thumbnail: election.thumbnail,
            candidates: election.candidates,
            voters: election.voters,
        }
    }
}
