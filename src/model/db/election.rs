use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: String,
    /// URL of the thumbnail image.
    pub thumbnail: String,
    /// Candidates standing in this election, in creation order.
    #[serde(default)]
    pub candidates: Vec<Id>,
    /// Voters who have voted in this election.
    #[serde(default)]
    pub voters: Vec<Id>,
}

impl ElectionCore {
    /// Create a new election with no candidates and no voters.
    pub fn new(title: String, description: String, thumbnail: String) -> Self {
        Self {
            title,
            description,
            thumbnail,
            candidates: Vec::new(),
            voters: Vec::new(),
        }
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Changes to an election's metadata. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElectionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

impl ElectionPatch {
    /// Apply this patch to an election in place.
    pub fn apply_to(&self, election: &mut ElectionCore) {
        if let Some(title) = &self.title {
            election.title = title.clone();
        }
        if let Some(description) = &self.description {
            election.description = description.clone();
        }
        if let Some(thumbnail) = &self.thumbnail {
            election.thumbnail = thumbnail.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.thumbnail.is_none()
    }
}
