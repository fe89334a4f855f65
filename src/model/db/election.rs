use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{election::Position, identity::Identity},
    mongodb::Id,
};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub positions: Vec<Position>,
    /// Once set, no further votes are admitted. Only the close operation sets this.
    pub closed: bool,
    /// The identity of the host who created the election.
    pub created_by: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Number of admitted votes, maintained by the admission check.
    pub vote_count: u64,
}

impl ElectionCore {
    /// Create a new, open election hosted by `host`.
    pub fn new(title: String, positions: Vec<Position>, host: &Identity) -> Self {
        Self {
            title,
            positions,
            closed: false,
            created_by: host.to_string(),
            created_at: Utc::now(),
            vote_count: 0,
        }
    }

    /// Is the given identity the host of this election?
    pub fn is_hosted_by(&self, identity: &Identity) -> bool {
        self.created_by == identity.to_string()
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
