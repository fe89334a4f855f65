use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        digest::{DeviceHash, IdentityHash},
        election::Selections,
    },
    mongodb::Id,
};

/// An admitted vote. Written exactly once and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub election_id: Id,
    pub identity_hash: IdentityHash,
    // Omitted entirely rather than stored as null, so the partial unique
    // index on devices only covers votes that supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_hash: Option<DeviceHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub selections: Selections,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}
