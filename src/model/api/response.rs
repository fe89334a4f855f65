use std::collections::BTreeMap;

use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::election::{ElectionDescription, ElectionSummary},
    common::election::{CandidateIndex, PositionIndex},
    mongodb::{serde_nested_string_map, serde_string_map},
    report::ResultRow,
    tally::{Leader, Tally},
};

/// The envelope of every successful response: `{"ok": true, ...body}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Success<T> {
    pub fn json(body: T) -> Json<Self> {
        Json(Self { ok: true, body })
    }
}

/// A human-readable acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub identity: String,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub election: ElectionDescription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionList {
    pub elections: Vec<ElectionSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Closed {
    pub total_votes: u64,
}

/// Vote counts for an election, with the leading candidate(s) per position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionCounts {
    #[serde(with = "serde_nested_string_map")]
    pub vote_counts: BTreeMap<PositionIndex, BTreeMap<CandidateIndex, u64>>,
    pub total_votes: u64,
    /// Empty for a position nobody voted on; several entries for a tie.
    #[serde(with = "serde_string_map")]
    pub winners: BTreeMap<PositionIndex, Vec<CandidateIndex>>,
}

impl From<&Tally> for ElectionCounts {
    fn from(tally: &Tally) -> Self {
        let winners = tally
            .vote_counts()
            .keys()
            .map(|&position| {
                let leaders = match tally.leader(position) {
                    Leader::Nobody => Vec::new(),
                    Leader::Winner(candidate) => vec![candidate],
                    Leader::Tie(candidates) => candidates,
                };
                (position, leaders)
            })
            .collect();
        Self {
            vote_counts: tally.vote_counts().clone(),
            total_votes: tally.total_votes(),
            winners,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Results {
    pub results: Vec<ResultRow>,
}
