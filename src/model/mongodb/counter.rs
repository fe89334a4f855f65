use mongodb::{
    bson::{doc, Document},
    error::Error as DbError,
    options::FindOneAndUpdateOptions,
    ClientSession,
};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};

/// Counts the votes admitted from one network address in one election.
///
/// The vote collection alone cannot enforce a cap atomically: two concurrent
/// transactions could both count two votes and both insert a third. Bumping
/// this document inside the same transaction makes them conflict instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkCounter {
    #[serde(rename = "_id")]
    pub key: NetworkKey,
    pub votes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkKey {
    pub election_id: Id,
    pub ip_address: String,
}

impl NetworkCounter {
    fn filter(election_id: Id, ip_address: &str) -> Document {
        // Embedded document equality is field-order sensitive, so this must
        // match the field order of `NetworkKey`.
        doc! {
            "_id": {
                "election_id": election_id,
                "ip_address": ip_address,
            }
        }
    }

    /// Number of votes already admitted from this address.
    pub async fn current(
        counters: &Coll<NetworkCounter>,
        election_id: Id,
        ip_address: &str,
        session: &mut ClientSession,
    ) -> Result<u32, DbError> {
        let counter = counters
            .find_one_with_session(Self::filter(election_id, ip_address), None, session)
            .await?;
        Ok(counter.map(|c| c.votes).unwrap_or(0))
    }

    /// Count one more vote from this address, creating the counter if needed.
    ///
    /// Every stored vote with an address is counted, whether or not a cap is
    /// in force, so the counter always agrees with the vote collection. With
    /// a `cap`, only a counter below it matches: at the cap the upsert
    /// collides with the existing counter and a duplicate key error is
    /// returned.
    pub async fn record(
        counters: &Coll<NetworkCounter>,
        election_id: Id,
        ip_address: &str,
        cap: Option<u32>,
        session: &mut ClientSession,
    ) -> Result<(), DbError> {
        let update = doc! {
            "$inc": { "votes": 1 }
        };
        let options = FindOneAndUpdateOptions::builder().upsert(true).build();
        counters
            .find_one_and_update_with_session(
                Self::filter_below(election_id, ip_address, cap),
                update,
                options,
                session,
            )
            .await?;
        Ok(())
    }

    fn filter_below(election_id: Id, ip_address: &str, cap: Option<u32>) -> Document {
        let mut filter = Self::filter(election_id, ip_address);
        if let Some(cap) = cap {
            filter.insert("votes", doc! { "$lt": cap });
        }
        filter
    }
}
