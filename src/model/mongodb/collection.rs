use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{election::Election, vote::Vote};

use super::counter::NetworkCounter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Election collection
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}

// Vote collection
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}

// Network counter collection
const NETWORK_COUNTERS: &str = "network_counters";
impl MongoCollection for NetworkCounter {
    const NAME: &'static str = NETWORK_COUNTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // Election collection: hosts list their own elections.
    let host_index = IndexModel::builder()
        .keys(doc! {"created_by": 1, "created_at": -1})
        .build();
    Coll::<Election>::from_db(db)
        .create_index(host_index, None)
        .await?;

    // Vote collection.
    let votes = Coll::<Vote>::from_db(db);
    let identity_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "identity_hash": 1})
        .options(
            IndexOptions::builder()
                .name("one_vote_per_identity".to_string())
                .unique(true)
                .build(),
        )
        .build();
    votes.create_index(identity_index, None).await?;

    // Votes without a device fingerprint must not collide with each other.
    let device_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "device_hash": 1})
        .options(
            IndexOptions::builder()
                .name("one_vote_per_device".to_string())
                .unique(true)
                .partial_filter_expression(doc! {"device_hash": {"$exists": true}})
                .build(),
        )
        .build();
    votes.create_index(device_index, None).await?;

    let network_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "ip_address": 1})
        .build();
    votes.create_index(network_index, None).await?;

    Ok(())
}
