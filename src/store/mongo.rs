use log::{debug, info};
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession,
};
use rocket::{futures::TryStreamExt, http::Status};

use crate::error::{Error, Rejection, Result};
use crate::model::{
    common::identity::Identity,
    db::{
        election::{Election, NewElection},
        vote::Vote,
    },
    mongodb::{ensure_indexes_exist, is_retryable_transaction_error, Coll, Id, NetworkCounter},
};

use super::{check_election, ElectionStore};

/// How many times a conflicting admission is attempted before giving up.
const MAX_ADMISSION_ATTEMPTS: usize = 3;

/// A MongoDB-backed store.
///
/// Admission runs inside a multi-document transaction, so the server must be
/// part of a replica set.
pub struct MongoStore {
    client: Client,
    elections: Coll<Election>,
    votes: Coll<Vote>,
    counters: Coll<NetworkCounter>,
}

impl MongoStore {
    /// Connect to the given database and make sure its indexes are in place.
    pub async fn connect(uri: &str, db_name: &str) -> std::result::Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        info!("Using database {db_name}");

        Ok(Self {
            elections: Coll::from_db(&db),
            votes: Coll::from_db(&db),
            counters: Coll::from_db(&db),
            client,
        })
    }

    /// Run every gate and the writes in a single transaction.
    async fn try_admit(&self, vote: &Vote, network_cap: Option<u32>) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        match self.admit_in(vote, network_cap, &mut session).await {
            Ok(()) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(err) => {
                // The transaction dies with the session anyway.
                let _ = session.abort_transaction().await;
                Err(err)
            }
        }
    }

    async fn admit_in(
        &self,
        vote: &Vote,
        network_cap: Option<u32>,
        session: &mut ClientSession,
    ) -> Result<()> {
        let same_identity = doc! {
            "election_id": vote.election_id,
            "identity_hash": vote.identity_hash.as_str(),
        };
        if self
            .votes
            .find_one_with_session(same_identity, None, session)
            .await?
            .is_some()
        {
            return Err(Rejection::DuplicateIdentity.into());
        }

        if let Some(device) = &vote.device_hash {
            let same_device = doc! {
                "election_id": vote.election_id,
                "device_hash": device.as_str(),
            };
            if self
                .votes
                .find_one_with_session(same_device, None, session)
                .await?
                .is_some()
            {
                return Err(Rejection::DuplicateDevice.into());
            }
        }

        if let (Some(cap), Some(ip)) = (network_cap, &vote.ip_address) {
            let admitted =
                NetworkCounter::current(&self.counters, vote.election_id, ip, session).await?;
            if admitted >= cap {
                return Err(Rejection::NetworkLimitExceeded.into());
            }
        }

        let election = self
            .elections
            .find_one_with_session(vote.election_id.as_doc(), None, session)
            .await?;
        check_election(election.as_ref(), &vote.selections)?;

        // Everything read so far might be stale by now. Each write below
        // conflicts with any concurrent admission that would break a gate,
        // which aborts one of the two transactions.
        self.votes
            .insert_one_with_session(vote, None, session)
            .await?;
        if let Some(ip) = &vote.ip_address {
            NetworkCounter::record(&self.counters, vote.election_id, ip, network_cap, session)
                .await?;
        }
        let still_open = doc! {
            "_id": vote.election_id,
            "closed": false,
        };
        let update = doc! {
            "$inc": { "vote_count": 1 }
        };
        let counted = self
            .elections
            .update_one_with_session(still_open, update, None, session)
            .await?;
        if counted.matched_count == 0 {
            return Err(Rejection::ElectionClosed.into());
        }

        Ok(())
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn create_election(&self, election: NewElection) -> Result<Election> {
        let election = Election {
            id: Id::new(),
            election,
        };
        self.elections.insert_one(&election, None).await?;
        Ok(election)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn elections_hosted_by(&self, host: &Identity) -> Result<Vec<Election>> {
        let filter = doc! {
            "created_by": host.to_string(),
        };
        let options = FindOptions::builder()
            .sort(doc! {"created_at": -1, "_id": -1})
            .build();
        let elections: Vec<Election> = self
            .elections
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn close_election(&self, id: Id) -> Result<Election> {
        let open = doc! {
            "_id": id,
            "closed": false,
        };
        let update = doc! {
            "$set": { "closed": true }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        if let Some(closed) = self
            .elections
            .find_one_and_update(open, update, options)
            .await?
        {
            return Ok(closed);
        }

        // Work out why nothing matched.
        match self.election(id).await? {
            Some(_) => Err(Error::Status(
                Status::BadRequest,
                format!("Election {id} is already closed"),
            )),
            None => Err(Error::not_found(format!("Election {id}"))),
        }
    }

    async fn admit_vote(&self, vote: Vote, network_cap: Option<u32>) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.try_admit(&vote, network_cap).await {
                // A lost race: the next attempt sees the winner's writes and
                // reports the precise rejection.
                Err(Error::Db(err))
                    if attempt < MAX_ADMISSION_ATTEMPTS && is_retryable_transaction_error(&err) =>
                {
                    debug!("Vote admission conflicted on attempt {attempt}, retrying: {err}");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn votes(&self, election_id: Id) -> Result<Vec<Vote>> {
        let filter = doc! {
            "election_id": election_id,
        };
        let votes: Vec<Vote> = self.votes.find(filter, None).await?.try_collect().await?;
        Ok(votes)
    }
}

/// These need a MongoDB replica set, given as `db_uri` in `Rocket.toml` or
/// `ROCKET_DB_URI`. Run them with `cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use std::{future::Future, sync::Arc};

    use chrono::Utc;
    use rocket::futures::future::join_all;

    use super::*;
    use crate::model::common::digest::{DeviceHash, IdentityHash};

    const SECRET: &[u8] = b"mongo store tests";
    const IP: &str = "203.0.113.7";

    /// Run a test against a throwaway database, dropping it however the test
    /// terminates.
    async fn with_store<F, Fut>(test: F)
    where
        F: FnOnce(Arc<MongoStore>, Id) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let uri: String = rocket::Config::figment()
            .extract_inner("db_uri")
            .expect("`db_uri` must be configured for database tests");
        let db_name = format!("ballotbox_test_{}", Id::new());
        let store = Arc::new(MongoStore::connect(&uri, &db_name).await.unwrap());
        let election = store
            .create_election(NewElection::example())
            .await
            .unwrap();

        let result = rocket::tokio::spawn(test(store.clone(), election.id)).await;
        store.client.database(&db_name).drop(None).await.unwrap();
        if let Err(err) = result {
            std::panic::resume_unwind(err.into_panic());
        }
    }

    fn vote(election_id: Id, identity: &str, device: Option<&str>, ip: Option<&str>) -> Vote {
        Vote {
            election_id,
            identity_hash: IdentityHash::new(&identity.parse().unwrap(), SECRET),
            device_hash: device.and_then(|d| DeviceHash::new(d, SECRET)),
            ip_address: ip.map(str::to_string),
            selections: [(0, 0)].into_iter().collect(),
            cast_at: Utc::now(),
        }
    }

    fn rejection(result: Result<()>) -> Rejection {
        match result {
            Err(Error::Rejected(rejection)) => rejection,
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn admits_once_per_identity_and_device() {
        with_store(|store, id| async move {
            store
                .admit_vote(vote(id, "a@example.com", Some("device-1"), None), Some(3))
                .await
                .unwrap();
            let again = store
                .admit_vote(vote(id, "A@Example.com", Some("device-2"), None), Some(3))
                .await;
            assert_eq!(rejection(again), Rejection::DuplicateIdentity);
            let shared = store
                .admit_vote(vote(id, "b@example.com", Some("device-1"), None), Some(3))
                .await;
            assert_eq!(rejection(shared), Rejection::DuplicateDevice);

            // Votes without fingerprints are outside the device index.
            for voter in ["c@example.com", "d@example.com"] {
                store
                    .admit_vote(vote(id, voter, None, None), Some(3))
                    .await
                    .unwrap();
            }
            assert_eq!(store.votes(id).await.unwrap().len(), 3);
            assert_eq!(store.election(id).await.unwrap().unwrap().vote_count, 3);
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn network_cap_counts_votes_cast_while_uncapped() {
        with_store(|store, id| async move {
            for voter in ["a@example.com", "b@example.com", "c@example.com"] {
                store
                    .admit_vote(vote(id, voter, None, Some(IP)), None)
                    .await
                    .unwrap();
            }
            let capped = store
                .admit_vote(vote(id, "d@example.com", None, Some(IP)), Some(3))
                .await;
            assert_eq!(rejection(capped), Rejection::NetworkLimitExceeded);
            store
                .admit_vote(vote(id, "d@example.com", None, Some("198.51.100.1")), Some(3))
                .await
                .unwrap();
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn closed_election_counts_no_more_votes() {
        with_store(|store, id| async move {
            store
                .admit_vote(vote(id, "a@example.com", None, None), None)
                .await
                .unwrap();
            let closed = store.close_election(id).await.unwrap();
            assert!(closed.closed);
            assert_eq!(closed.vote_count, 1);

            let late = store
                .admit_vote(vote(id, "b@example.com", None, None), None)
                .await;
            assert_eq!(rejection(late), Rejection::ElectionClosed);
            let again = store.close_election(id).await.unwrap_err();
            assert_eq!(again.status(), Status::BadRequest);
            assert_eq!(store.votes(id).await.unwrap().len(), 1);
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn concurrent_duplicates_admit_one_vote() {
        with_store(|store, id| async move {
            let same_voter = (0..4).map(|n| {
                let device = format!("device-{n}");
                let store = store.clone();
                async move {
                    store
                        .admit_vote(vote(id, "a@example.com", Some(&device), None), None)
                        .await
                }
            });
            let admitted = join_all(same_voter)
                .await
                .into_iter()
                .filter(Result::is_ok)
                .count();
            assert_eq!(admitted, 1);

            let same_network = ["b@example.com", "c@example.com", "d@example.com"]
                .into_iter()
                .map(|voter| {
                    let store = store.clone();
                    async move { store.admit_vote(vote(id, voter, None, Some(IP)), Some(1)).await }
                });
            let admitted = join_all(same_network)
                .await
                .into_iter()
                .filter(Result::is_ok)
                .count();
            assert_eq!(admitted, 1);
            assert_eq!(store.votes(id).await.unwrap().len(), 2);
        })
        .await;
    }
}
