//! The vote admission check.
//!
//! A submission passes through the identity gates here, is hashed, and is
//! then handed to the [`ElectionStore`](crate::store::ElectionStore), which
//! evaluates the remaining gates atomically with the write.

use chrono::Utc;
use log::{debug, info};

use crate::config::Config;
use crate::error::{Error, Rejection, Result};
use crate::model::{
    common::{
        digest::{DeviceHash, IdentityHash},
        election::Selections,
        identity::Identity,
    },
    db::vote::Vote,
    mongodb::Id,
};
use crate::store::Store;

/// Everything known about one vote submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub election_id: Id,
    /// The raw identity, exactly as received.
    pub identity: Option<String>,
    /// Whether the identity provider has confirmed the identity.
    pub verified: bool,
    pub device_fingerprint: Option<String>,
    pub ip_address: Option<String>,
    pub selections: Selections,
}

/// Run the admission check, writing the vote only if every gate passes.
///
/// Gates are evaluated in a fixed order and the first failure is reported.
pub async fn admit(store: &Store, config: &Config, submission: Submission) -> Result<()> {
    let election_id = submission.election_id;
    match try_admit(store, config, submission).await {
        Err(Error::Rejected(rejection)) => {
            info!("Vote for election {election_id} rejected: {rejection:?}");
            Err(rejection.into())
        }
        Ok(()) => {
            debug!("Vote for election {election_id} admitted");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn try_admit(store: &Store, config: &Config, submission: Submission) -> Result<()> {
    let raw_identity = submission
        .identity
        .as_deref()
        .map(str::trim)
        .filter(|identity| !identity.is_empty())
        .ok_or(Rejection::MissingIdentity)?;
    let identity: Identity = raw_identity
        .parse()
        .map_err(|_| Rejection::InvalidIdentity)?;
    if config.require_verified() && !submission.verified {
        return Err(Rejection::UnverifiedIdentity.into());
    }

    let device_hash = if config.device_limit() {
        submission
            .device_fingerprint
            .as_deref()
            .and_then(|fingerprint| DeviceHash::new(fingerprint, config.hmac_secret()))
    } else {
        None
    };

    let vote = Vote {
        election_id: submission.election_id,
        identity_hash: IdentityHash::new(&identity, config.hmac_secret()),
        device_hash,
        ip_address: submission.ip_address,
        selections: submission.selections,
        cast_at: Utc::now(),
    };
    store.admit_vote(vote, config.network_cap()).await
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Submission {
        /// A verified voter choosing the first candidate for every position of
        /// [`ElectionCore::example`](crate::model::db::election::ElectionCore::example).
        pub fn example(election_id: Id) -> Self {
            Self {
                election_id,
                identity: Some(Identity::example().to_string()),
                verified: true,
                device_fingerprint: Some("fingerprint-1".to_string()),
                ip_address: Some("203.0.113.7".to_string()),
                selections: [(0, 0), (1, 0)].into_iter().collect(),
            }
        }
    }
}
