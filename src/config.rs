use std::sync::Arc;

use chrono::Duration;
use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::api::auth::{FirebaseIdentityProvider, Identities};
use crate::store::{MemoryStore, MongoStore, Store};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default = "enabled")]
    require_verified: bool,
    #[serde(default = "enabled")]
    device_limit: bool,
    #[serde(default = "enabled")]
    network_limit: bool,
    #[serde(default = "default_max_votes_per_network")]
    max_votes_per_network: u32,
    // secrets
    jwt_secret: String,
    hmac_secret: String,
}

fn enabled() -> bool {
    true
}

fn default_max_votes_per_network() -> u32 {
    3
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key used to sign HMACs.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }

    /// Must voters have verified their identity with the provider?
    pub fn require_verified(&self) -> bool {
        self.require_verified
    }

    /// Is the one-vote-per-device gate enabled?
    pub fn device_limit(&self) -> bool {
        self.device_limit
    }

    /// Maximum votes admitted from one network address per election, if capped.
    pub fn network_cap(&self) -> Option<u32> {
        self.network_limit.then_some(self.max_votes_per_network)
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.hmac_secret.is_empty() {
            error!("`hmac_secret` must not be empty");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: Option<String>,
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "ballotbox".to_string()
}

/// A fairing that loads the storage config, connects to the database if one
/// is configured, and places the resulting [`Store`] into managed state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: Store = match config.db_uri {
            Some(uri) => {
                info!("Loaded database config, connecting...");
                match MongoStore::connect(&uri, &config.db_name).await {
                    Ok(store) => {
                        info!("...database connection online!");
                        Arc::new(store)
                    }
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                }
            }
            None => {
                warn!("No `db_uri` configured, votes will be kept in memory and lost on shutdown");
                Arc::new(MemoryStore::new())
            }
        };

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Configuration for the identity provider.
#[derive(Deserialize)]
struct IdentityConfig {
    // secrets
    firebase_api_key: String,
}

/// A fairing that loads the identity provider config and places the provider
/// into managed state.
pub struct IdentityFairing;

#[rocket::async_trait]
impl Fairing for IdentityFairing {
    fn info(&self) -> Info {
        Info {
            name: "Identity provider",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<IdentityConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load identity provider config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let identities: Identities =
            Arc::new(FirebaseIdentityProvider::new(config.firebase_api_key));
        info!("Loaded Firebase identity provider config");

        // Manage the state.
        rocket = rocket.manage(identities);
        Ok(rocket)
    }
}
