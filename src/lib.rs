#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, IdentityFairing, StoreFairing};
use crate::logging::LoggerFairing;

pub mod admission;
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;

/// Build the server, configured from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(IdentityFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Build a server around an existing store and identity provider.
#[cfg(test)]
pub(crate) fn rocket_for(
    figment: rocket::figment::Figment,
    store: store::Store,
    identities: model::api::auth::Identities,
) -> Rocket<Build> {
    rocket::custom(figment)
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(store)
        .manage(identities)
        .mount("/", api::routes())
        .register("/", api::catchers())
}
