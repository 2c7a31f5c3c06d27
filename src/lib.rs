#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, MediaFairing, StoreFairing};
use crate::logging::LoggerFairing;
use crate::vote::VoteCoordinator;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod model;
pub mod store;
pub mod vote;

pub use config::Config;

/// Where the API routes are mounted.
pub const API_BASE: &str = "/api/v1/voting-app";

/// Build the server, connecting to the configured store on ignition.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build()).attach(StoreFairing)
}

/// Everything but the store.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(ConfigFairing)
        .attach(MediaFairing)
        .attach(LoggerFairing)
        .manage(VoteCoordinator::new())
        .mount(API_BASE, api::routes())
        .register("/", api::catchers())
}

/// A server backed by the given in-memory store, with test configuration.
#[cfg(test)]
pub(crate) fn rocket_for_test(
    store: store::MemoryStore,
    upload_dir: &std::path::Path,
) -> Rocket<Build> {
    use rocket::figment::Figment;

    let figment = Figment::from(rocket::Config::debug_default())
        .merge(("jwt_secret", "test secret, do not use"))
        .merge(("admin_emails", ["officer@example.com"]))
        .merge(("upload_dir", upload_dir))
        .merge(("limits.file", "2 MiB"))
        .merge(("limits.data-form", "4 MiB"))
        .merge(("log_level", "off"));
    assemble(rocket::custom(figment)).manage(store::Db::new(store))
}
