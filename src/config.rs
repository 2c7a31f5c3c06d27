use std::path::{Path, PathBuf};

use chrono::Duration;
use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    fs::FileServer,
    Build, Rocket,
};
use serde::Deserialize;

use crate::media::{MediaStore, UPLOADS_ROUTE};
use crate::model::db::voter::normalize_email;
use crate::model::mongodb::ensure_indexes_exist;
use crate::store::{Db, MemoryStore, MongoStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_auth_ttl")]
    auth_ttl: u32,
    #[serde(default)]
    admin_emails: Vec<String>,
    // secrets
    jwt_secret: String,
}

fn default_auth_ttl() -> u32 {
    24 * 60 * 60
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Should a voter registering with this email be granted admin rights?
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.admin_emails
            .iter()
            .any(|admin| normalize_email(admin) == email)
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
        if config.admin_emails.is_empty() {
            warn!("No `admin_emails` configured: nobody can manage elections");
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
    "voting".to_string()
}

/// A fairing that loads the store config, connects to MongoDB, performs any
/// setup necessary, and places a [`Db`] handle into managed state.
///
/// Without a `db_uri`, an in-memory store is used instead.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
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

        let db_uri = match config.db_uri {
            Some(uri) => uri,
            None => {
                warn!("No `db_uri` configured: using an in-memory store, data will not persist");
                rocket = rocket.manage(Db::new(MemoryStore::new()));
                return Ok(rocket);
            }
        };

        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(Db::new(MongoStore::new(client, &db)));
        Ok(rocket)
    }
}

/// Configuration for uploaded media.
#[derive(Deserialize)]
struct MediaConfig {
    #[serde(default = "default_upload_dir")]
    upload_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

/// A fairing that prepares the upload directory, places a [`MediaStore`]
/// into managed state, and serves the uploaded files.
pub struct MediaFairing;

#[rocket::async_trait]
impl Fairing for MediaFairing {
    fn info(&self) -> Info {
        Info {
            name: "Media",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<MediaConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load media config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Err(e) = rocket::tokio::fs::create_dir_all(&config.upload_dir).await {
            error!(
                "Failed to create upload directory {}: {e}",
                config.upload_dir.display()
            );
            return Err(rocket);
        }
        info!("Serving uploads from {}", config.upload_dir.display());

        rocket = rocket
            .mount(UPLOADS_ROUTE, FileServer::from(Path::new(&config.upload_dir)))
            .manage(MediaStore::new(config.upload_dir));
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;

    fn config_from(figment: Figment) -> Config {
        figment.extract().unwrap()
    }

    #[test]
    fn admin_allowlist_is_case_insensitive() {
        let config = config_from(
            Figment::new()
                .merge(("jwt_secret", "secret"))
                .merge(("admin_emails", vec!["Admin@Example.com"])),
        );
        assert!(config.is_admin_email("admin@example.com"));
        assert!(config.is_admin_email(" ADMIN@example.COM"));
        assert!(!config.is_admin_email("someone@example.com"));
    }

    #[test]
    fn defaults() {
        let config = config_from(Figment::new().merge(("jwt_secret", "secret")));
        assert_eq!(config.auth_ttl(), Duration::days(1));
        assert!(!config.is_admin_email(""));
    }
}
