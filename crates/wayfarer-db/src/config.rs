//! Trip store configuration.
//!
//! The effective database URL is resolved through one precedence chain so
//! the CLI flag, env-driven deployments, and the CLI's config file all feed
//! the same place: explicit flag > `WAYFARER_DATABASE_URL` > config-file
//! value > compile-time default.

use std::env;

/// Connection settings for the trip store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// Environment variable consulted during resolution.
    pub const ENV_VAR: &str = "WAYFARER_DATABASE_URL";

    /// URL used when nothing else is configured.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/wayfarer";

    /// Resolve the URL through the precedence chain.
    ///
    /// `flag` is an explicit override (CLI `--database-url`); `file_url`
    /// is the value from the CLI config file, if one was loaded.
    pub fn resolve(flag: Option<&str>, file_url: Option<&str>) -> Self {
        let database_url = flag
            .map(str::to_owned)
            .or_else(|| env::var(Self::ENV_VAR).ok())
            .or_else(|| file_url.map(str::to_owned))
            .unwrap_or_else(|| Self::DEFAULT_URL.to_owned());
        Self { database_url }
    }

    /// Environment-only resolution (no flag, no config file).
    pub fn from_env() -> Self {
        Self::resolve(None, None)
    }

    /// Build a config from an explicit URL (tests, tooling).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Server root and database name, when the URL carries a path
    /// component after the authority.
    fn split(&self) -> (&str, Option<&str>) {
        match self.database_url.rsplit_once('/') {
            Some((server, db)) if server.contains("://") && !db.is_empty() => (server, Some(db)),
            _ => (self.database_url.as_str(), None),
        }
    }

    /// The database name named by the URL, if any.
    pub fn database_name(&self) -> Option<&str> {
        self.split().1
    }

    /// URL of the `postgres` maintenance database on the same server.
    ///
    /// `wayfarer db-init` connects here to issue `CREATE DATABASE` when the
    /// target database is absent.
    pub fn maintenance_url(&self) -> String {
        match self.split() {
            (server, Some(_)) => format!("{server}/postgres"),
            (whole, None) => whole.to_owned(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_config_file() {
        let cfg = DbConfig::resolve(
            Some("postgresql://flag:5432/flagdb"),
            Some("postgresql://file:5432/filedb"),
        );
        assert_eq!(cfg.database_url, "postgresql://flag:5432/flagdb");
    }

    #[test]
    fn config_file_beats_default() {
        let cfg = DbConfig::resolve(None, Some("postgresql://file:5432/filedb"));
        assert_eq!(cfg.database_url, "postgresql://file:5432/filedb");
    }

    #[test]
    fn database_name_extraction() {
        let cfg = DbConfig::new("postgresql://localhost:5432/mydb");
        assert_eq!(cfg.database_name(), Some("mydb"));
    }

    #[test]
    fn url_without_database_has_no_name() {
        let cfg = DbConfig::new("postgresql://localhost:5432");
        assert_eq!(cfg.database_name(), None);
        // Nothing to strip, so the maintenance URL is the URL itself.
        assert_eq!(cfg.maintenance_url(), "postgresql://localhost:5432");
    }

    #[test]
    fn maintenance_url_replaces_database() {
        let cfg = DbConfig::new("postgresql://localhost:5432/wayfarer");
        assert_eq!(
            cfg.maintenance_url(),
            "postgresql://localhost:5432/postgres"
        );
    }
}
