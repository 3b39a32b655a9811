use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub port: u16,
    pub batch_concurrency: usize,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::Postgres,
            database_url: None,
            port: 8081,
            batch_concurrency: 1,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let store = match get("LESSONS_STORE").as_deref().map(str::trim) {
            None | Some("") | Some("postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => bail!("LESSONS_STORE must be `postgres` or `memory`, got `{other}`"),
        };

        let database_url = get("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if store == StoreKind::Postgres && database_url.is_none() {
            bail!("DATABASE_URL not set");
        }

        let port = match get("PORT") {
            Some(p) => p.trim().parse().context("PORT must be a port number")?,
            None => defaults.port,
        };

        let batch_concurrency = match get("BATCH_CONCURRENCY") {
            Some(n) => n
                .trim()
                .parse::<usize>()
                .context("BATCH_CONCURRENCY must be a positive integer")?
                .max(1),
            None => defaults.batch_concurrency,
        };

        let max_body_bytes = match get("MAX_BODY_BYTES") {
            Some(n) => n
                .trim()
                .parse()
                .context("MAX_BODY_BYTES must be a byte count")?,
            None => defaults.max_body_bytes,
        };

        Ok(Config {
            store,
            database_url,
            port,
            batch_concurrency,
            max_body_bytes,
        })
    }
}
