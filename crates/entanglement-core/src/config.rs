use std::{fmt, net::SocketAddr, path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use config as cfg;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Neutron releases with a known database schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum NeutronRelease {
    Kilo,
    Liberty,
    Mitaka,
    Newton,
    Ocata,
    Pike,
    Queens,
}

impl NeutronRelease {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kilo => "kilo",
            Self::Liberty => "liberty",
            Self::Mitaka => "mitaka",
            Self::Newton => "newton",
            Self::Ocata => "ocata",
            Self::Pike => "pike",
            Self::Queens => "queens",
        }
    }

    /// The parts of the database schema that changed between releases.
    pub fn schema(&self) -> DatabaseSchema {
        match self {
            Self::Kilo | Self::Liberty | Self::Mitaka => DatabaseSchema {
                project_id_column: "tenant_id",
            },
            Self::Newton | Self::Ocata | Self::Pike | Self::Queens => DatabaseSchema {
                project_id_column: "project_id",
            },
        }
    }
}

impl fmt::Display for NeutronRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NeutronRelease {
    type Err = crate::EntanglementError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kilo" => Ok(Self::Kilo),
            "liberty" => Ok(Self::Liberty),
            "mitaka" => Ok(Self::Mitaka),
            "newton" => Ok(Self::Newton),
            "ocata" => Ok(Self::Ocata),
            "pike" => Ok(Self::Pike),
            "queens" => Ok(Self::Queens),
            other => Err(crate::EntanglementError::Config(format!(
                "unknown Neutron release: {other:?}"
            ))),
        }
    }
}

impl TryFrom<String> for NeutronRelease {
    type Error = crate::EntanglementError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

static PROJECT_ID_COLUMN_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bproject_id\b").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseSchema {
    pub project_id_column: &'static str,
}

impl DatabaseSchema {
    /// Rewrites a query written against `project_id` for this schema.
    pub fn apply_to(&self, query: &str) -> String {
        PROJECT_ID_COLUMN_RX
            .replace_all(query, self.project_id_column)
            .into_owned()
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Connection string for the Neutron DB.
    pub postgres_uri: SecretString,
    /// Address to listen on for the Prometheus metrics endpoint.
    pub listen_address: SocketAddr,
    /// Partitions with a score higher than this are logged.
    #[serde(default = "Settings::default_score_log_limit")]
    pub score_log_limit: u64,
    pub neutron_release: NeutronRelease,
    #[serde(default = "Settings::default_scrape_interval_secs")]
    pub scrape_interval_secs: u64,
    #[serde(default = "Settings::default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
    #[serde(default = "Settings::default_log_level")]
    pub log_level: String,
}

impl Settings {
    fn default_score_log_limit() -> u64 {
        50
    }

    fn default_scrape_interval_secs() -> u64 {
        300
    }

    fn default_cycle_timeout_secs() -> u64 {
        120
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    /// Loads settings from an optional file, overridden by process environment
    /// variables (`POSTGRES_URI`, `LISTEN_ADDRESS`, `SCORE_LOG_LIMIT`, ...).
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = cfg::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(cfg::File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(cfg::Environment::default().try_parsing(true))
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.postgres_uri.expose_secret().trim().is_empty(),
            "postgres_uri cannot be empty"
        );
        anyhow::ensure!(
            self.scrape_interval_secs > 0,
            "scrape_interval_secs must be > 0"
        );
        anyhow::ensure!(self.cycle_timeout_secs > 0, "cycle_timeout_secs must be > 0");
        Ok(())
    }

    pub fn schema(&self) -> DatabaseSchema {
        self.neutron_release.schema()
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }
}
