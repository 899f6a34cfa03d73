//! Settings - 設定の読み込みと検証
//!
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. optional config file (`config/lapse.{toml,yaml,json}` or an explicit path)
//! 3. environment, `LAPSE__SECTION__KEY` (e.g. `LAPSE__SWEEP__CONCURRENCY=4`)

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::app::executor::{EXPIRATION_NOTE, SYSTEM_ACTOR};
use crate::domain::DEFAULT_DATE_FORMAT;

/// Default config file looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config/lapse";

/// Environment prefix.
pub const ENV_PREFIX: &str = "LAPSE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

/// A deadline format must render a date and read the same date back.
fn check_date_format(format: &str) -> Result<(), ConfigError> {
    const KEY: &str = "sweep.date_format";
    let sample = NaiveDate::from_ymd_opt(2024, 3, 15)
        .ok_or_else(|| invalid(KEY, "cannot build sample date"))?;

    let mut rendered = String::new();
    write!(rendered, "{}", sample.format(format))
        .map_err(|_| invalid(KEY, format!("{format:?} is not a valid strftime format")))?;

    match NaiveDate::parse_from_str(&rendered, format) {
        Ok(parsed) if parsed == sample => Ok(()),
        _ => Err(invalid(
            KEY,
            format!("{format:?} does not identify a calendar date"),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// EnvFilter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Http,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub kind: StoreKind,

    /// Root of the quote API, e.g. `https://quotes.internal/api/v4`.
    pub base_url: Option<String>,

    /// Sent as a bearer token when set.
    pub auth_token: Option<String>,

    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,

    /// JSON array of quotes loaded into the in-memory store.
    pub seed_file: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kind: StoreKind::Http,
            base_url: None,
            auth_token: None,
            connect_timeout_secs: 30,
            request_timeout_secs: 60,
            seed_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// UTC wall-clock time of the daily sweep, `HH:MM` or `HH:MM:SS`.
    pub run_at: String,
    pub run_on_start: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            run_at: "02:00:00".to_string(),
            run_on_start: false,
        }
    }
}

impl ScheduleSettings {
    pub fn run_at_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&self.run_at, "%H:%M"))
            .map_err(|e| invalid("schedule.run_at", format!("{:?}: {e}", self.run_at)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub system_actor: String,
    pub note_text: String,
    pub date_format: String,
    pub concurrency: usize,
    pub reconcile_missing_notes: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            system_actor: SYSTEM_ACTOR.to_string(),
            note_text: EXPIRATION_NOTE.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            concurrency: 1,
            reconcile_missing_notes: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub store: StoreSettings,
    pub schedule: ScheduleSettings,
    pub sweep: SweepSettings,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Fail-fast checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule.run_at_time()?;

        if self.sweep.concurrency == 0 {
            return Err(invalid("sweep.concurrency", "must be at least 1"));
        }
        if self.sweep.system_actor.trim().is_empty() {
            return Err(invalid("sweep.system_actor", "must not be empty"));
        }
        if self.sweep.note_text.trim().is_empty() {
            return Err(invalid("sweep.note_text", "must not be empty"));
        }
        check_date_format(&self.sweep.date_format)?;

        match self.store.kind {
            StoreKind::Http => {
                self.store_base_url()?;
                if self.store.connect_timeout_secs == 0 {
                    return Err(invalid("store.connect_timeout_secs", "must be positive"));
                }
                if self.store.request_timeout_secs == 0 {
                    return Err(invalid("store.request_timeout_secs", "must be positive"));
                }
            }
            StoreKind::Memory => {
                if let Some(seed) = &self.store.seed_file
                    && !seed.is_file()
                {
                    return Err(invalid(
                        "store.seed_file",
                        format!("{} is not a file", seed.display()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Parsed `store.base_url`; required for the HTTP store.
    pub fn store_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .store
            .base_url
            .as_deref()
            .ok_or_else(|| invalid("store.base_url", "required when store.kind = \"http\""))?;
        let url = Url::parse(raw).map_err(|e| invalid("store.base_url", format!("{raw:?}: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(invalid("store.base_url", format!("{raw:?} cannot be a base URL")));
        }
        Ok(url)
    }

    /// Copy safe to print: secrets masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.store.auth_token.is_some() {
            copy.store.auth_token = Some("********".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn memory() -> Settings {
        let mut s = Settings::default();
        s.store.kind = StoreKind::Memory;
        s
    }

    #[test]
    fn defaults_match_reference_configuration() {
        let s = Settings::default();
        assert_eq!(s.store.connect_timeout_secs, 30);
        assert_eq!(s.store.request_timeout_secs, 60);
        assert_eq!(s.sweep.system_actor, "system");
        assert_eq!(s.sweep.concurrency, 1);
        assert!(!s.sweep.reconcile_missing_notes);
        assert_eq!(
            s.schedule.run_at_time().unwrap(),
            NaiveTime::from_hms_opt(2, 0, 0).unwrap()
        );
    }

    #[test]
    fn http_store_requires_base_url() {
        let err = Settings::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "store.base_url", .. }));
    }

    #[test]
    fn memory_store_validates_without_url() {
        memory().validate().unwrap();
    }

    #[test]
    fn run_at_accepts_short_form() {
        let mut s = memory();
        s.schedule.run_at = "23:15".to_string();
        s.validate().unwrap();
        assert_eq!(
            s.schedule.run_at_time().unwrap(),
            NaiveTime::from_hms_opt(23, 15, 0).unwrap()
        );
    }

    #[test]
    fn rejects_bad_values() {
        let mut s = memory();
        s.schedule.run_at = "25:00".to_string();
        assert!(s.validate().is_err());

        let mut s = memory();
        s.sweep.concurrency = 0;
        assert!(matches!(
            s.validate(),
            Err(ConfigError::Invalid { key: "sweep.concurrency", .. })
        ));

        let mut s = memory();
        s.store.seed_file = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(s.validate().is_err());
    }

    #[rstest]
    #[case::literal("literal")]
    #[case::empty("")]
    #[case::year_only("%Y")]
    #[case::time_only("%H:%M")]
    #[case::unknown_specifier("%Y-%m-%Q")]
    fn rejects_date_formats_without_a_date(#[case] format: &str) {
        let mut s = memory();
        s.sweep.date_format = format.to_string();
        assert!(matches!(
            s.validate(),
            Err(ConfigError::Invalid { key: "sweep.date_format", .. })
        ));
    }

    #[rstest]
    #[case::iso("%Y-%m-%d")]
    #[case::short_iso("%F")]
    #[case::european("%d.%m.%Y")]
    #[case::us("%m/%d/%Y")]
    fn accepts_date_formats(#[case] format: &str) {
        let mut s = memory();
        s.sweep.date_format = format.to_string();
        s.validate().unwrap();
    }

    #[test]
    fn loads_file_and_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[store]
kind = "http"
base_url = "http://localhost:8080/api"
auth_token = "secret"

[sweep]
concurrency = 4
reconcile_missing_notes = true
"#
        )
        .unwrap();

        let s = Settings::load(Some(file.path())).unwrap();
        s.validate().unwrap();
        assert_eq!(s.store.kind, StoreKind::Http);
        assert_eq!(s.sweep.concurrency, 4);
        assert!(s.sweep.reconcile_missing_notes);
        assert_eq!(s.store.request_timeout_secs, 60);
        assert_eq!(s.schedule.run_at, "02:00:00");
        assert_eq!(s.redacted().store.auth_token.as_deref(), Some("********"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/no/such/lapse.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
