use std::str::FromStr;
use std::time;

use chrono::NaiveTime;
use envconfig::Envconfig;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};

use crate::error::{ConfigError, LookupError};
use crate::normalize::TimeWindow;

/// Everything an ingestion session needs to know about its museum and database.
/// Both the batch and the streaming binaries nest this in their own config.
#[derive(Envconfig, Clone)]
pub struct SessionConfig {
    #[envconfig(from = "PIPELINE_TARGET_HOST", default = "localhost")]
    pub host: String,

    #[envconfig(from = "PIPELINE_TARGET_PORT", default = "5432")]
    pub port: u16,

    #[envconfig(from = "PIPELINE_TARGET_USER", default = "museum")]
    pub user: String,

    #[envconfig(from = "PIPELINE_TARGET_PASSWORD", default = "museum")]
    pub password: String,

    #[envconfig(from = "PIPELINE_TARGET_DBNAME", default = "museum")]
    pub dbname: String,

    #[envconfig(from = "MUSEUM_NAME", default = "lmnh")]
    pub museum_name: NonEmptyString,

    #[envconfig(from = "WINDOW_START")]
    pub window_start: Option<EnvTime>,

    #[envconfig(from = "WINDOW_END")]
    pub window_end: Option<EnvTime>,
}

impl SessionConfig {
    pub fn museum(&self) -> &str {
        self.museum_name.as_str()
    }

    /// The operating-hours window for this museum.
    /// Explicit WINDOW_START/WINDOW_END take precedence over the built-in museum presets.
    pub fn window(&self) -> Result<TimeWindow, ConfigError> {
        match (&self.window_start, &self.window_end) {
            (Some(start), Some(end)) => Ok(TimeWindow::new(start.0, end.0)),
            (None, None) => museum_preset(self.museum())
                .ok_or_else(|| ConfigError::MissingWindow(self.museum().to_owned())),
            _ => Err(ConfigError::PartialWindow),
        }
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
    }

    /// Open the single connection a session owns for both reference reads and destination writes.
    pub async fn connect(&self) -> Result<PgConnection, LookupError> {
        PgConnection::connect_with(&self.connect_options())
            .await
            .map_err(|error| LookupError::Connection { error })
    }
}

/// Opening hours of the museums the pipeline was first deployed for.
pub fn museum_preset(museum: &str) -> Option<TimeWindow> {
    let (start, end) = match museum {
        "lmnh" => ((8, 45), (18, 15)),
        "lms" => ((10, 45), (16, 15)),
        _ => return None,
    };

    Some(TimeWindow::new(
        NaiveTime::from_hms_opt(start.0, start.1, 0)?,
        NaiveTime::from_hms_opt(end.0, end.1, 0)?,
    ))
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

/// A time of day read from the environment as `HH:MM` or `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvTime(pub NaiveTime);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvTimeError;

impl FromStr for EnvTime {
    type Err = ParseEnvTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(EnvTime)
            .map_err(|_| ParseEnvTimeError)
    }
}

#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}
