use std::str::FromStr;

use envconfig::Envconfig;

use interaction_common::config::{NonEmptyString, SessionConfig};

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "SOURCE_KIND", default = "s3")]
    pub source_kind: SourceKind,

    #[envconfig(from = "S3_BUCKET")]
    pub s3_bucket: Option<NonEmptyString>,

    #[envconfig(from = "S3_PREFIX", default = "")]
    pub s3_prefix: String,

    #[envconfig(from = "S3_REGION", default = "eu-west-2")]
    pub s3_region: String,

    // Set this to point at a local S3 compatible service, e.g. minio.
    #[envconfig(from = "S3_ENDPOINT")]
    pub s3_endpoint: Option<NonEmptyString>,

    #[envconfig(from = "AWS_ACCESS_KEY")]
    pub aws_access_key: Option<NonEmptyString>,

    #[envconfig(from = "AWS_SECRET_KEY")]
    pub aws_secret_key: Option<NonEmptyString>,

    #[envconfig(from = "DATA_FOLDER", default = "data")]
    pub data_folder: String,

    #[envconfig(from = "KEY_PATTERN", default = r"lmnh_hist_data_\d+\.csv")]
    pub key_pattern: String,

    /// Stop after this many records were normalized successfully.
    #[envconfig(from = "MAX_ROWS")]
    pub max_rows: Option<usize>,

    #[envconfig(nested = true)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    S3,
    Folder,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseSourceKindError(String);

impl FromStr for SourceKind {
    type Err = ParseSourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(SourceKind::S3),
            "folder" => Ok(SourceKind::Folder),
            _ => Err(ParseSourceKindError(s.to_owned())),
        }
    }
}

impl std::fmt::Display for ParseSourceKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "unknown source kind '{}', expected s3 or folder", self.0)
    }
}
