use anyhow::{Context, Error};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, info};

use super::DataSource;
use crate::config::Config;

pub struct S3Source {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3Source {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    /// Build a source from the batch config. Explicit keys take precedence over the default
    /// AWS credentials chain.
    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let bucket = config
            .s3_bucket
            .as_ref()
            .context("S3_BUCKET must be set to read exports from S3")?;

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.s3_region.clone()))
            .load()
            .await;
        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let (Some(access_key), Some(secret_key)) =
            (&config.aws_access_key, &config.aws_secret_key)
        {
            info!("Using explicit S3 credentials from config");
            builder = builder.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key.as_str(),
                secret_key.as_str(),
                None,
                None,
                "environment",
            ));
        }

        if let Some(endpoint) = &config.s3_endpoint {
            builder = builder.endpoint_url(endpoint.as_str()).force_path_style(true);
        }

        Ok(Self::new(
            S3Client::from_conf(builder.build()),
            bucket.as_str().to_owned(),
            config.s3_prefix.clone(),
        ))
    }
}

#[async_trait]
impl DataSource for S3Source {
    async fn keys(&self) -> Result<Vec<String>, Error> {
        debug!(
            "Listing keys in bucket {} with prefix {}",
            self.bucket, self.prefix
        );
        let mut keys = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut cmd = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(self.prefix.clone());
            if let Some(token) = continuation_token {
                cmd = cmd.continuation_token(token);
            }
            let output = cmd
                .send()
                .await
                .with_context(|| format!("Failed to list objects in bucket {}", self.bucket))?;

            if let Some(contents) = output.contents {
                keys.extend(contents.iter().filter_map(|o| o.key.clone()));
            }
            match output.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        let get = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to get S3 object s3://{0}/{key}", self.bucket))?;

        let data = get.body.collect().await.with_context(|| {
            format!(
                "Failed to read body data from S3 object s3://{0}/{key}",
                self.bucket,
            )
        })?;

        Ok(data.to_vec())
    }
}
