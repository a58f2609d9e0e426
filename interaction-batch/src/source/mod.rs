use anyhow::Error;
use async_trait::async_trait;
use regex::Regex;

use crate::error::SourceError;

pub mod folder;
pub mod s3;

/// A place archived interaction exports can be listed and fetched from.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn keys(&self) -> Result<Vec<String>, Error>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, Error>;
}

/// Compile a key pattern so it only matches whole keys.
pub fn key_pattern(pattern: &str) -> Result<Regex, SourceError> {
    Ok(Regex::new(&format!("^(?:{pattern})$"))?)
}

/// Keep the keys matching `pattern`, sorted so exports are always merged in the same order.
pub fn filter_keys(keys: Vec<String>, pattern: &Regex) -> Vec<String> {
    let mut keys: Vec<String> = keys.into_iter().filter(|k| pattern.is_match(k)).collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keys() {
        let pattern = key_pattern(r"lmnh_hist_data_\d+\.csv").unwrap();
        let keys = vec![
            "lmnh_hist_data_2.csv".to_owned(),
            "lmnh_exhibition_info.json".to_owned(),
            "lmnh_hist_data_0.csv".to_owned(),
            "old/lmnh_hist_data_1.csv".to_owned(),
            "lmnh_hist_data_1.csv.bak".to_owned(),
            "lmnh_hist_data_.csv".to_owned(),
            "lmnh_hist_data_10.csv".to_owned(),
        ];

        assert_eq!(
            filter_keys(keys, &pattern),
            vec![
                "lmnh_hist_data_0.csv",
                "lmnh_hist_data_10.csv",
                "lmnh_hist_data_2.csv",
            ]
        );
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            key_pattern("lmnh_(unclosed"),
            Err(SourceError::InvalidPattern(_))
        ));
    }
}
