use std::path::PathBuf;

use anyhow::Error;
use async_trait::async_trait;

use super::DataSource;

/// Exports already downloaded to a local directory. Subdirectories are not searched.
pub struct FolderSource {
    pub path: PathBuf,
}

impl FolderSource {
    pub async fn new(path: &str) -> Result<Self, Error> {
        let path = tokio::fs::canonicalize(path).await?;
        Ok(Self { path })
    }
}

#[async_trait]
impl DataSource for FolderSource {
    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut keys = vec![];
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                keys.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        if !self.keys().await?.iter().any(|k| k == key) {
            return Err(Error::msg(format!("Key not found: {key}")));
        }
        Ok(tokio::fs::read(self.path.join(key)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    async fn setup_test_folder() -> (TempDir, FolderSource) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("lmnh_hist_data_0.csv"),
            b"at,site,val,type\n",
        )
        .unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"another file").unwrap();
        fs::create_dir(temp_dir.path().join("archive")).unwrap();

        let source = FolderSource::new(temp_dir.path().to_str().unwrap())
            .await
            .unwrap();

        (temp_dir, source)
    }

    #[tokio::test]
    async fn test_keys() {
        let (_temp_dir, source) = setup_test_folder().await;
        let mut keys = source.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["lmnh_hist_data_0.csv", "notes.txt"]);
    }

    #[tokio::test]
    async fn test_get() {
        let (_temp_dir, source) = setup_test_folder().await;
        let contents = source.get("lmnh_hist_data_0.csv").await.unwrap();
        assert_eq!(contents, b"at,site,val,type\n");
    }

    #[tokio::test]
    async fn test_get_unknown_key() {
        let (_temp_dir, source) = setup_test_folder().await;
        assert!(source.get("../etc/passwd").await.is_err());
        assert!(source.get("archive").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_folder() {
        assert!(FolderSource::new("/definitely/not/a/folder").await.is_err());
    }
}
