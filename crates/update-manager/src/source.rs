use crate::error::{ManagerError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const COPY_CHUNK: usize = 64 * 1024;

/// Abstraction over fetching update artifacts from the update root.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetch a small text artifact (the manifest) by name.
    async fn fetch_string(&self, name: &str) -> Result<String>;

    /// Fetch an artifact by name into `dest`, reporting every received
    /// chunk's size through `progress`.
    async fn fetch_file(
        &self,
        name: &str,
        dest: &Path,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<()>;
}

/// HTTP(S) source serving artifacts from a static update root.
#[derive(Clone)]
pub struct HttpSource {
    base: Url,
    client: Client,
}

impl HttpSource {
    /// Create a source rooted at `base`. A missing trailing slash is added
    /// so that joining artifact names keeps the full root path.
    pub fn new(base: Url) -> Self {
        Self::with_client(base, Client::new())
    }

    /// Create a source with a custom reqwest client instance.
    pub fn with_client(mut base: Url, client: Client) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        HttpSource { base, client }
    }

    fn url_for(&self, name: &str) -> Result<Url> {
        self.base
            .join(name)
            .map_err(|err| ManagerError::InvalidUrl(format!("{}: {err}", self.base)))
    }
}

#[async_trait]
impl UpdateSource for HttpSource {
    async fn fetch_string(&self, name: &str) -> Result<String> {
        let url = self.url_for(name)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_file(
        &self,
        name: &str,
        dest: &Path,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<()> {
        let url = self.url_for(name)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        let mut stream = response.bytes_stream();
        let mut file = File::create(dest).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            progress(chunk.len() as u64);
        }
        file.flush().await?;
        Ok(())
    }
}

/// Source serving artifacts from a local or mounted directory, the moral
/// equivalent of a `file://` update root.
#[derive(Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirSource { root: root.into() }
    }
}

#[async_trait]
impl UpdateSource for DirSource {
    async fn fetch_string(&self, name: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(self.root.join(name)).await?)
    }

    async fn fetch_file(
        &self,
        name: &str,
        dest: &Path,
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<()> {
        let mut src = File::open(self.root.join(name)).await?;
        let mut file = File::create(dest).await?;
        let mut buf = vec![0u8; COPY_CHUNK];
        loop {
            let n = src.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            progress(n as u64);
        }
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn dir_source_serves_strings_and_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("update.json"), "{}").unwrap();
        std::fs::write(dir.path().join("blob.bin"), vec![7u8; 200_000]).unwrap();

        let source = DirSource::new(dir.path());
        assert_eq!(source.fetch_string("update.json").await.unwrap(), "{}");

        let dest = dir.path().join("copy.bin");
        let mut received = 0u64;
        source
            .fetch_file("blob.bin", &dest, &mut |n| received += n)
            .await
            .unwrap();
        assert_eq!(received, 200_000);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 200_000]);
    }

    #[tokio::test]
    async fn dir_source_missing_artifact_is_an_error() {
        let dir = tempdir().unwrap();
        let source = DirSource::new(dir.path());
        assert!(source.fetch_string("absent.json").await.is_err());
    }

    #[test]
    fn http_source_joins_names_under_the_root_path() {
        let source = HttpSource::new(Url::parse("https://host/updates/stable").unwrap());
        assert_eq!(
            source.url_for("update.json").unwrap().as_str(),
            "https://host/updates/stable/update.json"
        );
    }
}
