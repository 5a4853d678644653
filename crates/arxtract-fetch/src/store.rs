use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use arxtract_core::Paper;

use crate::error::Result;
use crate::http::RateLimitedClient;

/// Downloads document PDFs into a local folder. A failed download is logged
/// and skipped, never fatal for the batch.
pub struct DocumentStore {
    client: RateLimitedClient,
    folder: PathBuf,
}

impl DocumentStore {
    pub fn new(folder: &Path) -> Self {
        Self::with_client(
            folder,
            RateLimitedClient::new(Duration::from_secs(3), 3, "arxtract/0.1"),
        )
    }

    pub fn with_client(folder: &Path, client: RateLimitedClient) -> Self {
        Self {
            client,
            folder: folder.to_path_buf(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Stream one PDF to `<folder>/<id>.pdf`, overwriting any previous copy.
    /// Returns the local path, or `None` when the download failed.
    pub async fn download(&self, paper: &Paper) -> Option<PathBuf> {
        let target = self.folder.join(paper.pdf_file_name());
        match self.download_to(&paper.pdf_url, &target).await {
            Ok(()) => {
                info!(id = %paper.id, path = %target.display(), "pdf downloaded");
                Some(target)
            }
            Err(e) => {
                error!(id = %paper.id, error = %e, "failed to download pdf, skipping");
                None
            }
        }
    }

    async fn download_to(&self, url: &str, target: &Path) -> Result<()> {
        fs::create_dir_all(&self.folder).await?;
        let resp = self.client.get_response(url).await?;
        let mut file = fs::File::create(target).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Move a file into a named subfolder next to it, creating the subfolder if
/// needed. Returns the new path.
pub fn relocate(path: &Path, subdir: &str) -> std::io::Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let dest_dir = parent.join(subdir);
    std::fs::create_dir_all(&dest_dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"))?;
    let dest = dest_dir.join(file_name);
    std::fs::rename(path, &dest)?;
    Ok(dest)
}
