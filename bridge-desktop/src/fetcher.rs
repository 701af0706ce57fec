//! File download implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FetchFileRequest, FileFetcher, FileKind, ProgressCallback},
};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const PART_SUFFIX: &str = "part";

/// Reqwest-based file fetcher
///
/// Files are laid out as `<root>/<server>/<kind>/<id>.<ext>`, where the
/// extension comes from the response's MIME subtype. Downloads stream into a
/// `.part` file that is renamed once the body has been fully written, so a
/// crashed download never shows up in `fetch_existing_file`.
pub struct HttpFileFetcher {
    client: Client,
    root: PathBuf,
}

impl HttpFileFetcher {
    pub fn new(root: PathBuf) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("player-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client: {}", e)))?;

        Ok(Self { client, root })
    }

    fn kind_dir(&self, server_id: &str, kind: FileKind) -> PathBuf {
        self.root.join(sanitize(server_id)).join(kind.as_str())
    }

    fn source_url(request: &FetchFileRequest) -> String {
        if !request.use_cache_buster {
            return request.source_url.clone();
        }
        let sep = if request.source_url.contains('?') { '&' } else { '?' };
        let buster = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format!("{}{}_={}", request.source_url, sep, buster)
    }

    async fn find_existing(dir: &Path, id: &str) -> Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        let wanted = sanitize(id);
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(PART_SUFFIX) {
                continue;
            }
            if path.file_stem().and_then(|s| s.to_str()) == Some(wanted.as_str()) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl FileFetcher for HttpFileFetcher {
    async fn fetch_file(
        &self,
        server_id: &str,
        request: FetchFileRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PathBuf> {
        let url = Self::source_url(&request);
        debug!(kind = %request.kind, id = %request.id, "Fetching file");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with(&request.expected_content_type) {
            return Err(BridgeError::UnexpectedContentType {
                url: request.source_url.clone(),
                expected: request.expected_content_type.clone(),
                actual: content_type,
            });
        }

        let dir = self.kind_dir(server_id, request.kind);
        tokio::fs::create_dir_all(&dir).await?;

        let final_path = dir.join(format!(
            "{}.{}",
            sanitize(&request.id),
            extension_for(&content_type)
        ));
        let part_path = final_path.with_extension(PART_SUFFIX);

        let total = response.content_length();
        let received = store_body(
            response.bytes_stream(),
            &dir,
            &request.id,
            &part_path,
            &final_path,
            total,
            on_progress.as_ref(),
        )
        .await?;

        debug!(kind = %request.kind, id = %request.id, bytes = received, "File stored");
        Ok(final_path)
    }

    async fn fetch_existing_file(
        &self,
        server_id: &str,
        kind: FileKind,
        id: &str,
    ) -> Result<Option<PathBuf>> {
        Self::find_existing(&self.kind_dir(server_id, kind), id).await
    }
}

/// Stream `body` into `part_path` and move it to `final_path`.
///
/// The partial file is removed on every failure, whether the body, the disk
/// write or the final rename failed.
async fn store_body<S, B, E>(
    body: S,
    dir: &Path,
    id: &str,
    part_path: &Path,
    final_path: &Path,
    total: Option<u64>,
    on_progress: Option<&ProgressCallback>,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let outcome = write_and_commit(body, dir, id, part_path, final_path, total, on_progress).await;
    if outcome.is_err() {
        match tokio::fs::remove_file(part_path).await {
            Ok(()) => debug!(file = %part_path.display(), "Partial download removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "Failed to remove partial download"),
        }
    }
    outcome
}

async fn write_and_commit<S, B, E>(
    mut body: S,
    dir: &Path,
    id: &str,
    part_path: &Path,
    final_path: &Path,
    total: Option<u64>,
    on_progress: Option<&ProgressCallback>,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut file = tokio::fs::File::create(part_path).await?;
    let mut received: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        received += bytes.len() as u64;
        if let Some(cb) = on_progress {
            cb(received, total);
        }
    }
    file.flush().await?;
    drop(file);

    // Replace any earlier copy stored under a different extension
    if let Some(old) = HttpFileFetcher::find_existing(dir, id).await? {
        if old != final_path {
            tokio::fs::remove_file(&old).await?;
        }
    }
    tokio::fs::rename(part_path, final_path).await?;
    Ok(received)
}

/// Keep path components to a safe character set.
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn extension_for(content_type: &str) -> String {
    let subtype = content_type
        .split(';')
        .next()
        .and_then(|mime| mime.split('/').nth(1))
        .map(str::trim)
        .unwrap_or_default();

    match subtype {
        "mpeg" | "mp3" => "mp3".to_string(),
        "jpeg" => "jpg".to_string(),
        "" => "bin".to_string(),
        other => sanitize(other),
    }
}
