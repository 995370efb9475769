use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};

use rocket::fs::TempFile;

use crate::config::Config;
use crate::data::Id;
use crate::error::{BackendError, StorageError};

/// Destination for uploaded attachments.
pub trait BlobStore {
    /// Stores the file at `local` as `name`, returning the URL it is served from.
    async fn upload(&self, local: &Path, name: &str) -> Result<String, BackendError>;

    /// Removes a blob previously returned by [BlobStore::upload].
    async fn remove(&self, url: &str) -> Result<(), BackendError>;
}

/// Keeps uploads in a directory served under a URL prefix.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl ToString) -> LocalBlobStore {
        LocalBlobStore {
            root: root.into(),
            url_prefix: url_prefix.to_string().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(c: &Config) -> LocalBlobStore {
        LocalBlobStore::new(&c.upload_dir, &c.upload_url_prefix)
    }

    fn name_of<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.url_prefix)
            .map(|it| it.trim_start_matches('/'))
            .filter(|it| !it.is_empty() && !it.contains('/') && !it.contains(".."))
    }
}

impl BlobStore for LocalBlobStore {
    async fn upload(&self, local: &Path, name: &str) -> Result<String, BackendError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::copy(local, self.root.join(name))
            .await
            .map_err(|source| StorageError::Write {
                name: name.to_string(),
                source,
            })?;

        tracing::debug!("Stored upload '{}' in '{}'.", name, self.root.display());
        Ok(format!("{}/{}", self.url_prefix, name))
    }

    async fn remove(&self, url: &str) -> Result<(), BackendError> {
        match self.name_of(url) {
            Some(name) => Ok(tokio::fs::remove_file(self.root.join(name)).await?),
            None => {
                tracing::warn!("Not removing '{}', it isn't a local upload.", url);
                Ok(())
            }
        }
    }
}

/// Blob name for an upload: a fresh id keeping the original extension.
pub fn blob_name(file: &TempFile<'_>) -> Result<String, StorageError> {
    let extension = file
        .content_type()
        .and_then(|it| it.extension())
        .map(|it| it.to_string())
        .or_else(|| {
            file.raw_name()
                .map(|it| it.dangerous_unsafe_unsanitized_raw().as_str())
                .and_then(|it| Path::new(it).extension())
                .and_then(|it| it.to_str())
                .map(str::to_string)
        });

    if file.len() == 0 {
        return Err(StorageError::Empty);
    }

    Ok(match extension {
        Some(extension) if !extension.is_empty() => format!("{}.{}", Id::new(), extension),
        _ => Id::new().to_string(),
    })
}

/// Moves a multipart upload through the temp directory into `store`.
///
/// The temporary copy is removed whether or not the upload succeeds.
pub async fn store_upload<S: BlobStore>(
    store: &S,
    temp_dir: &Path,
    file: &mut TempFile<'_>,
) -> Result<String, BackendError> {
    let name = blob_name(file)?;

    tokio::fs::create_dir_all(temp_dir).await?;
    let temp_path = temp_dir.join(&name);
    file.persist_to(&temp_path).await?;

    let result = store.upload(&temp_path, &name).await;

    if let Err(e) = tokio::fs::remove_file(&temp_path).await {
        tracing::warn!("Unable to remove temporary upload '{}': {}", temp_path.display(), e);
    }

    result
}

/// Awaits `record`, the write that references the blob at `url`. When it
/// fails the blob is removed again so nothing is left unreferenced.
pub async fn commit_upload<S, T, E>(
    store: &S,
    url: Option<&str>,
    record: impl Future<Output = Result<T, E>>,
) -> Result<T, E>
where
    S: BlobStore,
    E: Display,
{
    let result = record.await;
    if let (Err(e), Some(url)) = (&result, url) {
        tracing::warn!("Discarding upload '{}' after a failed write: {}", url, e);
        if let Err(e) = store.remove(url).await {
            tracing::warn!("Unable to remove upload '{}': {}", url, e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tuition-storage-{}-{}", name, Id::new()))
    }

    #[rocket::async_test]
    async fn local_store_copies_and_removes() {
        let root = scratch("root");
        let source = scratch("source");
        tokio::fs::write(&source, b"worksheet").await.unwrap();

        let store = LocalBlobStore::new(&root, "/uploads/");
        let url = store.upload(&source, "sheet.pdf").await.unwrap();

        assert_eq!(url, "/uploads/sheet.pdf");
        assert_eq!(tokio::fs::read(root.join("sheet.pdf")).await.unwrap(), b"worksheet");

        store.remove(&url).await.unwrap();
        assert!(!root.join("sheet.pdf").exists());

        let _ = tokio::fs::remove_file(&source).await;
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[rocket::async_test]
    async fn failed_writes_discard_their_upload() {
        let root = scratch("root");
        let source = scratch("source");
        tokio::fs::write(&source, b"notes").await.unwrap();
        let store = LocalBlobStore::new(&root, "/uploads");

        let kept = store.upload(&source, "kept.pdf").await.unwrap();
        let stored = commit_upload(&store, Some(kept.as_str()), async { Ok::<_, String>(1) }).await;
        assert_eq!(stored, Ok(1));
        assert!(root.join("kept.pdf").exists());

        let lost = store.upload(&source, "lost.pdf").await.unwrap();
        let failed = commit_upload(&store, Some(lost.as_str()), async {
            Err::<(), _>("duplicate key".to_string())
        })
        .await;
        assert!(failed.is_err());
        assert!(!root.join("lost.pdf").exists());

        let _ = tokio::fs::remove_file(&source).await;
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[test]
    fn foreign_urls_are_not_local_blobs() {
        let store = LocalBlobStore::new("/srv/uploads", "/uploads");
        assert_eq!(store.name_of("/uploads/a.pdf"), Some("a.pdf"));
        assert_eq!(store.name_of("/uploads/../settings.yml"), None);
        assert_eq!(store.name_of("https://cdn.example.com/a.pdf"), None);
        assert_eq!(store.name_of("/uploads/"), None);
    }
}
