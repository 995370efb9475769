use std::path::{Path, PathBuf};

use rocket::fs::NamedFile;
use rocket::State;

use crate::config::Config;

pub async fn app_index_file(c: &Config) -> Option<NamedFile> {
    let index = c.public_content.join("index.html");
    match NamedFile::open(&index).await {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!("'{}' can't be served: {}", index.display(), e);
            None
        }
    }
}

#[get("/")]
pub async fn app(c: &State<Config>) -> Option<NamedFile> {
    app_index_file(c).await
}

/// Static files and uploads; unknown paths fall back to the SPA entry point.
#[get("/<path..>", rank = 10)]
pub async fn app_path(path: PathBuf, c: &State<Config>) -> Option<NamedFile> {
    if path.starts_with("api") {
        return None;
    }

    if let Some(upload) = upload_path(c, &path) {
        return NamedFile::open(upload).await.ok();
    }

    match NamedFile::open(c.public_content.join(&path)).await {
        Ok(file) => Some(file),
        Err(_) => app_index_file(c).await,
    }
}

/// Maps `/uploads/<name>` onto the upload directory when it lives outside
/// the public content directory.
fn upload_path(c: &Config, path: &Path) -> Option<PathBuf> {
    let prefix = c.upload_url_prefix.trim_matches('/');
    let name = path.strip_prefix(prefix).ok()?;
    if name.as_os_str().is_empty() {
        return None;
    }
    Some(c.upload_dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    use crate::route::testing::client;

    #[test]
    fn uploads_resolve_into_the_upload_dir() {
        let mut c = Config::default();
        c.upload_dir = PathBuf::from("/srv/uploads");
        c.upload_url_prefix = "/uploads".to_string();

        assert_eq!(
            upload_path(&c, Path::new("uploads/a.pdf")),
            Some(PathBuf::from("/srv/uploads/a.pdf"))
        );
        assert_eq!(upload_path(&c, Path::new("uploads")), None);
        assert_eq!(upload_path(&c, Path::new("assets/app.js")), None);
    }

    #[rocket::async_test]
    async fn missing_upload_is_not_found() {
        let client = client().await;
        let response = client
            .get("/uploads/does-not-exist.pdf")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
