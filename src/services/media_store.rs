use std::path::{Component, Path, PathBuf};

use axum::http::{header, HeaderMap};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Public path prefix the upload directory is served under.
pub const MEDIA_ROUTE: &str = "/uploads";

/// Flat directory holding every uploaded and converted media file.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub async fn new(root: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&root).await?;
        info!(path = %root.display(), "Media store initialized");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored file name inside the media directory. Anything that
    /// is not a single plain path component is refused.
    pub fn path_for(&self, file_name: &str) -> std::io::Result<PathBuf> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.root.join(name)),
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid media file name: {file_name}"),
            )),
        }
    }

    /// Removes a stored file, tolerating files that are already gone.
    /// Failures are logged and never surfaced.
    pub async fn remove(&self, file_name: &str) {
        let path = match self.path_for(file_name) {
            Ok(path) => path,
            Err(e) => {
                warn!(file = file_name, error = %e, "Refusing to remove media file");
                return;
            }
        };
        match fs::remove_file(&path).await {
            Ok(()) => debug!(file = file_name, "Removed media file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = file_name, "Media file already absent")
            }
            Err(e) => warn!(file = file_name, error = %e, "Failed to remove media file"),
        }
    }

    /// Removes the file a public media URL points at, if it is one of ours.
    pub async fn remove_url(&self, url: &str) {
        match file_name_from_url(url) {
            Some(name) => self.remove(&name).await,
            None => debug!(url, "URL does not reference a stored media file"),
        }
    }
}

/// `<millis>-<8 hex>-<sanitized original>`, keeping the original name readable at the end.
pub fn upload_file_name(original: &str) -> String {
    format!(
        "{}-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        short_id(),
        sanitize_file_name(original)
    )
}

/// `<stem>-<millis>-<8 hex>.jpg` for files produced by conversion.
pub fn converted_file_name(original: &str) -> String {
    let sanitized = sanitize_file_name(original);
    let stem = Path::new(&sanitized)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!(
        "{}-{}-{}.jpg",
        stem,
        chrono::Utc::now().timestamp_millis(),
        short_id()
    )
}

/// Keeps the final path component and replaces anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Origin used to build media links: the configured public base URL, or
/// the scheme and host the request came in on.
pub fn public_base(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = configured {
        return base.trim_end_matches('/').to_string();
    }
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|h| h.to_str().ok());
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    match host {
        Some(host) => format!("{scheme}://{host}"),
        // relative links still resolve against whatever host served the page
        None => String::new(),
    }
}

pub fn media_url(base: &str, file_name: &str) -> String {
    format!("{}{}/{}", base, MEDIA_ROUTE, file_name)
}

/// Extracts the stored file name from a media URL (absolute or path-only).
pub fn file_name_from_url(raw: &str) -> Option<String> {
    let path = match url::Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let (_, name) = path.rsplit_once(&format!("{MEDIA_ROUTE}/"))?;
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(name.to_string())
}
