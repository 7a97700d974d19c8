//! Static asset lookup.
//!
//! Assets are checked before any routing: a request path that names an
//! existing file under the static root is served from disk even when a route
//! with the identical path exists. Only regular files count; directories are
//! never listed and no `index.html` is implied.

use std::path::{Component, Path, PathBuf};

use http::header::CONTENT_LENGTH;
use http::HeaderValue;
use percent_encoding::percent_decode_str;

use crate::error::Result;
use crate::handler::BoxFuture;
use crate::response::Response;

/// A file found under the static root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Asset {
    pub path:         PathBuf,
    pub content_type: &'static str,
}

impl Asset {
    /// Opens the file and streams it as a `200 OK` response.
    pub async fn into_response(self) -> Result<Response> {
        let file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();

        let mut res = Response::builder().stream(self.content_type, file);
        res.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
        Ok(res)
    }
}

/// Resolves request paths to assets under a root folder.
pub trait AssetResolver: Send + Sync + 'static {
    fn resolve<'a>(&'a self, root: &'a Path, path: &'a str) -> BoxFuture<'a, Option<Asset>>;
}

/// The default resolver: plain files on disk, MIME type by extension.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticDir;

impl AssetResolver for StaticDir {
    fn resolve<'a>(&'a self, root: &'a Path, path: &'a str) -> BoxFuture<'a, Option<Asset>> {
        Box::pin(async move {
            let relative = sanitize(path)?;
            let full = root.join(relative);
            let meta = tokio::fs::metadata(&full).await.ok()?;
            if !meta.is_file() {
                return None;
            }
            let content_type = content_type(&full);
            Some(Asset { path: full, content_type })
        })
    }
}

/// Turns a request path into a relative path that cannot leave the root.
fn sanitize(path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));

    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css")          => "text/css; charset=utf-8",
        Some("js" | "mjs")   => "text/javascript; charset=utf-8",
        Some("json")         => "application/json",
        Some("map")          => "application/json",
        Some("png")          => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif")          => "image/gif",
        Some("svg")          => "image/svg+xml",
        Some("webp")         => "image/webp",
        Some("ico")          => "image/x-icon",
        Some("woff")         => "font/woff",
        Some("woff2")        => "font/woff2",
        Some("pdf")          => "application/pdf",
        Some("wasm")         => "application/wasm",
        Some("mp4")          => "video/mp4",
        Some("txt")          => "text/plain; charset=utf-8",
        Some("csv")          => "text/csv",
        Some("xml")          => "application/xml",
        _                    => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trailhead-static-{name}-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("css/site.css"), "body{}").unwrap();
        std::fs::write(dir.join("logo.svg"), "<svg/>").unwrap();
        dir
    }

    #[test]
    fn sanitize_rejects_traversal() {
        assert_eq!(sanitize("/css/site.css"), Some(PathBuf::from("css/site.css")));
        assert_eq!(sanitize("/./a"), Some(PathBuf::from("a")));
        assert_eq!(sanitize("/../etc/passwd"), None);
        assert_eq!(sanitize("/a/%2e%2e/%2e%2e/b"), None);
        assert_eq!(sanitize("/"), None);
    }

    #[tokio::test]
    async fn resolves_existing_files_only() {
        let root = scratch("resolve");

        let asset = StaticDir.resolve(&root, "/css/site.css").await.unwrap();
        assert_eq!(asset.content_type, "text/css; charset=utf-8");
        assert_eq!(asset.path, root.join("css/site.css"));

        assert!(StaticDir.resolve(&root, "/css").await.is_none());
        assert!(StaticDir.resolve(&root, "/missing.txt").await.is_none());
    }

    #[tokio::test]
    async fn asset_streams_with_length() {
        let root = scratch("stream");
        let asset = StaticDir.resolve(&root, "/logo.svg").await.unwrap();
        let res = asset.into_response().await.unwrap();

        assert_eq!(res.headers()[CONTENT_LENGTH], "6");
        assert_eq!(res.headers()[http::header::CONTENT_TYPE], "image/svg+xml");
    }
}
