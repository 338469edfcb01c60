use http::header::HeaderValue;
use http::StatusCode;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::{write_header, Render, MIME_OCTET_STREAM};
use crate::context::ResponseWriter;
use crate::error::RenderError;

/// Join a URL path onto `base`, refusing anything that would step outside
/// it (`..`, absolute components, drive prefixes).
pub fn map_path(base: &Path, url_path: &str) -> Option<PathBuf> {
    let mut pb = base.to_path_buf();
    for comp in Path::new(url_path.trim_start_matches('/')).components() {
        match comp {
            Component::Normal(s) => pb.push(s),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(pb)
}

/// Content type derived from the file extension.
///
/// Returns `None` for unknown extensions so the caller can sniff the body.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|s| s.to_str())?.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" | "text" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "woff2" => "font/woff2",
        _ => return None,
    };
    Some(ct)
}

/// Guess a content type from the first bytes of an unknown file.
fn sniff(data: &[u8]) -> &'static str {
    let head = &data[..data.len().min(512)];
    let textual = !head.contains(&0)
        && match std::str::from_utf8(head) {
            Ok(_) => true,
            // a multi-byte character cut off at the sniff boundary
            Err(e) => e.error_len().is_none(),
        };
    if textual {
        "text/plain; charset=utf-8"
    } else {
        MIME_OCTET_STREAM
    }
}

/// Contents of a file on disk.
///
/// A directory is served through its `index.html`.
pub struct File<'a>(pub &'a Path);

impl File<'_> {
    fn resolve(&self) -> io::Result<PathBuf> {
        let meta = fs::metadata(self.0)?;
        if meta.is_dir() {
            let index = self.0.join("index.html");
            if index.is_file() {
                return Ok(index);
            }
            return Err(io::Error::new(io::ErrorKind::NotFound, "directory has no index.html"));
        }
        Ok(self.0.to_path_buf())
    }
}

impl Render for File<'_> {
    fn render(&self, w: &mut ResponseWriter, code: Option<StatusCode>) -> Result<(), RenderError> {
        let path = self.resolve()?;
        let data = fs::read(&path)?;
        let content_type = content_type_for(&path).unwrap_or_else(|| sniff(&data));
        write_header(w, code, HeaderValue::from_static(content_type));
        w.write_bytes(&data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_map_path_prevents_traversal() {
        let base = Path::new("public");
        assert!(map_path(base, "../Cargo.toml").is_none());
        assert!(map_path(base, "/css/../../secret").is_none());
        assert_eq!(map_path(base, "/css/./site.css"), Some(PathBuf::from("public/css/site.css")));
        assert_eq!(map_path(base, "/"), Some(PathBuf::from("public")));
    }

    #[test]
    fn test_content_type_for_known_extensions() {
        assert_eq!(content_type_for(Path::new("a.TXT")), Some("text/plain; charset=utf-8"));
        assert_eq!(content_type_for(Path::new("a/b.json")), Some("application/json"));
        assert_eq!(content_type_for(Path::new("a.rs")), None);
        assert_eq!(content_type_for(Path::new("Makefile")), None);
    }

    #[test]
    fn test_sniff_text_and_binary() {
        assert_eq!(sniff(b"package main\n"), "text/plain; charset=utf-8");
        assert_eq!(sniff(&[0x89, b'P', b'N', b'G', 0, 0]), MIME_OCTET_STREAM);
    }

    #[test]
    fn test_render_file_and_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("index.html")).unwrap();
        f.write_all(b"<h1>home</h1>").unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();

        let mut w = ResponseWriter::default();
        File(&dir.path().join("main.go")).render(&mut w, Some(StatusCode::OK)).unwrap();
        assert_eq!(w.headers()["content-type"], "text/plain; charset=utf-8");
        assert_eq!(w.body(), b"package main\n");

        let mut w = ResponseWriter::default();
        File(dir.path()).render(&mut w, Some(StatusCode::OK)).unwrap();
        assert_eq!(w.headers()["content-type"], "text/html; charset=utf-8");
        assert_eq!(w.body(), b"<h1>home</h1>");
    }

    #[test]
    fn test_render_missing_file_is_not_found() {
        let mut w = ResponseWriter::default();
        let err = File(Path::new("definitely/not/here.txt"))
            .render(&mut w, Some(StatusCode::OK))
            .unwrap_err();
        assert!(matches!(err, RenderError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
        assert!(!w.written());
    }
}
