//! URL path canonicalization.

/// Returns the canonical form of `p`.
///
/// Lexical processing only, the filesystem is never consulted:
///
/// 1. Runs of slashes collapse into one.
/// 2. `.` elements are dropped.
/// 3. A `..` element removes itself and the element before it.
/// 4. `..` elements at the root are dropped.
///
/// The result is always rooted. A trailing slash survives when the input's
/// last element was empty or `.`. The empty string becomes `/`.
///
/// ```
/// use whisk::router::clean_path;
///
/// assert_eq!(clean_path("//a/./b/../c/"), "/a/c/");
/// assert_eq!(clean_path(""), "/");
/// ```
pub fn clean_path(p: &str) -> String {
    if p.is_empty() {
        return "/".to_owned();
    }

    let trailing = matches!(p.rsplit('/').next(), Some("" | "."));

    let mut parts: Vec<&str> = Vec::with_capacity(p.len() / 2);
    for segment in p.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let mut out = String::with_capacity(p.len() + 1);
    for part in &parts {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() || trailing {
        out.push('/');
    }
    out
}
