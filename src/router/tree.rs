//! Compressed prefix tree for one HTTP method.
//!
//! Static text is stored byte-wise on edges that are split whenever two
//! patterns diverge, so shared prefixes such as `/api/v1/` exist only once.
//! Every node may additionally carry a single wildcard child:
//!
//! - a **parameter** (`:name`) matching one non-empty path segment, or
//! - a **catch-all** (`*name`) matching the rest of the path.
//!
//! Lookups try the static child first and fall back to the wildcard child
//! when the static descent does not end in a handler, so `/users/new` and
//! `/users/:id` can coexist and the literal always wins.
//!
//! A catch-all value includes the slash in front of it: `/files/*path`
//! matched against `/files/a/b` captures `path = "/a/b"`, and `/files/`
//! captures `"/"`.

use std::fmt;
use std::mem;
use std::sync::Arc;

use super::params::{Param, Params};
use crate::error::RouteError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Static,
    Param(Arc<str>),
    CatchAll(Arc<str>),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Static => f.write_str("<static>"),
            NodeKind::Param(name) => write!(f, ":{name}"),
            NodeKind::CatchAll(name) => write!(f, "*{name}"),
        }
    }
}

/// One piece of a parsed route pattern.
#[derive(Debug, PartialEq, Eq)]
enum Piece<'p> {
    Static(&'p [u8]),
    Param(&'p str),
    CatchAll(&'p str),
}

/// Split `pattern` into static runs and wildcards, rejecting malformed input.
fn parse_pattern(pattern: &str) -> Result<Vec<Piece<'_>>, RouteError> {
    if !pattern.starts_with('/') {
        return Err(RouteError::MissingLeadingSlash {
            pattern: pattern.to_owned(),
        });
    }

    let bytes = pattern.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let sigil = bytes[i];
        if sigil != b':' && sigil != b'*' {
            i += 1;
            continue;
        }
        if i > start {
            pieces.push(Piece::Static(&bytes[start..i]));
        }

        let end = bytes[i + 1..]
            .iter()
            .position(|&b| b == b'/')
            .map_or(bytes.len(), |p| i + 1 + p);
        let name = &pattern[i + 1..end];
        if name.is_empty() {
            return Err(RouteError::EmptyWildcardName {
                pattern: pattern.to_owned(),
            });
        }
        if name.contains([':', '*']) {
            return Err(RouteError::MultipleWildcardsInSegment {
                pattern: pattern.to_owned(),
            });
        }

        if sigil == b':' {
            pieces.push(Piece::Param(name));
        } else {
            if end != bytes.len() {
                return Err(RouteError::CatchAllNotAtEnd {
                    pattern: pattern.to_owned(),
                });
            }
            // i >= 1: the pattern starts with '/'
            if bytes[i - 1] != b'/' {
                return Err(RouteError::CatchAllWithoutSlash {
                    pattern: pattern.to_owned(),
                });
            }
            pieces.push(Piece::CatchAll(name));
        }

        i = end;
        start = end;
    }

    if start < bytes.len() {
        pieces.push(Piece::Static(&bytes[start..]));
    }
    Ok(pieces)
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn segment_end(path: &[u8]) -> usize {
    path.iter().position(|&b| b == b'/').unwrap_or(path.len())
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug)]
struct Node<T> {
    /// Static text consumed by this node; empty for wildcard nodes and the root
    prefix: Vec<u8>,
    kind: NodeKind,
    /// First byte of each static child, same order as `children`
    indices: Vec<u8>,
    children: Vec<Node<T>>,
    wildcard: Option<Box<Node<T>>>,
    value: Option<T>,
}

impl<T> Node<T> {
    fn new(prefix: Vec<u8>, kind: NodeKind) -> Self {
        Self {
            prefix,
            kind,
            indices: Vec::new(),
            children: Vec::new(),
            wildcard: None,
            value: None,
        }
    }

    fn insert(&mut self, pieces: &[Piece<'_>], pattern: &str, value: T) -> Result<(), RouteError> {
        let Some((first, rest)) = pieces.split_first() else {
            if self.value.is_some() {
                return Err(RouteError::DuplicateRoute {
                    pattern: pattern.to_owned(),
                });
            }
            self.value = Some(value);
            return Ok(());
        };

        match first {
            Piece::Static(text) => self.static_descendant(text).insert(rest, pattern, value),
            Piece::Param(name) => self
                .wildcard_child(NodeKind::Param(Arc::from(*name)), pattern)?
                .insert(rest, pattern, value),
            Piece::CatchAll(name) => self
                .wildcard_child(NodeKind::CatchAll(Arc::from(*name)), pattern)?
                .insert(rest, pattern, value),
        }
    }

    /// Walk static children along `text`, creating and splitting edges as
    /// needed. Returns the node whose path ends exactly where `text` does.
    fn static_descendant(&mut self, text: &[u8]) -> &mut Node<T> {
        if text.is_empty() {
            return self;
        }

        let Some(i) = self.indices.iter().position(|&b| b == text[0]) else {
            self.indices.push(text[0]);
            self.children.push(Node::new(text.to_vec(), NodeKind::Static));
            let last = self.children.len() - 1;
            return &mut self.children[last];
        };

        let child = &mut self.children[i];
        let common = common_prefix(&child.prefix, text);
        if common < child.prefix.len() {
            child.split(common);
        }
        child.static_descendant(&text[common..])
    }

    /// Split this node's edge at `at`, moving everything below into a new
    /// static child.
    fn split(&mut self, at: usize) {
        let tail = Node {
            prefix: self.prefix.split_off(at),
            kind: NodeKind::Static,
            indices: mem::take(&mut self.indices),
            children: mem::take(&mut self.children),
            wildcard: self.wildcard.take(),
            value: self.value.take(),
        };
        self.indices = vec![tail.prefix[0]];
        self.children = vec![tail];
    }

    fn wildcard_child(&mut self, kind: NodeKind, pattern: &str) -> Result<&mut Node<T>, RouteError> {
        if let Some(existing) = &self.wildcard {
            if existing.kind != kind {
                return Err(RouteError::WildcardConflict {
                    pattern: pattern.to_owned(),
                    segment: kind.to_string(),
                    existing: existing.kind.to_string(),
                });
            }
        }
        let child = self
            .wildcard
            .get_or_insert_with(|| Box::new(Node::new(Vec::new(), kind)));
        Ok(&mut **child)
    }

    fn static_child(&self, first: u8) -> Option<&Node<T>> {
        self.indices
            .iter()
            .position(|&b| b == first)
            .map(|i| &self.children[i])
    }

    /// Catch-all child with a handler, if any.
    fn catch_all(&self) -> Option<&Node<T>> {
        self.wildcard
            .as_deref()
            .filter(|w| matches!(w.kind, NodeKind::CatchAll(_)) && w.value.is_some())
    }

    /// Whether a request ending right after this node's prefix is served.
    fn serves_end(&self) -> bool {
        self.value.is_some() || self.catch_all().is_some()
    }

    /// `self` is a static child and `path` equals its prefix minus the
    /// trailing slash.
    fn missing_trailing_slash(&self, path: &[u8], eq: fn(&[u8], &[u8]) -> bool) -> bool {
        self.prefix.len() == path.len() + 1
            && self.prefix.last() == Some(&b'/')
            && eq(&self.prefix[..path.len()], path)
            && self.serves_end()
    }

    /// `path` is what remains after this node's prefix has been consumed.
    fn lookup<'t>(&'t self, path: &[u8], params: &mut Params, tsr: &mut bool) -> Option<&'t T> {
        if path.is_empty() {
            if let Some(value) = &self.value {
                return Some(value);
            }
            if let Some(catch_all) = self.catch_all() {
                if let NodeKind::CatchAll(name) = &catch_all.kind {
                    params.push(Param::new(Arc::clone(name), "/".to_owned()));
                }
                return catch_all.value.as_ref();
            }
            if let Some(child) = self.static_child(b'/') {
                if child.prefix == b"/" && child.serves_end() {
                    *tsr = true;
                }
            }
            return None;
        }

        if let Some(child) = self.static_child(path[0]) {
            if path.starts_with(&child.prefix) {
                let mark = params.len();
                if let Some(value) = child.lookup(&path[child.prefix.len()..], params, tsr) {
                    return Some(value);
                }
                params.truncate(mark);
            } else if child.missing_trailing_slash(path, |a, b| a == b) {
                *tsr = true;
            }
        }

        if let Some(wild) = self.wildcard.as_deref() {
            match &wild.kind {
                NodeKind::Param(name) => {
                    let end = segment_end(path);
                    if end > 0 {
                        let mark = params.len();
                        params.push(Param::new(Arc::clone(name), lossy(&path[..end])));
                        if let Some(value) = wild.lookup(&path[end..], params, tsr) {
                            return Some(value);
                        }
                        params.truncate(mark);
                    }
                }
                NodeKind::CatchAll(name) => {
                    if let Some(value) = &wild.value {
                        let mut captured = String::with_capacity(path.len() + 1);
                        captured.push('/');
                        captured.push_str(&String::from_utf8_lossy(path));
                        params.push(Param::new(Arc::clone(name), captured));
                        return Some(value);
                    }
                }
                NodeKind::Static => {}
            }
        }

        if path == b"/" && self.value.is_some() {
            *tsr = true;
        }
        None
    }

    /// Case-insensitive variant of [`Node::lookup`] that rebuilds the
    /// canonical path into `out` instead of capturing parameters.
    fn find_case_insensitive(&self, path: &[u8], fix_trailing_slash: bool, out: &mut Vec<u8>) -> bool {
        if path.is_empty() {
            if self.serves_end() {
                return true;
            }
            if fix_trailing_slash {
                if let Some(child) = self.static_child(b'/') {
                    if child.prefix == b"/" && child.serves_end() {
                        out.push(b'/');
                        return true;
                    }
                }
            }
            return false;
        }

        // Both the upper and lower case spelling of a byte may be indexed.
        for (i, index) in self.indices.iter().enumerate() {
            if !index.eq_ignore_ascii_case(&path[0]) {
                continue;
            }
            let child = &self.children[i];
            let n = child.prefix.len();
            if path.len() >= n && path[..n].eq_ignore_ascii_case(&child.prefix) {
                let mark = out.len();
                out.extend_from_slice(&child.prefix);
                if child.find_case_insensitive(&path[n..], fix_trailing_slash, out) {
                    return true;
                }
                out.truncate(mark);
            } else if fix_trailing_slash
                && child.missing_trailing_slash(path, |a, b| a.eq_ignore_ascii_case(b))
            {
                out.extend_from_slice(&child.prefix);
                return true;
            }
        }

        if let Some(wild) = self.wildcard.as_deref() {
            match &wild.kind {
                NodeKind::Param(_) => {
                    let end = segment_end(path);
                    if end > 0 {
                        let mark = out.len();
                        out.extend_from_slice(&path[..end]);
                        if wild.find_case_insensitive(&path[end..], fix_trailing_slash, out) {
                            return true;
                        }
                        out.truncate(mark);
                    }
                }
                NodeKind::CatchAll(_) => {
                    if wild.value.is_some() {
                        out.extend_from_slice(path);
                        return true;
                    }
                }
                NodeKind::Static => {}
            }
        }

        // Drop a superfluous trailing slash.
        fix_trailing_slash && path == b"/" && self.value.is_some()
    }
}

/// Outcome of [`Tree::get_value`].
#[derive(Debug)]
pub struct Lookup<'t, T> {
    /// Value registered for the matched pattern
    pub value: Option<&'t T>,
    /// Captured parameters; empty unless `value` is set
    pub params: Params,
    /// No match, but the path with its trailing slash added or removed
    /// would match
    pub tsr: bool,
}

/// Route tree for a single HTTP method.
///
/// Generic over the stored value so the engine can keep handler chains in
/// it while tests and benches store plain markers.
#[derive(Debug)]
pub struct Tree<T> {
    root: Node<T>,
    len: usize,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self {
            root: Node::new(Vec::new(), NodeKind::Static),
            len: 0,
        }
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `value` under `pattern`.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] when the pattern is malformed, when its
    /// wildcard conflicts with a different wildcard at the same position, or
    /// when the exact pattern is already registered. A failed insertion may
    /// leave split edges behind, which never changes what the tree matches.
    pub fn add_route(&mut self, pattern: &str, value: T) -> Result<(), RouteError> {
        let pieces = parse_pattern(pattern)?;
        self.root.insert(&pieces, pattern, value)?;
        self.len += 1;
        Ok(())
    }

    /// Match `path` against the registered patterns.
    pub fn get_value(&self, path: &str) -> Lookup<'_, T> {
        let mut params = Params::new();
        let mut tsr = false;
        let value = self.root.lookup(path.as_bytes(), &mut params, &mut tsr);
        if value.is_none() {
            params.clear();
        }
        Lookup {
            value,
            params,
            tsr: value.is_none() && tsr,
        }
    }

    /// Find a registered path matching `path` with ASCII letters compared
    /// case-insensitively, optionally adding or removing a trailing slash.
    ///
    /// The returned path uses the registered spelling for static text and the
    /// request's spelling for wildcard values.
    pub fn find_case_insensitive_path(&self, path: &str, fix_trailing_slash: bool) -> Option<String> {
        let mut out = Vec::with_capacity(path.len() + 1);
        if self
            .root
            .find_case_insensitive(path.as_bytes(), fix_trailing_slash, &mut out)
        {
            String::from_utf8(out).ok()
        } else {
            None
        }
    }
}
