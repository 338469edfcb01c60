use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;

/// Most routes carry only a handful of path parameters; keep them inline.
const INLINE_PARAMS: usize = 4;

/// A single path parameter captured while matching a route.
///
/// The key is shared with the route tree, so capturing a parameter only
/// allocates for the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    /// Wildcard name from the route pattern, without the `:` / `*` sigil
    pub key: Arc<str>,
    /// Matched portion of the request path
    pub value: String,
}

impl Param {
    pub(crate) fn new(key: Arc<str>, value: String) -> Self {
        Self { key, value }
    }
}

/// Ordered list of captured path parameters.
///
/// Order follows the wildcards' positions in the pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params(SmallVec<[Param; INLINE_PARAMS]>);

impl Params {
    /// Empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the first parameter whose key equals `name`.
    pub fn by_name(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| &*p.key == name)
            .map(|p| p.value.as_str())
    }

    /// Parameter at position `index`.
    pub fn get(&self, index: usize) -> Option<&Param> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.0.iter()
    }

    pub(crate) fn push(&mut self, param: Param) {
        self.0.push(param);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Params(
            iter.into_iter()
                .map(|(k, v)| Param::new(Arc::from(k), v))
                .collect(),
        )
    }
}
