//! HTML templates backed by `minijinja`.
//!
//! Templates are registered under their file name (`index.tmpl`,
//! `users/list.tmpl` becomes `list.tmpl`). With reload enabled every render
//! re-reads the sources from disk, which is what debug mode uses.

use http::header::HeaderValue;
use http::StatusCode;
use minijinja::Environment;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::{write_header, Render};
use crate::context::ResponseWriter;
use crate::error::RenderError;

#[derive(Debug, Clone)]
enum Source {
    Glob(String),
    Files(Vec<PathBuf>),
}

/// A named set of HTML templates.
pub struct HtmlTemplates {
    env: Environment<'static>,
    sources: Vec<Source>,
    inline: Vec<(String, String)>,
    names: Vec<String>,
    reload: bool,
}

impl fmt::Debug for HtmlTemplates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlTemplates")
            .field("names", &self.names)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

/// Translate a shell-style glob into an anchored regex over `/`-separated
/// paths. `**` crosses directories, `*` and `?` do not.
fn glob_to_regex(pattern: &str) -> Result<Regex, RenderError> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // `**/` also matches zero directories
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| RenderError::Template(format!("invalid glob '{pattern}': {e}")))
}

/// Longest leading directory of `pattern` without glob characters.
fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let mut parts = pattern.split('/').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() || part.contains(['*', '?']) {
            break;
        }
        if part.is_empty() {
            base.push("/");
        } else {
            base.push(part);
        }
    }
    if base.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        base
    }
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, RenderError> {
    let re = glob_to_regex(pattern.trim_start_matches("./"))?;
    let base = glob_base(pattern);
    let mut files: Vec<PathBuf> = WalkDir::new(&base)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let normalized = path.to_string_lossy().replace('\\', "/");
            re.is_match(normalized.trim_start_matches("./"))
        })
        .collect();
    if files.is_empty() {
        return Err(RenderError::Template(format!("pattern matches no files: '{pattern}'")));
    }
    files.sort();
    Ok(files)
}

fn template_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

impl HtmlTemplates {
    /// A set with no templates; every render reports a missing template.
    pub fn empty() -> Self {
        Self {
            env: Environment::new(),
            sources: Vec::new(),
            inline: Vec::new(),
            names: Vec::new(),
            reload: false,
        }
    }

    /// Load every file matching `pattern`.
    ///
    /// # Errors
    ///
    /// [`RenderError::Template`] if the pattern matches nothing or a template
    /// does not parse, [`RenderError::Io`] if a file cannot be read.
    pub fn from_glob(pattern: &str) -> Result<Self, RenderError> {
        let mut templates = Self::empty();
        templates.sources.push(Source::Glob(pattern.to_owned()));
        templates.rebuild()?;
        Ok(templates)
    }

    /// Load the given files.
    ///
    /// # Errors
    ///
    /// As [`HtmlTemplates::from_glob`].
    pub fn from_files<P: AsRef<Path>>(files: &[P]) -> Result<Self, RenderError> {
        let mut templates = Self::empty();
        let files = files.iter().map(|p| p.as_ref().to_path_buf()).collect();
        templates.sources.push(Source::Files(files));
        templates.rebuild()?;
        Ok(templates)
    }

    /// Register a template from a string.
    ///
    /// # Errors
    ///
    /// [`RenderError::Template`] if `source` does not parse.
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<(), RenderError> {
        let (name, source) = (name.into(), source.into());
        self.env.add_template_owned(name.clone(), source.clone())?;
        if !self.names.contains(&name) {
            self.names.push(name.clone());
        }
        self.inline.retain(|(n, _)| *n != name);
        self.inline.push((name, source));
        Ok(())
    }

    /// Re-read the sources from disk before every render.
    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }

    pub fn is_reloading(&self) -> bool {
        self.reload
    }

    /// Names of the registered templates.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn load(&self) -> Result<(Environment<'static>, Vec<String>), RenderError> {
        let mut env = Environment::new();
        let mut names = Vec::new();
        for source in &self.sources {
            let files = match source {
                Source::Glob(pattern) => expand_glob(pattern)?,
                Source::Files(files) => files.clone(),
            };
            for path in files {
                let name = template_name(&path);
                let text = fs::read_to_string(&path)?;
                env.add_template_owned(name.clone(), text)?;
                names.push(name);
            }
        }
        for (name, text) in &self.inline {
            env.add_template_owned(name.clone(), text.clone())?;
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Ok((env, names))
    }

    fn rebuild(&mut self) -> Result<(), RenderError> {
        let (env, names) = self.load()?;
        debug!(templates = ?names, "Loaded HTML templates");
        self.env = env;
        self.names = names;
        Ok(())
    }

    /// Render template `name` with `data`.
    ///
    /// # Errors
    ///
    /// [`RenderError::Template`] if the template is unknown or fails, and
    /// any loading error when reloading.
    pub fn render<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<String, RenderError> {
        if self.reload && !self.sources.is_empty() {
            let (env, _) = self.load()?;
            return Ok(env.get_template(name)?.render(data)?);
        }
        Ok(self.env.get_template(name)?.render(data)?)
    }
}

/// A named template rendered as `text/html`.
pub struct Html<'a, T: ?Sized> {
    pub templates: &'a HtmlTemplates,
    pub name: &'a str,
    pub data: &'a T,
}

impl<T: Serialize + ?Sized> Render for Html<'_, T> {
    fn render(&self, w: &mut ResponseWriter, code: Option<StatusCode>) -> Result<(), RenderError> {
        let body = self.templates.render(self.name, self.data)?;
        write_header(w, code, HeaderValue::from_static("text/html; charset=utf-8"));
        w.write_bytes(body.as_bytes());
        Ok(())
    }
}
