//! Template sources: where template bodies are read from.
//!
//! The engine never touches the filesystem directly. It asks a
//! [`TemplateSource`] for the bytes behind a path, which lets the same
//! resolution rules apply to a directory on disk ([`DirSource`]) and to an
//! in-memory virtual filesystem ([`EmbeddedSource`]).
//!
//! # Path Resolution
//!
//! A template name is turned into a path by joining it onto the source root
//! and appending the engine's extension:
//!
//! | Source | Name | Extension | Path |
//! |--------|------|-----------|------|
//! | `DirSource("./views")` | `"layouts/main"` | `.html` | `./views/layouts/main.html` |
//! | `EmbeddedSource` | `"layouts/main"` | `.html` | `layouts/main.html` |
//! | `DirSource("./views")` | `"/index"` | `.html` | `./views/index.html` |
//!
//! Names are always relative to the root: root, `.` and `..` segments
//! are dropped.
//!
//! Nothing is cached at this layer: every call re-reads the backing store.
//! Caching is the job of [`crate::cache`].

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ViewError;

/// A backend that can read template bodies by path.
///
/// Implementations report a missing resource with [`io::ErrorKind::NotFound`];
/// any other error kind is surfaced as [`ViewError::Io`].
pub trait TemplateSource: Send + Sync {
    /// Builds the path for a template name and extension.
    fn resolve_path(&self, name: &str, extension: &str) -> PathBuf;

    /// Reads the raw bytes at `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Checks that the source is usable. Called by [`Engine::load`](crate::Engine::load).
    fn validate(&self) -> Result<(), ViewError> {
        Ok(())
    }
}

/// A template read from a source, ready for compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    /// The logical name the template was requested by (e.g. `"layouts/main"`).
    pub name: String,
    /// The final path segment (e.g. `"main.html"`).
    pub base_name: String,
    /// The resolved path.
    pub path: PathBuf,
    /// The template text.
    pub body: String,
}

/// Reads the template `name` from `source`.
///
/// # Errors
///
/// - [`ViewError::NotFound`] if the source has nothing at the resolved path
/// - [`ViewError::Io`] for any other read failure, including invalid UTF-8
pub fn read_template(
    source: &dyn TemplateSource,
    name: &str,
    extension: &str,
) -> Result<TemplateFile, ViewError> {
    let path = source.resolve_path(name, extension);

    let bytes = source.read(&path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ViewError::NotFound {
            name: name.to_string(),
            path: path.clone(),
        },
        _ => ViewError::Io {
            path: path.clone(),
            source: err,
        },
    })?;

    let body = String::from_utf8(bytes).map_err(|err| ViewError::Io {
        path: path.clone(),
        source: io::Error::new(io::ErrorKind::InvalidData, err),
    })?;

    let base_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    Ok(TemplateFile {
        name: name.to_string(),
        base_name,
        path,
        body,
    })
}

/// Templates stored in a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// Creates a source rooted at `root`. The directory is checked on
    /// [`validate`](TemplateSource::validate), not here.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateSource for DirSource {
    fn resolve_path(&self, name: &str, extension: &str) -> PathBuf {
        // Only plain segments are kept, so the path never leaves `root`.
        let relative: PathBuf = Path::new(name)
            .components()
            .filter(|component| matches!(component, Component::Normal(_)))
            .collect();
        let mut path = self.root.join(relative).into_os_string();
        path.push(extension);
        PathBuf::from(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn validate(&self) -> Result<(), ViewError> {
        if !self.root.exists() {
            return Err(ViewError::Config(format!(
                "Template directory does not exist: {}",
                self.root.display()
            )));
        }
        if !self.root.is_dir() {
            return Err(ViewError::Config(format!(
                "Path is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}

/// An in-memory virtual filesystem of templates.
///
/// Paths are relative to the virtual root; leading `/` and `./` are ignored,
/// so `"/index.html"`, `"./index.html"` and `"index.html"` name the same entry.
///
/// # Example
///
/// ```rust
/// use viewkit::source::{read_template, EmbeddedSource};
///
/// static VIEWS: &[(&str, &str)] = &[
///     ("index.html", "<h1>{{ title }}</h1>"),
///     ("layouts/main.html", "<body>{% include 'index' %}</body>"),
/// ];
///
/// let source = EmbeddedSource::from_static(VIEWS);
/// let file = read_template(&source, "layouts/main", ".html").unwrap();
/// assert_eq!(file.base_name, "main.html");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSource {
    files: HashMap<String, Vec<u8>>,
}

impl EmbeddedSource {
    /// Creates an empty virtual filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a source from `(path, contents)` pairs baked into the binary,
    /// typically a table of `include_str!` entries.
    pub fn from_static(entries: &'static [(&'static str, &'static str)]) -> Self {
        entries.iter().copied().collect()
    }

    /// Adds or replaces the file at `path`.
    pub fn insert(&mut self, path: impl AsRef<str>, contents: impl Into<Vec<u8>>) -> &mut Self {
        self.files
            .insert(normalize(path.as_ref()).to_string(), contents.into());
        self
    }

    /// Returns the number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no files are stored.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<P: AsRef<str>, C: Into<Vec<u8>>> FromIterator<(P, C)> for EmbeddedSource {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut source = EmbeddedSource::new();
        for (path, contents) in iter {
            source.insert(path, contents);
        }
        source
    }
}

impl TemplateSource for EmbeddedSource {
    fn resolve_path(&self, name: &str, extension: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", normalize(name), extension))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let key = path.to_string_lossy().replace('\\', "/");
        self.files.get(normalize(&key)).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no embedded file at {}", key),
            )
        })
    }
}

/// Strips the virtual-root prefixes a caller may include.
fn normalize(path: &str) -> &str {
    let mut path = path;
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            return path;
        }
    }
}
