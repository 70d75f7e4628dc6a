//! The view engine: composition, caching and rendering.
//!
//! [`Engine`] turns a template name plus zero or more layout names into a
//! single compiled composition, caches it, and executes it against the
//! caller's data.
//!
//! # Layouts
//!
//! A render call names the primary template and, optionally, the layouts that
//! wrap it. Each layout wraps everything before it in the list, and the last
//! one is executed:
//!
//! ```text
//! render("index", data, ["layouts/inner", "layouts/outer"])
//!   executes layouts/outer
//!     which includes layouts/inner   ({% include embed() %})
//!       which includes index         ({% include embed() %})
//! ```
//!
//! When the call names no layouts, the engine's default layouts are used.
//! Passing a single empty name (`&[""]`) renders the primary alone even when
//! defaults are configured.
//!
//! # Caching and Reload
//!
//! Compositions are compiled on first use and cached by their ordered name
//! list. Cached compositions are never re-validated against the source; call
//! [`Engine::load`] to drop them all, or enable [`Engine::set_reload`] during
//! development to drop them before every render.
//!
//! # Example
//!
//! ```rust
//! use viewkit::{EmbeddedSource, Engine};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Page { title: String }
//!
//! let mut views = EmbeddedSource::new();
//! views.insert("index.html", "<h1>{{ title }}</h1>");
//! views.insert("layouts/main.html", "<body>{% include 'index' %}</body>");
//!
//! let mut engine = Engine::with_source(views, ".html");
//! engine.set_default_layouts(["layouts/main"]);
//!
//! let out = engine
//!     .render_to_string("index", &Page { title: "Hi".into() }, &[])
//!     .unwrap();
//! assert_eq!(out, "<body><h1>Hi</h1></body>");
//! ```

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use minijinja::functions::Function;
use minijinja::value::{FunctionArgs, FunctionResult};
use minijinja::{UndefinedBehavior, Value};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheKey, TemplateCache};
use crate::compiler::{compile, CompileOptions, ComposedTemplate, Syntax};
use crate::error::ViewError;
use crate::functions::FunctionRegistry;
use crate::source::{read_template, DirSource, EmbeddedSource, TemplateSource};

/// A template engine with a composition cache.
///
/// Configure it once (`&mut self` setters), then share it across threads:
/// rendering, function registration, reload toggling and [`load`](Self::load)
/// all take `&self`.
pub struct Engine {
    source: Arc<dyn TemplateSource>,
    options: CompileOptions,
    default_layouts: Vec<String>,
    reload: AtomicBool,
    debug: AtomicBool,
    functions: FunctionRegistry,
    cache: TemplateCache,
}

impl Engine {
    /// Creates an engine reading `<directory>/<name><extension>` from disk.
    ///
    /// The directory is not checked until [`load`](Self::load) is called or a
    /// template is read.
    pub fn new(directory: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self::with_source(DirSource::new(directory), extension)
    }

    /// Creates an engine reading from an in-memory table of `(path, contents)`
    /// entries.
    pub fn embedded(
        entries: &'static [(&'static str, &'static str)],
        extension: impl Into<String>,
    ) -> Self {
        Self::with_source(EmbeddedSource::from_static(entries), extension)
    }

    /// Creates an engine over any [`TemplateSource`].
    pub fn with_source(
        source: impl TemplateSource + 'static,
        extension: impl Into<String>,
    ) -> Self {
        let extension = extension.into();
        Self {
            source: Arc::new(source),
            options: CompileOptions {
                extension,
                ..CompileOptions::default()
            },
            default_layouts: Vec::new(),
            reload: AtomicBool::new(false),
            debug: AtomicBool::new(false),
            functions: FunctionRegistry::new(),
            cache: TemplateCache::new(),
        }
    }

    /// Sets the expression delimiters (default `{{` and `}}`). An empty string
    /// keeps the default for that side.
    ///
    /// Takes effect for compositions compiled after the next cache clear.
    pub fn set_delimiters(&mut self, left: &str, right: &str) -> &mut Self {
        self.options.syntax.set_variable(left, right);
        self
    }

    /// Sets the statement delimiters (default `{%` and `%}`). An empty string
    /// keeps the default for that side.
    pub fn set_block_delimiters(&mut self, left: &str, right: &str) -> &mut Self {
        self.options.syntax.set_block(left, right);
        self
    }

    /// Sets the comment delimiters (default `{#` and `#}`).
    pub fn set_comment_delimiters(&mut self, left: &str, right: &str) -> &mut Self {
        self.options.syntax.set_comment(left, right);
        self
    }

    /// Replaces the layouts used when a render call names none.
    pub fn set_default_layouts<I, S>(&mut self, layouts: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_layouts = layouts.into_iter().map(Into::into).collect();
        self
    }

    /// Appends to the default layouts.
    pub fn add_layouts<I, S>(&mut self, layouts: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_layouts
            .extend(layouts.into_iter().map(Into::into));
        self
    }

    /// Sets how undefined values behave during execution. Defaults to
    /// [`UndefinedBehavior::Strict`].
    pub fn set_undefined_behavior(&mut self, behavior: UndefinedBehavior) -> &mut Self {
        self.options.undefined = behavior;
        self
    }

    /// Renames the function layouts call to include the template they wrap
    /// (default `embed`).
    pub fn set_embed_function(&mut self, name: impl Into<String>) -> &mut Self {
        self.options.embed_function = name.into();
        self
    }

    /// When enabled, the cache is cleared before every render so template
    /// edits show up immediately. Meant for development.
    pub fn set_reload(&self, enabled: bool) -> &Self {
        self.reload.store(enabled, Ordering::Relaxed);
        self
    }

    /// When enabled, every compile logs the templates in the composition.
    pub fn set_debug(&self, enabled: bool) -> &Self {
        self.debug.store(enabled, Ordering::Relaxed);
        self
    }

    /// Registers a template function. Overwrites any function of the same name.
    ///
    /// Compositions already in the cache keep the functions they were compiled
    /// with until the next [`load`](Self::load).
    pub fn register_function<F, Rv, Args>(&self, name: impl Into<String>, f: F) -> &Self
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.functions.register(name, f);
        self
    }

    /// Registers several callables at once, built with [`Value::from_function`].
    pub fn register_functions<I, K>(&self, functions: I) -> &Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.functions.register_all(functions);
        self
    }

    /// Returns the registered function names.
    pub fn registered_function_names(&self) -> BTreeSet<String> {
        self.functions.names()
    }

    /// Returns the extension appended to template names.
    pub fn extension(&self) -> &str {
        &self.options.extension
    }

    /// Returns the default layouts.
    pub fn default_layouts(&self) -> &[String] {
        &self.default_layouts
    }

    /// Returns the delimiter configuration.
    pub fn syntax(&self) -> &Syntax {
        &self.options.syntax
    }

    /// Returns true if reload mode is on.
    pub fn is_reload(&self) -> bool {
        self.reload.load(Ordering::Relaxed)
    }

    /// Returns the keys of every cached composition, sorted.
    pub fn cached_keys(&self) -> Vec<CacheKey> {
        self.cache.keys()
    }

    /// Validates the configuration and drops every cached composition.
    ///
    /// Either the whole cache is cleared or, on error, nothing changes.
    ///
    /// # Errors
    ///
    /// - [`ViewError::Config`] if the source is unusable (e.g. the template
    ///   directory does not exist)
    /// - [`ViewError::Compile`] if the delimiters conflict
    pub fn load(&self) -> Result<(), ViewError> {
        self.source.validate()?;
        self.options.syntax.to_config()?;
        self.cache.clear();
        debug!("template cache cleared");
        Ok(())
    }

    /// Builds the cache key for a render call, applying the default layouts.
    pub fn composition_key(&self, primary: &str, layouts: &[&str]) -> CacheKey {
        let chosen: Vec<&str> = if layouts.is_empty() {
            self.default_layouts.iter().map(String::as_str).collect()
        } else {
            layouts.to_vec()
        };
        CacheKey::new(primary, chosen.into_iter().filter(|name| !name.is_empty()))
    }

    /// Returns the composition for `primary` and `layouts`, compiling and
    /// caching it on a miss.
    ///
    /// # Errors
    ///
    /// - [`ViewError::NotFound`] / [`ViewError::Io`] if any file can't be read
    /// - [`ViewError::Compile`] if any file fails to parse
    #[tracing::instrument(level = "debug", skip(self, layouts))]
    pub fn resolve(
        &self,
        primary: &str,
        layouts: &[&str],
    ) -> Result<Arc<ComposedTemplate>, ViewError> {
        let key = self.composition_key(primary, layouts);
        if let Some(hit) = self.cache.get(&key) {
            debug!(%key, "cache hit");
            return Ok(hit);
        }

        debug!(%key, "cache miss");
        let files = key
            .names()
            .iter()
            .map(|name| read_template(self.source.as_ref(), name, &self.options.extension))
            .collect::<Result<Vec<_>, _>>()?;

        let composed = Arc::new(compile(
            files,
            key.entry(),
            &key.to_string(),
            &self.options,
            self.functions.snapshot(),
        )?);

        if self.debug.load(Ordering::Relaxed) {
            info!(%key, entry = composed.entry(), templates = ?composed.template_names(), "compiled");
        }

        self.cache.insert(key, Arc::clone(&composed));
        Ok(composed)
    }

    /// Renders `name` wrapped in `layouts` with `data`, writing into `out`.
    ///
    /// An empty `layouts` slice uses the default layouts; `&[""]` renders
    /// `name` alone. Pass `&()` when the template needs no data.
    ///
    /// Nothing is written if the composition can't be resolved. If execution
    /// fails midway, whatever was already written stays in `out`.
    ///
    /// # Errors
    ///
    /// Any error from [`resolve`](Self::resolve), or [`ViewError::Execution`].
    pub fn render<W, T>(
        &self,
        out: W,
        name: &str,
        data: &T,
        layouts: &[&str],
    ) -> Result<(), ViewError>
    where
        W: Write,
        T: Serialize + ?Sized,
    {
        if self.is_reload() {
            self.cache.clear();
        }

        let composed = self.resolve(name, layouts)?;
        composed.execute(&Value::from_serialize(data), out)
    }

    /// Renders into a `String`. See [`render`](Self::render).
    pub fn render_to_string<T>(
        &self,
        name: &str,
        data: &T,
        layouts: &[&str],
    ) -> Result<String, ViewError>
    where
        T: Serialize + ?Sized,
    {
        let mut out = Vec::new();
        self.render(&mut out, name, data, layouts)?;
        String::from_utf8(out).map_err(|err| ViewError::Execution {
            template: name.to_string(),
            source: minijinja::Error::new(minijinja::ErrorKind::BadSerialization, err.to_string()),
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("extension", &self.options.extension)
            .field("syntax", &self.options.syntax)
            .field("default_layouts", &self.default_layouts)
            .field("reload", &self.is_reload())
            .field("functions", &self.functions.names())
            .field("cached", &self.cache.len())
            .finish()
    }
}
