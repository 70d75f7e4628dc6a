//! # viewkit - Cached Views With Layouts
//!
//! `viewkit` renders named templates for web servers. It compiles a template
//! together with the layouts that wrap it on first use, caches the result, and
//! executes it against request data, streaming into any [`std::io::Write`].
//!
//! Templates use [MiniJinja](https://docs.rs/minijinja) syntax. The engine
//! adds the parts a server needs around it: file lookup, layout composition,
//! a shared function registry, and cache invalidation for development.
//!
//! ## Core Concepts
//!
//! - [`Engine`]: configuration, cache and the `render` entry point
//! - [`TemplateSource`]: where template files come from ([`DirSource`] on disk,
//!   [`EmbeddedSource`] in memory)
//! - [`FunctionRegistry`]: functions callable from every template
//! - [`CacheKey`]: the ordered list of names identifying one composition
//! - [`EngineConfig`]: YAML description of an engine
//!
//! ## Quick Start
//!
//! ```rust
//! use viewkit::{EmbeddedSource, Engine};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Index { title: String }
//!
//! let mut views = EmbeddedSource::new();
//! views.insert("index.html", "<h1>{{ title }}</h1>");
//! views.insert("layouts/main.html", "<html><body>{% include 'index' %}</body></html>");
//!
//! let engine = Engine::with_source(views, ".html");
//!
//! let mut out = Vec::new();
//! engine
//!     .render(&mut out, "index", &Index { title: "Hi".into() }, &["layouts/main"])
//!     .unwrap();
//! assert_eq!(out, b"<html><body><h1>Hi</h1></body></html>");
//! ```
//!
//! ## Functions
//!
//! ```rust
//! use viewkit::{EmbeddedSource, Engine};
//!
//! let mut views = EmbeddedSource::new();
//! views.insert("admin.html", "{% if is_admin(user) %}Hello, Admin!{% else %}Access denied!{% endif %}");
//!
//! let engine = Engine::with_source(views, ".html");
//! engine.register_function("is_admin", |user: String| user == "admin");
//!
//! let out = engine
//!     .render_to_string("admin", &serde_json::json!({ "user": "john" }), &[])
//!     .unwrap();
//! assert_eq!(out, "Access denied!");
//! ```
//!
//! ## Development Mode
//!
//! ```rust,ignore
//! let engine = Engine::new("./views", ".html");
//! engine.set_reload(cfg!(debug_assertions));
//! ```
//!
//! With reload on, the cache is dropped before every render, so edits to
//! files under `./views` show up on the next request.

pub mod cache;
pub mod compiler;
pub mod config;
mod engine;
mod error;
pub mod functions;
pub mod prelude;
pub mod source;

pub use cache::{CacheKey, TemplateCache};
pub use compiler::{ComposedTemplate, Delimiters, Syntax};
pub use config::{DelimiterConfig, EngineConfig, UndefinedMode};
pub use engine::Engine;
pub use error::ViewError;
pub use functions::FunctionRegistry;
pub use source::{read_template, DirSource, EmbeddedSource, TemplateFile, TemplateSource};

// Callable values for `Engine::register_functions`.
pub use minijinja::{UndefinedBehavior, Value};
