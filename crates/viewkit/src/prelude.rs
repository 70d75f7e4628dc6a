//! Prelude for convenient imports.
//!
//! ```rust,ignore
//! use viewkit::prelude::*;
//!
//! let engine = Engine::new("./views", ".html");
//! engine.render(&mut out, "index", &data, &["layouts/main"])?;
//! ```

pub use crate::{DirSource, EmbeddedSource, Engine, EngineConfig, TemplateSource, Value, ViewError};
