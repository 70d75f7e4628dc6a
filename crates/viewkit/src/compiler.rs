//! Template compilation on top of MiniJinja.
//!
//! This module wraps the MiniJinja [`Environment`] so the rest of the crate
//! deals in [`ComposedTemplate`]s: one environment holding every file of a
//! composition (a page plus its layouts), with a designated entry point.
//!
//! ## Composition
//!
//! All files of a composition live in the same environment, registered under
//! their logical names (`"index"`, `"layouts/main"`) and, when that name is
//! free, under their base file names (`"index.html"`, `"main.html"`). A layout
//! can therefore pull in the page it wraps:
//!
//! ```jinja
//! <html><body>{% include "index" %}</body></html>
//! ```
//!
//! and a page can extend a layout or include a partial listed in the same
//! composition.
//!
//! Layouts that wrap more than one page use the `embed()` function instead of
//! a fixed name. It returns the name of the template the calling layout wraps:
//!
//! ```jinja
//! <html><body>{% include embed() %}</body></html>
//! ```
//!
//! ## Delimiters
//!
//! [`Syntax`] maps onto MiniJinja's syntax configuration. The defaults are the
//! usual `{{ }}`, `{% %}` and `{# #}` pairs.

use std::collections::HashMap;
use std::io::Write;

use minijinja::syntax::SyntaxConfig;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, State, UndefinedBehavior, Value};

use tracing::debug;

use crate::error::ViewError;
use crate::source::TemplateFile;

/// Pseudo file name reported when the delimiter configuration is invalid.
pub const SYNTAX_FILE: &str = "<syntax>";

/// Default name of the function layouts call to include what they wrap.
pub const DEFAULT_EMBED_FUNCTION: &str = "embed";

/// A pair of opening and closing delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Delimiters {
    /// Creates a delimiter pair.
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Replaces empty sides with the sides of `default`.
    fn or_default(left: &str, right: &str, default: (&str, &str)) -> Self {
        let pick = |value: &str, fallback: &str| {
            if value.is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };
        Self::new(pick(left, default.0), pick(right, default.1))
    }
}

/// Delimiter configuration for every kind of template action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    /// Expression delimiters, `{{ }}` by default.
    pub variable: Delimiters,
    /// Statement delimiters, `{% %}` by default.
    pub block: Delimiters,
    /// Comment delimiters, `{# #}` by default.
    pub comment: Delimiters,
}

impl Default for Syntax {
    fn default() -> Self {
        Self {
            variable: Delimiters::new("{{", "}}"),
            block: Delimiters::new("{%", "%}"),
            comment: Delimiters::new("{#", "#}"),
        }
    }
}

impl Syntax {
    /// Sets the expression delimiters. An empty side means its default.
    pub fn set_variable(&mut self, left: &str, right: &str) {
        self.variable = Delimiters::or_default(left, right, ("{{", "}}"));
    }

    /// Sets the statement delimiters. An empty side means its default.
    pub fn set_block(&mut self, left: &str, right: &str) {
        self.block = Delimiters::or_default(left, right, ("{%", "%}"));
    }

    /// Sets the comment delimiters. An empty side means its default.
    pub fn set_comment(&mut self, left: &str, right: &str) {
        self.comment = Delimiters::or_default(left, right, ("{#", "#}"));
    }

    /// Builds the MiniJinja syntax configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Compile`] if the delimiters conflict.
    pub fn to_config(&self) -> Result<SyntaxConfig, ViewError> {
        SyntaxConfig::builder()
            .variable_delimiters(self.variable.left.clone(), self.variable.right.clone())
            .block_delimiters(self.block.left.clone(), self.block.right.clone())
            .comment_delimiters(self.comment.left.clone(), self.comment.right.clone())
            .build()
            .map_err(|source| ViewError::Compile {
                file: SYNTAX_FILE.to_string(),
                source,
            })
    }
}

/// Settings applied to every environment built by [`compile`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub syntax: Syntax,
    /// Extension used to pick the auto-escape mode (`.html` escapes).
    pub extension: String,
    pub undefined: UndefinedBehavior,
    /// Name of the layout embedding function.
    pub embed_function: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            syntax: Syntax::default(),
            extension: String::new(),
            undefined: UndefinedBehavior::Strict,
            embed_function: DEFAULT_EMBED_FUNCTION.to_string(),
        }
    }
}

/// A compiled composition of templates.
///
/// Immutable once built; executing it does not change it, so one instance can
/// be executed from many threads at once.
#[derive(Debug)]
pub struct ComposedTemplate {
    env: Environment<'static>,
    entry: String,
    key: String,
}

impl ComposedTemplate {
    /// The name of the template that [`execute`](Self::execute) runs.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Names of every template in the composition, sorted.
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.env.templates().map(|(n, _)| n.to_string()).collect();
        names.sort();
        names
    }

    /// Executes the entry template against `data`, streaming into `out`.
    ///
    /// Output produced before a failure stays in `out`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Execution`] on any runtime failure, including
    /// writes to `out` failing.
    pub fn execute<W: Write>(&self, data: &Value, out: W) -> Result<(), ViewError> {
        let exec_err = |source| ViewError::Execution {
            template: self.key.clone(),
            source,
        };
        let tmpl = self.env.get_template(&self.entry).map_err(exec_err)?;
        tmpl.render_to_write(data, out).map_err(exec_err)?;
        Ok(())
    }
}

/// Compiles `files` into one composed template.
///
/// `entry` must be the logical name of one of the files. `key` is the display
/// form of the composition's cache key, used in error messages.
///
/// # Errors
///
/// Returns [`ViewError::Compile`] naming the first file that fails to parse,
/// or the syntax pseudo-file if the delimiters are invalid.
pub fn compile(
    files: Vec<TemplateFile>,
    entry: &str,
    key: &str,
    options: &CompileOptions,
    functions: HashMap<String, Value>,
) -> Result<ComposedTemplate, ViewError> {
    let mut env = Environment::new();
    env.set_syntax(options.syntax.to_config()?);
    env.set_undefined_behavior(options.undefined);

    let escape = minijinja::default_auto_escape_callback(&format!("view{}", options.extension));
    env.set_auto_escape_callback(move |_name: &str| -> AutoEscape { escape.clone() });

    env.add_global(
        options.embed_function.clone(),
        embed_function(&files, &options.embed_function),
    );
    // Registered functions may replace the embed function.
    for (name, function) in functions {
        env.add_global(name, function);
    }

    let mut base_names = Vec::new();
    for file in files {
        let TemplateFile {
            name,
            base_name,
            path,
            body,
        } = file;

        env.add_template_owned(name.clone(), body.clone())
            .map_err(|source| ViewError::Compile {
                file: path.display().to_string(),
                source,
            })?;
        if base_name != name {
            base_names.push((base_name, body));
        }
    }

    // Aliases go in after every logical name so they never shadow one.
    for (base_name, body) in base_names {
        if env.get_template(&base_name).is_err() {
            // The body already parsed under its logical name.
            if let Err(err) = env.add_template_owned(base_name.clone(), body) {
                debug!(alias = %base_name, error = %err, "skipped template alias");
            }
        }
    }

    Ok(ComposedTemplate {
        env,
        entry: entry.to_string(),
        key: key.to_string(),
    })
}

/// Builds the function that maps each layout to the template it wraps.
///
/// With files `[page, inner, outer]`, `embed()` returns `"page"` inside
/// `inner` and `"inner"` inside `outer`. Calling it anywhere else is an error.
fn embed_function(files: &[TemplateFile], fn_name: &str) -> Value {
    let mut wraps: HashMap<String, String> = HashMap::new();
    for pair in files.windows(2) {
        wraps.insert(pair[1].name.clone(), pair[0].name.clone());
    }
    for pair in files.windows(2) {
        wraps
            .entry(pair[1].base_name.clone())
            .or_insert_with(|| pair[0].name.clone());
    }

    let fn_name = fn_name.to_string();
    Value::from_function(move |state: &State| -> Result<String, Error> {
        wraps.get(state.name()).cloned().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("{}() called outside a layout in \"{}\"", fn_name, state.name()),
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use std::path::PathBuf;

    fn file(name: &str, body: &str) -> TemplateFile {
        let base_name = name.rsplit('/').next().unwrap_or(name).to_string() + ".html";
        TemplateFile {
            name: name.to_string(),
            base_name,
            path: PathBuf::from(format!("views/{name}.html")),
            body: body.to_string(),
        }
    }

    fn html_options() -> CompileOptions {
        CompileOptions {
            extension: ".html".to_string(),
            ..CompileOptions::default()
        }
    }

    fn execute_to_string(tmpl: &ComposedTemplate, data: Value) -> Result<String, ViewError> {
        let mut out = Vec::new();
        tmpl.execute(&data, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_compile_single_file() {
        let tmpl = compile(
            vec![file("index", "<h1>{{ title }}</h1>")],
            "index",
            "index",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();

        assert_eq!(tmpl.entry(), "index");
        assert_eq!(tmpl.template_names(), vec!["index", "index.html"]);
        let out = execute_to_string(&tmpl, context! { title => "Hi" }).unwrap();
        assert_eq!(out, "<h1>Hi</h1>");
    }

    #[test]
    fn test_compile_layout_includes_page() {
        let tmpl = compile(
            vec![
                file("index", "<h1>{{ Title }}</h1>"),
                file("layouts/main", "<html><body>{% include \"index\" %}</body></html>"),
            ],
            "layouts/main",
            "index,layouts/main",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();

        let out = execute_to_string(&tmpl, context! { Title => "Hi" }).unwrap();
        assert_eq!(out, "<html><body><h1>Hi</h1></body></html>");
    }

    #[test]
    fn test_embed_follows_layout_chain() {
        let tmpl = compile(
            vec![
                file("index", "<h1>{{ title }}</h1>"),
                file("layouts/inner", "<main>{% include embed() %}</main>"),
                file("layouts/outer", "<body>{% include embed() %}</body>"),
            ],
            "layouts/outer",
            "index,layouts/inner,layouts/outer",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();

        let out = execute_to_string(&tmpl, context! { title => "Hi" }).unwrap();
        assert_eq!(out, "<body><main><h1>Hi</h1></main></body>");
    }

    #[test]
    fn test_embed_outside_layout_fails() {
        let tmpl = compile(
            vec![file("index", "{% include embed() %}")],
            "index",
            "index",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();

        let err = execute_to_string(&tmpl, context! {}).unwrap_err();
        assert!(err.to_string().contains("failed to render"), "got {err}");
    }

    #[test]
    fn test_embed_function_name_is_configurable() {
        let options = CompileOptions {
            embed_function: "content".to_string(),
            ..html_options()
        };
        let tmpl = compile(
            vec![file("page", "P"), file("layout", "[{% include content() %}]")],
            "layout",
            "page,layout",
            &options,
            HashMap::new(),
        )
        .unwrap();

        assert_eq!(execute_to_string(&tmpl, context! {}).unwrap(), "[P]");
    }

    #[test]
    fn test_base_name_alias_is_usable() {
        let tmpl = compile(
            vec![
                file("partials/nav", "<nav/>"),
                file("page", "{% include \"nav.html\" %}"),
            ],
            "page",
            "partials/nav,page",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();

        assert_eq!(execute_to_string(&tmpl, context! {}).unwrap(), "<nav/>");
    }

    #[test]
    fn test_logical_name_wins_over_alias() {
        let tmpl = compile(
            vec![
                file("partials/nav", "alias"),
                file("nav.html", "logical"),
                file("page", "{% include \"nav.html\" %}"),
            ],
            "page",
            "partials/nav,nav.html,page",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();

        assert_eq!(execute_to_string(&tmpl, context! {}).unwrap(), "logical");
    }

    #[test]
    fn test_unknown_function_fails_at_execution() {
        let tmpl = compile(
            vec![file("shout", "{{ upper(word) }}")],
            "shout",
            "shout",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();

        match execute_to_string(&tmpl, context! { word => "hey" }) {
            Err(ViewError::Execution { source, .. }) => {
                assert_eq!(source.kind(), ErrorKind::UnknownFunction)
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_error_names_file() {
        let err = compile(
            vec![file("ok", "fine"), file("broken", "{{ unclosed")],
            "ok",
            "ok,broken",
            &html_options(),
            HashMap::new(),
        )
        .unwrap_err();

        match err {
            ViewError::Compile { file, .. } => assert_eq!(file, "views/broken.html"),
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_functions_are_injected() {
        let mut functions = HashMap::new();
        functions.insert(
            "upper".to_string(),
            Value::from_function(|s: String| s.to_uppercase()),
        );

        let tmpl = compile(
            vec![file("shout", "{{ upper(word) }}")],
            "shout",
            "shout",
            &html_options(),
            functions,
        )
        .unwrap();

        let out = execute_to_string(&tmpl, context! { word => "hey" }).unwrap();
        assert_eq!(out, "HEY");
    }

    #[test]
    fn test_custom_variable_delimiters() {
        let mut options = html_options();
        options.syntax.set_variable("[[", "]]");

        let tmpl = compile(
            vec![file("alt", "<p>[[ name ]] {{ kept }}</p>")],
            "alt",
            "alt",
            &options,
            HashMap::new(),
        )
        .unwrap();

        let out = execute_to_string(&tmpl, context! { name => "x" }).unwrap();
        assert_eq!(out, "<p>x {{ kept }}</p>");
    }

    #[test]
    fn test_empty_delimiter_means_default() {
        let mut syntax = Syntax::default();
        syntax.set_variable("", "]]");
        assert_eq!(syntax.variable, Delimiters::new("{{", "]]"));

        syntax.set_block("<%", "");
        assert_eq!(syntax.block, Delimiters::new("<%", "%}"));
    }

    #[test]
    fn test_conflicting_delimiters_fail() {
        let mut syntax = Syntax::default();
        syntax.set_variable("{%", "%}");

        match syntax.to_config() {
            Err(ViewError::Compile { file, .. }) => assert_eq!(file, SYNTAX_FILE),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_html_extension_escapes() {
        let tmpl = compile(
            vec![file("esc", "{{ v }}")],
            "esc",
            "esc",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();
        let out = execute_to_string(&tmpl, context! { v => "<b>" }).unwrap();
        assert_eq!(out, "&lt;b&gt;");

        let text = CompileOptions {
            extension: ".txt".to_string(),
            ..CompileOptions::default()
        };
        let tmpl = compile(vec![file("esc", "{{ v }}")], "esc", "esc", &text, HashMap::new())
            .unwrap();
        let out = execute_to_string(&tmpl, context! { v => "<b>" }).unwrap();
        assert_eq!(out, "<b>");
    }

    #[test]
    fn test_missing_field_is_execution_error() {
        let tmpl = compile(
            vec![file("strict", "before {{ missing.field }}")],
            "strict",
            "strict",
            &html_options(),
            HashMap::new(),
        )
        .unwrap();

        let mut out = Vec::new();
        let err = tmpl.execute(&context! {}, &mut out).unwrap_err();
        assert!(matches!(err, ViewError::Execution { .. }), "got {err:?}");
    }
}
