//! Navigation table and static HTML views of the rollup dapp shell.
//!
//! Views are instantiated lazily: a route only holds a factory, which runs when the route
//! is resolved and rendered.

mod views;

pub use views::{escape_html, HelloView, HomeView, SubmissionSummary, View, ViewContext};

use std::io::Write;
use std::path::Path;

/// One entry of the navigation table.
pub struct Route {
    pub path: &'static str,
    pub name: &'static str,
    factory: fn() -> Box<dyn View>,
}

impl Route {
    /// Build the route's view.
    pub fn instantiate(&self) -> Box<dyn View> {
        (self.factory)()
    }
}

fn home_view() -> Box<dyn View> {
    Box::new(HomeView)
}

fn hello_view() -> Box<dyn View> {
    Box::new(HelloView)
}

static ROUTES: [Route; 2] = [
    Route {
        path: "/",
        name: "home",
        factory: home_view,
    },
    Route {
        path: "/hello",
        name: "hello",
        factory: hello_view,
    },
];

/// History-style router over [`ROUTES`], mounted under a base path.
pub struct Router {
    base: String,
}

impl Default for Router {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Router {
    /// `base` is stripped from incoming paths before lookup (e.g. `/app/`).
    pub fn new(base: &str) -> Self {
        let base = base.trim().trim_end_matches('/');
        Self {
            base: base.to_string(),
        }
    }

    pub fn routes(&self) -> &'static [Route] {
        &ROUTES
    }

    /// Route for `path`. Query string, fragment and a trailing slash are ignored.
    pub fn resolve(&self, path: &str) -> Option<&'static Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = if self.base.is_empty() {
            path
        } else {
            let rest = path.strip_prefix(self.base.as_str())?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            rest
        };
        let path = path.trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path };
        ROUTES.iter().find(|r| r.path == path)
    }

    /// Resolve, instantiate and render in one go.
    pub fn render(&self, path: &str, ctx: &ViewContext) -> Option<String> {
        self.resolve(path).map(|route| route.instantiate().render(ctx))
    }
}

/// Render `view` to `out_path`.
pub fn render_to_file(
    view: &dyn View,
    ctx: &ViewContext,
    out_path: impl AsRef<Path>,
) -> Result<(), ViewError> {
    let html = view.render(ctx);
    let mut f = std::fs::File::create(out_path.as_ref()).map_err(ViewError::Io)?;
    f.write_all(html.as_bytes()).map_err(ViewError::Io)?;
    Ok(())
}

#[derive(Debug)]
pub enum ViewError {
    Io(std::io::Error),
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewError::Io(e) => write!(f, "io: {}", e),
        }
    }
}

impl std::error::Error for ViewError {}
