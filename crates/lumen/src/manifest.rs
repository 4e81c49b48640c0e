// File: src/manifest.rs
// Purpose: Route, layout, catcher and action registries plus the process-wide manifest

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use lumen_router::{Routable, Router, RouterError};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::loader::LoaderArgs;
use crate::response::LoaderOutput;
use crate::value::Value;

pub type LoaderFn = Arc<dyn Fn(LoaderArgs) -> BoxFuture<'static, Result<LoaderOutput>> + Send + Sync>;
pub type ActionFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("id `{0}` is registered more than once")]
    DuplicateId(String),

    #[error("route `{route}` refers to a layout from another manifest")]
    UnknownLayout { route: String },

    #[error("a manifest is already installed")]
    AlreadyInstalled,

    #[error("no manifest installed; call lumen::manifest::install first")]
    NotInstalled,
}

fn boxed_loader<F, Fut, O, E>(loader: F) -> LoaderFn
where
    F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
    O: Into<LoaderOutput>,
    E: Into<Error>,
{
    Arc::new(move |args| {
        let fut = loader(args);
        async move { fut.await.map(Into::into).map_err(Into::into) }.boxed()
    })
}

/// Handle to a layout registered with a [`ManifestBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRef(usize);

#[derive(Clone)]
pub struct Route {
    id: String,
    pattern: String,
    layouts: Vec<LayoutRef>,
    loader: Option<LoaderFn>,
    view: String,
}

impl Route {
    /// A route whose view key defaults to its id.
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            view: id.clone(),
            id,
            pattern: pattern.into(),
            layouts: Vec::new(),
            loader: None,
        }
    }

    /// Layouts wrapping this route, outermost first.
    pub fn layouts(mut self, layouts: impl IntoIterator<Item = LayoutRef>) -> Self {
        self.layouts = layouts.into_iter().collect();
        self
    }

    pub fn loader<F, Fut, O, E>(mut self, loader: F) -> Self
    where
        F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Into<LoaderOutput>,
        E: Into<Error>,
    {
        self.loader = Some(boxed_loader(loader));
        self
    }

    pub fn view(mut self, key: impl Into<String>) -> Self {
        self.view = key.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn view_key(&self) -> &str {
        &self.view
    }

    pub fn loader_fn(&self) -> Option<&LoaderFn> {
        self.loader.as_ref()
    }
}

impl Routable for Route {
    fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("layouts", &self.layouts)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct Layout {
    id: String,
    pattern: String,
    loader: Option<LoaderFn>,
    view: String,
}

impl Layout {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            view: id.clone(),
            id,
            pattern: pattern.into(),
            loader: None,
        }
    }

    pub fn loader<F, Fut, O, E>(mut self, loader: F) -> Self
    where
        F: Fn(LoaderArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Into<LoaderOutput>,
        E: Into<Error>,
    {
        self.loader = Some(boxed_loader(loader));
        self
    }

    pub fn view(mut self, key: impl Into<String>) -> Self {
        self.view = key.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn view_key(&self) -> &str {
        &self.view
    }

    pub fn loader_fn(&self) -> Option<&LoaderFn> {
        self.loader.as_ref()
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ErrorCatcher {
    id: String,
    pattern: String,
    view: String,
}

impl ErrorCatcher {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            view: id.clone(),
            id,
            pattern: pattern.into(),
        }
    }

    pub fn view(mut self, key: impl Into<String>) -> Self {
        self.view = key.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn view_key(&self) -> &str {
        &self.view
    }
}

impl Routable for ErrorCatcher {
    fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// A server function callable through the action endpoint.
///
/// The id has the form `<module route>#<export name>`; it is registered
/// under the pattern `/<id>` so lookups share the path router.
#[derive(Clone)]
pub struct ServerAction {
    id: String,
    pattern: String,
    invoke: ActionFn,
}

impl ServerAction {
    pub fn new<F, Fut, O, E>(id: impl Into<String>, action: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Into<Value>,
        E: Into<Error>,
    {
        let id = id.into();
        let invoke: ActionFn = Arc::new(move |args| {
            let fut = action(args);
            async move { fut.await.map(Into::into).map_err(Into::into) }.boxed()
        });
        Self {
            pattern: action_path(&id),
            id,
            invoke,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn invoke(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value>> {
        (self.invoke)(args)
    }
}

impl Routable for ServerAction {
    fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Debug for ServerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerAction").field("id", &self.id).finish()
    }
}

/// Lookup key of an action id in the action router.
pub fn action_path(id: &str) -> String {
    format!("/{}", id.trim_start_matches('/'))
}

#[derive(Debug, Default)]
pub struct ManifestBuilder {
    routes: Vec<Route>,
    layouts: Vec<Layout>,
    catchers: Vec<ErrorCatcher>,
    actions: Vec<ServerAction>,
    case_insensitive: bool,
}

impl ManifestBuilder {
    pub fn layout(&mut self, layout: Layout) -> LayoutRef {
        self.layouts.push(layout);
        LayoutRef(self.layouts.len() - 1)
    }

    pub fn route(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    pub fn catcher(&mut self, catcher: ErrorCatcher) -> &mut Self {
        self.catchers.push(catcher);
        self
    }

    pub fn action(&mut self, action: ServerAction) -> &mut Self {
        self.actions.push(action);
        self
    }

    /// Match static route and catcher segments without regard to ASCII case.
    /// Action ids always match exactly.
    pub fn case_insensitive(&mut self, yes: bool) -> &mut Self {
        self.case_insensitive = yes;
        self
    }

    pub fn build(self) -> Result<Manifest, ManifestError> {
        let mut ids: Vec<&str> = Vec::new();
        for id in self
            .routes
            .iter()
            .map(Route::id)
            .chain(self.layouts.iter().map(Layout::id))
        {
            if ids.contains(&id) {
                return Err(ManifestError::DuplicateId(id.to_string()));
            }
            ids.push(id);
        }

        if let Some(route) = self
            .routes
            .iter()
            .find(|r| r.layouts.iter().any(|l| l.0 >= self.layouts.len()))
        {
            return Err(ManifestError::UnknownLayout {
                route: route.id.clone(),
            });
        }

        let manifest = Manifest {
            routes: Router::build(self.routes, self.case_insensitive)?,
            catchers: Router::build(self.catchers, self.case_insensitive)?,
            actions: Router::new(self.actions)?,
            layouts: self.layouts,
        };
        tracing::debug!(
            routes = manifest.routes.len(),
            layouts = manifest.layouts.len(),
            catchers = manifest.catchers.len(),
            actions = manifest.actions.len(),
            "manifest built"
        );
        Ok(manifest)
    }
}

/// The three registries a server is built from, plus the layout arena.
#[derive(Debug)]
pub struct Manifest {
    routes: Router<Route>,
    layouts: Vec<Layout>,
    catchers: Router<ErrorCatcher>,
    actions: Router<ServerAction>,
}

impl Manifest {
    pub fn builder() -> ManifestBuilder {
        ManifestBuilder::default()
    }

    pub fn routes(&self) -> &Router<Route> {
        &self.routes
    }

    pub fn catchers(&self) -> &Router<ErrorCatcher> {
        &self.catchers
    }

    pub fn actions(&self) -> &Router<ServerAction> {
        &self.actions
    }

    pub fn layout(&self, layout: LayoutRef) -> Option<&Layout> {
        self.layouts.get(layout.0)
    }

    /// Layouts applied to `route`, outermost first.
    pub fn layouts_of<'a>(&'a self, route: &'a Route) -> impl Iterator<Item = &'a Layout> + 'a {
        route.layouts.iter().filter_map(|l| self.layout(*l))
    }
}

static INSTALLED: OnceCell<Arc<Manifest>> = OnceCell::new();

/// Makes `manifest` the process-wide manifest. Succeeds once per process.
pub fn install(manifest: Manifest) -> Result<Arc<Manifest>, ManifestError> {
    let manifest = Arc::new(manifest);
    INSTALLED
        .set(manifest.clone())
        .map_err(|_| ManifestError::AlreadyInstalled)?;
    tracing::info!(routes = manifest.routes.len(), "manifest installed");
    Ok(manifest)
}

/// The process-wide manifest, or an error if none was installed yet.
pub fn installed() -> Result<Arc<Manifest>, ManifestError> {
    INSTALLED.get().cloned().ok_or(ManifestError::NotInstalled)
}
