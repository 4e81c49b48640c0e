// File: src/render/maud_engine.rs
// Purpose: A RenderEngine backed by maud view functions registered by key

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use maud::{html, Markup, PreEscaped, DOCTYPE};

use super::{default_error_markup, MarkupStream, RenderEngine, RenderError, RenderRequest, ViewTree};
use crate::context::AppContext;
use crate::value::Value;

/// What a view sees: the whole context plus its own entry id.
pub struct ViewProps<'a> {
    pub context: &'a AppContext,
    pub id: &'a str,
}

impl<'a> ViewProps<'a> {
    /// This view's loader data.
    pub fn data(&self) -> Option<&'a Value> {
        self.context.data(self.id)
    }

    pub fn url(&self) -> &'a str {
        self.context.url()
    }
}

type PageFn = Arc<dyn Fn(&ViewProps<'_>) -> Markup + Send + Sync>;
type LayoutFn = Arc<dyn Fn(&ViewProps<'_>, Markup) -> Markup + Send + Sync>;
const DOCUMENT_END: &str = "</body></html>";

type ErrorFn = Arc<dyn Fn(&AppContext) -> Markup + Send + Sync>;

/// Renders pages, layouts and error views from maud functions.
///
/// The document is produced in one piece, so the shell is the document
/// itself minus its closing `</body></html>`, which is written after any
/// resume scripts. Deferred values are visible to views through
/// [`Deferred::state`](crate::value::Deferred::state) and can be rendered as
/// a fallback while pending.
#[derive(Clone, Default)]
pub struct MaudEngine {
    title: String,
    pages: HashMap<String, PageFn>,
    layouts: HashMap<String, LayoutFn>,
    errors: HashMap<String, ErrorFn>,
}

impl MaudEngine {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn page<F>(mut self, key: impl Into<String>, view: F) -> Self
    where
        F: Fn(&ViewProps<'_>) -> Markup + Send + Sync + 'static,
    {
        self.pages.insert(key.into(), Arc::new(view));
        self
    }

    pub fn layout<F>(mut self, key: impl Into<String>, view: F) -> Self
    where
        F: Fn(&ViewProps<'_>, Markup) -> Markup + Send + Sync + 'static,
    {
        self.layouts.insert(key.into(), Arc::new(view));
        self
    }

    pub fn error_view<F>(mut self, key: impl Into<String>, view: F) -> Self
    where
        F: Fn(&AppContext) -> Markup + Send + Sync + 'static,
    {
        self.errors.insert(key.into(), Arc::new(view));
        self
    }

    fn render_tree(&self, tree: &ViewTree, context: &AppContext) -> Result<Markup, RenderError> {
        match tree {
            ViewTree::View { id, view } => {
                let page = self
                    .pages
                    .get(view)
                    .ok_or_else(|| RenderError::MissingView(view.clone()))?;
                Ok(page(&ViewProps { context, id }))
            }
            ViewTree::Layout { id, view, child } => {
                let layout = self
                    .layouts
                    .get(view)
                    .ok_or_else(|| RenderError::MissingView(view.clone()))?;
                let inner = self.render_tree(child, context)?;
                Ok(layout(&ViewProps { context, id }, inner))
            }
            ViewTree::Error { view: Some(view) } => {
                let error = self
                    .errors
                    .get(view)
                    .ok_or_else(|| RenderError::MissingView(view.clone()))?;
                Ok(error(context))
            }
            ViewTree::Error { view: None } => {
                let (status, message) = context
                    .error()
                    .map(|e| (e.status, e.message.clone().unwrap_or_default()))
                    .unwrap_or((500, String::new()));
                Ok(default_error_markup(status, &message))
            }
        }
    }

    fn document(&self, request: &RenderRequest) -> Result<String, RenderError> {
        let body = self.render_tree(&request.tree, &request.context)?;
        let markup = html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    meta name="viewport" content="width=device-width, initial-scale=1";
                    title { (self.title) }
                }
                body {
                    (body)
                    (PreEscaped(request.bootstrap()))
                }
            }
        };
        let mut html = markup.into_string();
        if html.ends_with(DOCUMENT_END) {
            html.truncate(html.len() - DOCUMENT_END.len());
        }
        Ok(html)
    }
}

impl RenderEngine for MaudEngine {
    fn render_to_stream(&self, request: RenderRequest) -> MarkupStream {
        stream::once(std::future::ready(self.document(&request))).boxed()
    }

    fn document_end(&self) -> &str {
        DOCUMENT_END
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ErrorInfo, LoaderData};
    use crate::render::abort_pair;

    fn request(tree: ViewTree, context: AppContext) -> RenderRequest {
        let (_, abort) = abort_pair();
        RenderRequest {
            tree,
            context,
            shell: "{\"t\":\"u\"}".into(),
            has_resume: false,
            writer_id: 1,
            abort,
        }
    }

    fn engine() -> MaudEngine {
        MaudEngine::new("test")
            .layout("root", |_, inner| html! { div.root { (inner) } })
            .page("home", |props| {
                let name = props.data().and_then(Value::as_str).unwrap_or("nobody");
                html! { p { "hello " (name) } }
            })
    }

    #[test]
    fn layouts_wrap_pages_and_the_shell_is_embedded() {
        let mut data = LoaderData::new();
        data.insert("home", Value::from("ada"));
        let tree = ViewTree::Layout {
            id: "root".into(),
            view: "root".into(),
            child: Box::new(ViewTree::View {
                id: "home".into(),
                view: "home".into(),
            }),
        };
        let html = engine().document(&request(tree, AppContext::new("/", data))).unwrap();
        assert!(html.contains(r#"<div class="root"><p>hello ada</p></div>"#));
        assert!(html.contains(r#"id="__lumen_data""#));
        assert!(!html.contains("</body>"));
    }

    #[test]
    fn unknown_view_is_an_error() {
        let tree = ViewTree::View {
            id: "x".into(),
            view: "missing".into(),
        };
        let result = engine().document(&request(tree, AppContext::default()));
        assert!(matches!(result, Err(RenderError::MissingView(v)) if v == "missing"));
    }

    #[test]
    fn default_error_view_shows_the_status() {
        let context = AppContext::for_error(
            "/nope",
            ErrorInfo {
                status: 404,
                message: Some("Not Found".into()),
            },
        );
        let html = engine()
            .document(&request(ViewTree::Error { view: None }, context))
            .unwrap();
        assert!(html.contains("404 Not Found"));
    }
}
