// File: src/app.rs
// Purpose: Routes, layouts, loaders and actions of the reference todo app

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lumen::manifest::ManifestError;
use lumen::{
    json, not_found, redirect, Deferred, Error, ErrorCatcher, HttpError, Layout, LoaderArgs, Manifest,
    Route, ServerAction, StatusCode, Value,
};
use serde::{Deserialize, Serialize};
use serde_json::json as j;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    pub done: bool,
}

/// In-memory todo list shared by loaders and actions.
#[derive(Debug, Clone, Default)]
pub struct TodoStore {
    todos: Arc<RwLock<Vec<Todo>>>,
    next_id: Arc<AtomicU64>,
}

impl TodoStore {
    pub fn seeded() -> Self {
        let todos = vec![
            Todo {
                id: 1,
                title: "Write the router".to_string(),
                done: true,
            },
            Todo {
                id: 2,
                title: "Stream deferred data".to_string(),
                done: false,
            },
        ];
        Self {
            next_id: Arc::new(AtomicU64::new(todos.len() as u64 + 1)),
            todos: Arc::new(RwLock::new(todos)),
        }
    }

    pub async fn list(&self) -> Vec<Todo> {
        self.todos.read().await.clone()
    }

    pub async fn get(&self, id: u64) -> Option<Todo> {
        self.todos.read().await.iter().find(|t| t.id == id).cloned()
    }

    pub async fn create(&self, title: String) -> Todo {
        let todo = Todo {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            title,
            done: false,
        };
        self.todos.write().await.push(todo.clone());
        todo
    }

    /// Counts done and open items; slow on purpose so the page streams it.
    async fn stats(&self) -> Value {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let todos = self.todos.read().await;
        let done = todos.iter().filter(|t| t.done).count();
        Value::from(j!({ "done": done, "open": todos.len() - done }))
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, Error> {
    Value::from_serialize(value).map_err(|err| Error::Internal(err.into()))
}

pub fn manifest(store: TodoStore, case_insensitive: bool) -> Result<Manifest, ManifestError> {
    let mut builder = Manifest::builder();
    builder.case_insensitive(case_insensitive);

    let root = builder.layout(Layout::new("root", "/").loader(|args: LoaderArgs| async move {
        Ok::<_, Error>(j!({ "path": args.request.uri.path() }))
    }));

    let todos_store = store.clone();
    let todos_layout = builder.layout(Layout::new("todos-layout", "/todos").loader(move |_| {
        let store = todos_store.clone();
        async move { Ok::<_, Error>(j!({ "count": store.list().await.len() })) }
    }));

    let list_store = store.clone();
    let item_store = store.clone();
    let action_store = store;

    builder
        .route(
            Route::new("home", "/")
                .layouts([root])
                .loader(|_| async { Ok::<_, Error>(j!({ "title": "Lumen todos" })) }),
        )
        .route(
            Route::new("todos", "/todos")
                .layouts([root, todos_layout])
                .loader(move |_| {
                    let store = list_store.clone();
                    async move {
                        let todos = to_value(&store.list().await)?;
                        let stats_store = store.clone();
                        let stats = Deferred::spawn(async move { Ok(stats_store.stats().await) });
                        Ok::<_, Error>(Value::object([("todos", todos), ("stats", stats.into())]))
                    }
                }),
        )
        .route(
            Route::new("todo", "/todos/:id")
                .layouts([root, todos_layout])
                .loader(move |args: LoaderArgs| {
                    let store = item_store.clone();
                    async move {
                        let id = args
                            .params
                            .get_str("id")
                            .and_then(|raw| raw.parse::<u64>().ok())
                            .ok_or_else(not_found)?;
                        let todo = store.get(id).await.ok_or_else(not_found)?;
                        Ok::<_, Error>(json(to_value(&todo)?).header(
                            axum::http::header::CACHE_CONTROL,
                            axum::http::HeaderValue::from_static("private, max-age=5"),
                        ))
                    }
                }),
        )
        .route(
            Route::new("old-todos", "/old-todos")
                .loader(|_| async { Ok::<_, Error>(redirect("/todos")) }),
        )
        .route(
            Route::new("docs", "/docs/*path")
                .layouts([root])
                .loader(|args: LoaderArgs| async move {
                    let path = args.params.get_all("path").unwrap_or_default().join("/");
                    if path.starts_with("private") {
                        return Err(Error::from(HttpError::new(StatusCode::FORBIDDEN, "private docs")));
                    }
                    Ok::<_, Error>(j!({ "path": path }))
                }),
        )
        .catcher(ErrorCatcher::new("root-error", "/*rest?"))
        .catcher(ErrorCatcher::new("todos-error", "/todos/*rest"))
        .action(ServerAction::new("actions#add", |args: Vec<Value>| async move {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok::<_, Error>(Value::from(sum))
        }))
        .action(ServerAction::new("todos#create", move |args: Vec<Value>| {
            let store = action_store.clone();
            async move {
                let title = args
                    .first()
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| HttpError::new(StatusCode::BAD_REQUEST, "title is required"))?
                    .to_string();
                let todo = store.create(title).await;
                tracing::info!(id = todo.id, "todo created");
                to_value(&todo)
            }
        }));

    builder.build()
}
