// File: src/views.rs
// Purpose: Maud views for the reference todo app

use lumen::value::DeferredState;
use lumen::{html, AppContext, Markup, MaudEngine, Value, ViewProps};
use serde_json::Value as JsonValue;

pub fn engine() -> MaudEngine {
    MaudEngine::new("Lumen todos")
        .layout("root", root_layout)
        .layout("todos-layout", todos_layout)
        .page("home", home_page)
        .page("todos", todos_page)
        .page("todo", todo_page)
        .page("docs", docs_page)
        .error_view("root-error", root_error)
        .error_view("todos-error", todos_error)
}

/// A plain JSON field of loader data, whether the loader returned JSON or
/// an object of values.
fn field<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a JsonValue> {
    match value? {
        Value::Json(json) => json.get(key),
        other => other.get(key).and_then(Value::as_json),
    }
}

fn root_layout(props: &ViewProps<'_>, inner: Markup) -> Markup {
    html! {
        header {
            nav {
                a href="/" { "Home" }
                " "
                a href="/todos" { "Todos" }
                " "
                a href="/docs/getting-started" { "Docs" }
            }
        }
        main data-path=(props.url()) { (inner) }
    }
}

fn todos_layout(props: &ViewProps<'_>, inner: Markup) -> Markup {
    let count = field(props.data(), "count").and_then(JsonValue::as_i64).unwrap_or(0);
    html! {
        section.todos {
            h2 { "Todos (" (count) ")" }
            (inner)
        }
    }
}

fn home_page(props: &ViewProps<'_>) -> Markup {
    let title = field(props.data(), "title").and_then(JsonValue::as_str).unwrap_or("Lumen");
    html! {
        h1 { (title) }
        p { "Nested layouts, concurrent loaders and streamed data." }
    }
}

fn todos_page(props: &ViewProps<'_>) -> Markup {
    let todos = field(props.data(), "todos")
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default();
    let stats = props
        .data()
        .and_then(|data| data.get("stats"))
        .and_then(Value::as_deferred);
    html! {
        ul {
            @for todo in &todos {
                li.done[todo["done"].as_bool().unwrap_or(false)] {
                    a href={ "/todos/" (todo["id"].as_u64().unwrap_or(0)) } { (todo["title"].as_str().unwrap_or("")) }
                }
            }
        }
        p.stats {
            @match stats.map(|d| d.state()) {
                Some(DeferredState::Resolved(value)) => {
                    (field(Some(&value), "done").and_then(JsonValue::as_i64).unwrap_or(0)) " done, "
                    (field(Some(&value), "open").and_then(JsonValue::as_i64).unwrap_or(0)) " open"
                }
                Some(DeferredState::Rejected(_)) => { "Stats unavailable" }
                _ => { "Counting..." }
            }
        }
    }
}

fn todo_page(props: &ViewProps<'_>) -> Markup {
    let title = field(props.data(), "title").and_then(JsonValue::as_str).unwrap_or("");
    let done = field(props.data(), "done")
        .and_then(JsonValue::as_bool)
        .unwrap_or(false);
    html! {
        article {
            h3 { (title) }
            p { @if done { "Done" } @else { "Open" } }
        }
    }
}

fn docs_page(props: &ViewProps<'_>) -> Markup {
    let path = field(props.data(), "path").and_then(JsonValue::as_str).unwrap_or("");
    html! {
        h1 { "Docs" }
        p { "Reading " code { (path) } }
    }
}

fn error_parts(context: &AppContext) -> (u16, String) {
    context
        .error()
        .map(|e| (e.status, e.message.clone().unwrap_or_default()))
        .unwrap_or((500, String::new()))
}

fn root_error(context: &AppContext) -> Markup {
    let (status, message) = error_parts(context);
    html! {
        h1 { "Something went wrong (" (status) ")" }
        @if !message.is_empty() { p { (message) } }
        p { a href="/" { "Go Home" } }
    }
}

fn todos_error(context: &AppContext) -> Markup {
    let (status, _) = error_parts(context);
    html! {
        section.todos {
            @if status == 404 {
                p { "That todo does not exist." }
            } @else {
                p { "Could not load todos (" (status) ")." }
            }
            a href="/todos" { "Back to the list" }
        }
    }
}
