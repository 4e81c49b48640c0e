// File: src/value.rs
// Purpose: Loader data values, including deferred values that settle after the shell

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::watch;

/// A value produced by a loader or an action.
///
/// Besides plain JSON, values may be `Undefined` (a loader that returned
/// nothing) or contain [`Deferred`] values that are still being computed
/// when the response starts streaming.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Json(JsonValue),
    Array(Vec<Value>),
    /// Ordered object; keys keep insertion order.
    Object(Vec<(String, Value)>),
    Deferred(Deferred),
}

impl Value {
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Serializes any `Serialize` type into a plain value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Value::Json)
    }

    /// Looks up a key in an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Value::Json(json) => Some(json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(JsonValue::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(JsonValue::as_i64)
    }

    pub fn as_deferred(&self) -> Option<&Deferred> {
        match self {
            Value::Deferred(deferred) => Some(deferred),
            _ => None,
        }
    }

    /// Waits for every deferred value inside and flattens the result to JSON.
    ///
    /// `Undefined` becomes `null`. The first rejection aborts the walk.
    pub fn into_json(self) -> BoxFuture<'static, Result<JsonValue, String>> {
        Box::pin(async move {
            match self {
                Value::Undefined => Ok(JsonValue::Null),
                Value::Json(json) => Ok(json),
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(item.into_json().await?);
                    }
                    Ok(JsonValue::Array(out))
                }
                Value::Object(entries) => {
                    let mut out = serde_json::Map::new();
                    for (key, item) in entries {
                        out.insert(key, item.into_json().await?);
                    }
                    Ok(JsonValue::Object(out))
                }
                Value::Deferred(deferred) => deferred.settled().await?.into_json().await,
            }
        })
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Value::Json(json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Json(JsonValue::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Json(JsonValue::String(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Json(JsonValue::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Json(JsonValue::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Json(JsonValue::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Json(JsonValue::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Json(JsonValue::Bool(b))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Deferred> for Value {
    fn from(deferred: Deferred) -> Self {
        Value::Deferred(deferred)
    }
}

/// Settlement state of a [`Deferred`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredState {
    Pending,
    Resolved(Value),
    Rejected(String),
}

impl DeferredState {
    pub fn is_pending(&self) -> bool {
        matches!(self, DeferredState::Pending)
    }
}

/// A value that settles later, observable without awaiting.
///
/// Views call [`state`](Deferred::state) to render a fallback while the
/// value is pending; the codec awaits [`settled`](Deferred::settled) to
/// stream the result once it is known. The first settlement wins; later
/// `resolve`/`reject` calls are ignored. Clones share identity.
#[derive(Clone)]
pub struct Deferred {
    state: Arc<watch::Sender<DeferredState>>,
}

impl Deferred {
    pub fn pending() -> Self {
        let (tx, _) = watch::channel(DeferredState::Pending);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn resolved(value: impl Into<Value>) -> Self {
        let deferred = Self::pending();
        deferred.resolve(value);
        deferred
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        let deferred = Self::pending();
        deferred.reject(message);
        deferred
    }

    /// Runs `fut` on the tokio runtime and settles with its outcome.
    pub fn spawn<F, T>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Into<Value> + Send + 'static,
    {
        let deferred = Self::pending();
        let handle = deferred.clone();
        tokio::spawn(async move {
            match fut.await {
                Ok(value) => handle.resolve(value),
                Err(err) => {
                    tracing::warn!(error = %err, "deferred value rejected");
                    handle.reject(err.to_string());
                }
            }
        });
        deferred
    }

    pub fn resolve(&self, value: impl Into<Value>) {
        self.settle(DeferredState::Resolved(value.into()));
    }

    pub fn reject(&self, message: impl Into<String>) {
        self.settle(DeferredState::Rejected(message.into()));
    }

    fn settle(&self, next: DeferredState) {
        self.state.send_if_modified(|state| {
            if state.is_pending() {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    /// Current state, read synchronously.
    pub fn state(&self) -> DeferredState {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Waits until the value settles.
    pub async fn settled(&self) -> Result<Value, String> {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|state| !state.is_pending()).await {
            Ok(state) => state.clone(),
            Err(_) => return Err("deferred value dropped".to_string()),
        };
        match state {
            DeferredState::Resolved(value) => Ok(value),
            DeferredState::Rejected(message) => Err(message),
            DeferredState::Pending => Err("deferred value still pending".to_string()),
        }
    }
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").field(&*self.state.borrow()).finish()
    }
}
