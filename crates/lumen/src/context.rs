// File: src/context.rs
// Purpose: The per-request snapshot handed to views and transferred to the client

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::codec::CodecError;
use crate::value::Value;

/// Status and optional message of an error being rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Loader results keyed by route or layout id, in resolution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoaderData {
    entries: Vec<(String, Value)>,
}

impl LoaderData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `id`.
    pub fn insert(&mut self, id: impl Into<String>, value: Value) {
        let id = id.into();
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((id, value)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every deferred entry and flattens the map to JSON.
    pub async fn into_json(self) -> Result<JsonValue, String> {
        Value::Object(self.entries).into_json().await
    }
}

impl FromIterator<(String, Value)> for LoaderData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut data = LoaderData::new();
        for (id, value) in iter {
            data.insert(id, value);
        }
        data
    }
}

/// Immutable snapshot of loader data, URL and error for one request or
/// navigation. Replaced wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppContext {
    loader_data: LoaderData,
    url: String,
    error: Option<ErrorInfo>,
}

impl AppContext {
    pub fn new(url: impl Into<String>, loader_data: LoaderData) -> Self {
        Self {
            loader_data,
            url: url.into(),
            error: None,
        }
    }

    pub fn for_error(url: impl Into<String>, error: ErrorInfo) -> Self {
        Self {
            loader_data: LoaderData::new(),
            url: url.into(),
            error: Some(error),
        }
    }

    pub fn loader_data(&self) -> &LoaderData {
        &self.loader_data
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Data produced by the loader of route or layout `id`.
    pub fn data(&self, id: &str) -> Option<&Value> {
        self.loader_data.get(id)
    }

    /// The wire shape: `{ loaderData, url, error? }`.
    pub fn to_value(&self) -> Value {
        let mut fields = vec![
            (
                "loaderData".to_string(),
                Value::Object(self.loader_data.entries.clone()),
            ),
            ("url".to_string(), Value::from(self.url.clone())),
        ];
        if let Some(error) = &self.error {
            let info = serde_json::to_value(error).unwrap_or(JsonValue::Null);
            fields.push(("error".to_string(), Value::Json(info)));
        }
        Value::Object(fields)
    }

    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        let Value::Object(fields) = value else {
            return Err(CodecError::Malformed("app context must be an object".into()));
        };

        let mut context = AppContext::default();
        for (key, field) in fields {
            match (key.as_str(), field) {
                ("loaderData", Value::Object(entries)) => {
                    context.loader_data = entries.into_iter().collect();
                }
                ("loaderData", Value::Json(JsonValue::Object(map))) => {
                    context.loader_data = map.into_iter().map(|(k, v)| (k, Value::Json(v))).collect();
                }
                ("url", Value::Json(JsonValue::String(url))) => context.url = url,
                ("error", Value::Json(JsonValue::Null) | Value::Undefined) => {}
                ("error", Value::Json(info)) => context.error = Some(serde_json::from_value(info)?),
                (other, _) => {
                    return Err(CodecError::Malformed(format!(
                        "unexpected app context field `{other}`"
                    )))
                }
            }
        }
        Ok(context)
    }
}
