// Positional action arguments as a form body: `0=<json>&1=<json>...`

use serde_json::Value as JsonValue;

use super::CodecError;
use crate::value::Value;

fn decode_component(raw: &str) -> Result<String, CodecError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|s| s.into_owned())
        .map_err(|err| CodecError::Form(err.to_string()))
}

/// Decodes `0=..&1=..` into positional arguments.
///
/// Values are JSON text; a value that is not valid JSON is taken as a plain
/// string so that ordinary HTML forms can post to actions too.
pub fn decode_form(body: &[u8]) -> Result<Vec<Value>, CodecError> {
    let body = std::str::from_utf8(body).map_err(|err| CodecError::Form(err.to_string()))?;

    let mut indexed: Vec<(usize, Value)> = Vec::new();
    for pair in body.split('&').filter(|p| !p.is_empty()) {
        let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key)?;
        let index: usize = key
            .parse()
            .map_err(|_| CodecError::Form(format!("argument key `{key}` is not an index")))?;
        let text = decode_component(raw)?;
        let json = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));
        indexed.push((index, Value::Json(json)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    indexed
        .into_iter()
        .enumerate()
        .map(|(expected, (index, value))| {
            if expected == index {
                Ok(value)
            } else {
                Err(CodecError::Form(format!("argument {expected} is missing")))
            }
        })
        .collect()
}

/// Encodes positional arguments the way [`decode_form`] reads them.
pub fn encode_form(args: &[JsonValue]) -> String {
    args.iter()
        .enumerate()
        .map(|(index, arg)| format!("{index}={}", urlencoding::encode(&arg.to_string())))
        .collect::<Vec<_>>()
        .join("&")
}
