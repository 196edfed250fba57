//! Resource routing for the list endpoint
//!
//! Maps `(method, path remainder)` to an operation on a freshly loaded
//! [`TaskList`]. The remainder is whatever follows the `/todo` prefix:
//!
//! | remainder | method  | operation                      |
//! |-----------|---------|--------------------------------|
//! | empty     | GET     | list all                       |
//! | empty     | POST    | add, save                      |
//! | `<id>`    | GET     | get one                        |
//! | `<id>`    | PATCH   | complete (needs `?complete`)   |
//! | `<id>`    | DELETE  | delete, save                   |
//!
//! IDs are validated against the loaded list before the method is looked at,
//! so a bad ID wins over a bad method.

use std::path::Path;

use axum::body::Bytes;
use axum::http::Method;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::task::{TaskItem, TaskList};

/// Path prefix of the list resource
pub const LIST_PREFIX: &str = "/todo";

/// Strip the list prefix from a request path
///
/// `/todo` and `/todo/` give an empty remainder, `/todo/3` gives `3`, and any
/// other path is not part of the list resource.
pub fn list_remainder(path: &str) -> Option<&str> {
    if path == LIST_PREFIX {
        return Some("");
    }
    path.strip_prefix(LIST_PREFIX)?.strip_prefix('/')
}

/// Percent-decode a request path
///
/// Fails on a truncated or non-hex escape and on bytes that do not decode to
/// UTF-8.
pub fn decode_path(raw: &str) -> Result<String> {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|pair| pair.iter().all(u8::is_ascii_hexdigit))
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| Error::InvalidData(format!("Invalid escape in path {raw:?}")))?;
            decoded.push(hex);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded)
        .map_err(|_| Error::InvalidData(format!("Path {raw:?} is not valid UTF-8")))
}

/// Everything the router needs from one HTTP request
#[derive(Debug, Clone)]
pub struct ListRequest {
    pub method: Method,
    pub remainder: String,
    /// Whether the query string carried a `complete` key
    pub complete: bool,
    pub body: Bytes,
}

/// Result of a successful list operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Listing(Vec<TaskItem>),
    Created,
    Completed,
    Deleted,
}

/// Task text from a POST body
///
/// Only the first JSON value is read and anything after it is ignored. A
/// `null` body or a missing `task` field gives an empty task. The field name
/// falls back to a case-insensitive match when there is no exact `task` key.
fn decode_new_task(body: &[u8]) -> Result<String> {
    let invalid = |e: serde_json::Error| Error::InvalidData(format!("Invalid JSON: {e}"));

    let mut values =
        serde_json::Deserializer::from_slice(body).into_iter::<Option<Map<String, Value>>>();
    let fields = match values.next() {
        Some(value) => value.map_err(invalid)?.unwrap_or_default(),
        None => return Err(Error::InvalidData("Invalid JSON: empty body".to_string())),
    };

    let task = fields.get("task").or_else(|| {
        fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("task"))
            .map(|(_, value)| value)
    });

    match task {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(Error::InvalidData(format!(
            "Invalid JSON: task must be a string, got {other}"
        ))),
    }
}

/// Parse and bounds-check a positional ID
pub fn validate_id(raw: &str, list: &TaskList) -> Result<usize> {
    let id: i64 = raw
        .parse()
        .map_err(|e| Error::InvalidData(format!("Invalid ID: {raw:?}: {e}")))?;

    if id < 1 {
        return Err(Error::InvalidData("Invalid ID: less than one".to_string()));
    }

    let id = usize::try_from(id).map_err(|_| Error::NotFound(format!("ID {id} not found")))?;
    if id > list.len() {
        return Err(Error::NotFound(format!("ID {id} not found")));
    }

    Ok(id)
}

/// Load the list at `path` and apply `request` to it
///
/// Must run inside the list's critical section.
pub fn handle(path: &Path, request: &ListRequest) -> Result<Outcome> {
    let mut list = TaskList::new();
    list.load(path)?;
    dispatch(&mut list, request, path)
}

/// Apply `request` to an already loaded list, saving to `path` on mutation
pub fn dispatch(list: &mut TaskList, request: &ListRequest, path: &Path) -> Result<Outcome> {
    if request.remainder.is_empty() {
        return match request.method {
            Method::GET => Ok(Outcome::Listing(list.get_all().to_vec())),
            Method::POST => {
                let task = decode_new_task(&request.body)?;
                list.add(task);
                list.save(path)?;
                Ok(Outcome::Created)
            }
            ref other => Err(Error::MethodNotAllowed(other.to_string())),
        };
    }

    let id = validate_id(&request.remainder, list)?;

    match request.method {
        Method::GET => Ok(Outcome::Listing(vec![list.get_one(id).clone()])),
        Method::PATCH => {
            if !request.complete {
                return Err(Error::InvalidData(
                    "Missing query param 'complete'".to_string(),
                ));
            }
            list.complete(id);
            list.save(path)?;
            Ok(Outcome::Completed)
        }
        Method::DELETE => {
            list.delete(id);
            list.save(path)?;
            Ok(Outcome::Deleted)
        }
        ref other => Err(Error::MethodNotAllowed(other.to_string())),
    }
}
