use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::KiraError;

/// A per-sample result document as produced by the pipeline.
pub type RawDocument = Map<String, Value>;

pub const RESULT_DOCUMENT: &str = "_parseresults.json";
pub const LOG_DOCUMENT: &str = "_logging.json";

/// Reads a result document. A missing file yields an empty document.
pub fn load_result_document(path: &Path) -> Result<RawDocument, KiraError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "result document not found");
            return Ok(RawDocument::new());
        }
        Err(err) => {
            return Err(KiraError::Filesystem(format!(
                "read {}: {err}",
                path.display()
            )));
        }
    };
    parse_result_document(&content).map_err(|message| KiraError::Document {
        path: path.to_path_buf(),
        message,
    })
}

pub fn parse_result_document(content: &str) -> Result<RawDocument, String> {
    if content.trim().is_empty() {
        return Ok(RawDocument::new());
    }
    match serde_json::from_str::<Value>(content).map_err(|err| err.to_string())? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(RawDocument::new()),
        other => Err(format!("expected a JSON object, found {}", kind_of(&other))),
    }
}

/// Title of the first failure record in a pipeline log, if any.
pub fn failure_title(path: &Path) -> Result<Option<String>, KiraError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(KiraError::Filesystem(format!(
                "read {}: {err}",
                path.display()
            )));
        }
    };
    Ok(scan_failure_title(&content))
}

pub fn scan_failure_title(content: &str) -> Option<String> {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    let pattern = TITLE.get_or_init(|| {
        Regex::new(r#""title"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("title pattern is valid")
    });
    pattern
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|title| title.as_str().replace("\\\"", "\"").trim().to_string())
        .filter(|title| !title.is_empty())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
