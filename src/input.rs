//! Parsing of the status document received on stdin.
//!
//! Every field is optional: the host feeds whatever it knows about the
//! session, and missing values fall back to display defaults.

use serde_json::Value;
use tracing::debug;

use crate::numeric;

/// Display placeholder for missing string fields.
pub const UNKNOWN_VALUE: &str = "?";

// Byte caps for clipped string fields. Session id and paths must fit the
// cache record's NUL-padded buffers, so each cap is one below the
// corresponding buffer size and a clipped identity round-trips unchanged.
pub const MODEL_NAME_MAX: usize = 63;
pub const MODEL_ID_MAX: usize = 127;
pub const PATH_MAX: usize = 255;
pub const VERSION_MAX: usize = 31;
pub const SESSION_ID_MAX: usize = 127;
pub const TRANSCRIPT_PATH_MAX: usize = 511;

/// Walk a fixed sequence of object keys from `value`.
pub fn find_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(*key)?;
    }
    Some(cursor)
}

pub fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    find_path(value, path)?.as_str().map(|s| s.to_string())
}

pub fn f64_at(value: &Value, path: &[&str]) -> Option<f64> {
    find_path(value, path)?.as_f64()
}

pub fn u32_at(value: &Value, path: &[&str]) -> Option<u32> {
    let number = find_path(value, path)?.as_f64()?;
    numeric::f64_to_u32(number).ok()
}

pub fn bool_at(value: &Value, path: &[&str]) -> Option<bool> {
    find_path(value, path)?.as_bool()
}

/// Session fields extracted from the stdin document.
#[derive(Debug, Clone, Default)]
pub struct StatusInput {
    pub model_name: Option<String>,
    pub model_id: Option<String>,
    pub cwd: Option<String>,
    pub project_dir: Option<String>,
    pub version: Option<String>,
    pub cost_usd: Option<f64>,
    pub duration_ms: u32,
    pub api_ms: u32,
    pub lines_added: u32,
    pub lines_removed: u32,
    pub exceeds_200k_tokens: bool,
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
}

impl StatusInput {
    pub fn from_json(root: &Value) -> Self {
        let status = Self {
            model_name: string_field(root, &["model", "display_name"], MODEL_NAME_MAX),
            model_id: string_field(root, &["model", "id"], MODEL_ID_MAX),
            cwd: string_field(root, &["cwd"], PATH_MAX),
            project_dir: string_field(root, &["workspace", "project_dir"], PATH_MAX),
            version: string_field(root, &["version"], VERSION_MAX),
            cost_usd: f64_at(root, &["cost", "total_cost_usd"]),
            duration_ms: u32_at(root, &["cost", "total_duration_ms"]).unwrap_or(0),
            api_ms: u32_at(root, &["cost", "total_api_duration_ms"]).unwrap_or(0),
            lines_added: u32_at(root, &["cost", "total_lines_added"]).unwrap_or(0),
            lines_removed: u32_at(root, &["cost", "total_lines_removed"]).unwrap_or(0),
            exceeds_200k_tokens: bool_at(root, &["exceeds_200k_tokens"]).unwrap_or(false),
            session_id: string_field(root, &["session_id"], SESSION_ID_MAX),
            transcript_path: string_field(root, &["transcript_path"], TRANSCRIPT_PATH_MAX),
        };
        debug!(
            model = status.model_name.as_deref().unwrap_or(UNKNOWN_VALUE),
            version = status.version.as_deref().unwrap_or(UNKNOWN_VALUE),
            "loaded status fields"
        );
        status
    }

    pub fn model_name_display(&self) -> &str {
        self.model_name.as_deref().unwrap_or(UNKNOWN_VALUE)
    }

    pub fn model_id_display(&self) -> &str {
        self.model_id.as_deref().unwrap_or(UNKNOWN_VALUE)
    }

    pub fn version_display(&self) -> &str {
        self.version.as_deref().unwrap_or(UNKNOWN_VALUE)
    }

    pub fn cost_display(&self) -> f64 {
        self.cost_usd.filter(|cost| cost.is_finite()).unwrap_or(0.0)
    }
}

fn string_field(root: &Value, path: &[&str], max_bytes: usize) -> Option<String> {
    let raw = str_at(root, path)?;
    Some(sanitize_whitespace(clip(&raw, max_bytes)))
}

/// Replace embedded newlines, carriage returns, and tabs with spaces so a
/// field can never break the single-line status output.
fn sanitize_whitespace(text: String) -> String {
    if !text.contains(['\n', '\r', '\t']) {
        return text;
    }
    text.chars()
        .map(|ch| match ch {
            '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .collect()
}

/// Silently truncate to at most `max_bytes`, never splitting a codepoint.
fn clip(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
