//! Token accounting over JSONL transcript files.
//!
//! A transcript is a sequence of JSON lines; entries that carry usage data
//! hold it under `message.usage`. Session totals accumulate every usage
//! object in the file, while the context count reflects only the last
//! assistant turn. Accumulation is strict: a value that cannot be converted
//! or summed aborts the scan so a corrupt transcript never yields a
//! plausible-looking wrong total. Malformed lines, by contrast, are simply
//! skipped, since transcripts are appended to while we read them.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::StatusError;
use crate::input::{find_path, str_at};
use crate::numeric;

/// Standard 200k context window limit.
pub const DEFAULT_TOKEN_LIMIT: u64 = 200_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
    pub cache_creation: u64,
    pub cache_read: u64,
    pub total: u64,
}

impl TokenCounts {
    /// Sum of the four categories, checked at every step.
    pub fn calculate_total(&self) -> Result<u64, StatusError> {
        let sum = numeric::add_u64(self.input, self.output)?;
        let sum = numeric::add_u64(sum, self.cache_creation)?;
        numeric::add_u64(sum, self.cache_read)
    }

    pub fn is_zero(&self) -> bool {
        self.input == 0 && self.output == 0 && self.cache_creation == 0 && self.cache_read == 0
    }
}

/// Both aggregates from one pass over the transcript.
#[derive(Debug, Default)]
pub struct TranscriptTotals {
    pub session: Option<TokenCounts>,
    pub context: Option<u64>,
}

/// Cache counters appear under two naming conventions; the raw name wins
/// when both are present.
fn cache_field<'a>(usage: &'a Value, raw: &str, aggregated: &str) -> Option<&'a Value> {
    usage.get(raw).or_else(|| usage.get(aggregated))
}

fn add_field(counter: &mut u64, node: Option<&Value>) -> Result<(), StatusError> {
    if let Some(number) = node.and_then(Value::as_f64) {
        let value = numeric::f64_to_u64(number)?;
        *counter = numeric::add_u64(*counter, value)?;
    }
    Ok(())
}

fn accumulate_usage(usage: &Value, tokens: &mut TokenCounts) -> Result<(), StatusError> {
    add_field(&mut tokens.input, usage.get("input_tokens"))?;
    add_field(&mut tokens.output, usage.get("output_tokens"))?;
    add_field(
        &mut tokens.cache_creation,
        cache_field(usage, "cache_creation_input_tokens", "cache_creation_tokens"),
    )?;
    add_field(
        &mut tokens.cache_read,
        cache_field(usage, "cache_read_input_tokens", "cache_read_tokens"),
    )?;
    Ok(())
}

/// Lenient context sum over one entry: input + cache creation + cache read.
/// Fields that fail conversion or would overflow are skipped.
fn context_sum(entry: &Value) -> u64 {
    let Some(usage) = find_path(entry, &["message", "usage"]).filter(|u| u.is_object()) else {
        return 0;
    };
    let mut total = 0u64;
    let fields = [
        usage.get("input_tokens"),
        cache_field(usage, "cache_creation_input_tokens", "cache_creation_tokens"),
        cache_field(usage, "cache_read_input_tokens", "cache_read_tokens"),
    ];
    for node in fields {
        if let Some(number) = node.and_then(Value::as_f64)
            && let Ok(value) = numeric::f64_to_u64(number)
            && let Ok(sum) = numeric::add_u64(total, value)
        {
            total = sum;
        }
    }
    total
}

fn open_transcript(path: &Path) -> Result<BufReader<File>, StatusError> {
    let file = File::open(path).map_err(|_| StatusError::FileNotFound)?;
    Ok(BufReader::new(file))
}

fn read_raw_line(reader: &mut BufReader<File>, line: &mut Vec<u8>) -> Result<usize, StatusError> {
    line.clear();
    reader.read_until(b'\n', line).map_err(StatusError::Io)
}

/// Accumulate session totals across every usage object in the transcript.
pub fn parse_session_tokens(path: &Path) -> Result<TokenCounts, StatusError> {
    debug!(path = %path.display(), "parsing session tokens");
    let mut reader = open_transcript(path)?;
    let mut tokens = TokenCounts::default();
    let mut line = Vec::new();

    while read_raw_line(&mut reader, &mut line)? > 0 {
        let Ok(entry) = serde_json::from_slice::<Value>(&line) else {
            continue;
        };
        if let Some(usage) = find_path(&entry, &["message", "usage"])
            && usage.is_object()
        {
            accumulate_usage(usage, &mut tokens)?;
        }
    }

    tokens.total = tokens.calculate_total()?;
    debug!(total = tokens.total, "session tokens parsed");
    Ok(tokens)
}

/// Context tokens from the last assistant entry in the transcript.
///
/// Returns 0 when no assistant entry exists. The winning line is retained
/// as raw text and re-parsed once at the end.
pub fn count_context_tokens(path: &Path) -> Result<u64, StatusError> {
    debug!(path = %path.display(), "counting context tokens");
    let mut reader = open_transcript(path)?;
    let mut line = Vec::new();
    let mut last_assistant: Option<Vec<u8>> = None;

    while read_raw_line(&mut reader, &mut line)? > 0 {
        let Ok(entry) = serde_json::from_slice::<Value>(&line) else {
            continue;
        };
        if str_at(&entry, &["message", "role"]).as_deref() == Some("assistant") {
            last_assistant = Some(line.clone());
        }
    }

    let Some(raw) = last_assistant else {
        debug!("no assistant entry in transcript");
        return Ok(0);
    };
    let Ok(entry) = serde_json::from_slice::<Value>(&raw) else {
        return Ok(0);
    };
    Ok(context_sum(&entry))
}

/// Compute session totals and the context count in a single I/O pass.
///
/// The context value is recomputed at every assistant entry, so the result
/// always matches what `count_context_tokens` would report for the same
/// file.
pub fn parse_tokens_single_pass(
    path: &Path,
    want_session: bool,
    want_context: bool,
) -> Result<TranscriptTotals, StatusError> {
    let mut totals = TranscriptTotals::default();
    if !want_session && !want_context {
        return Ok(totals);
    }

    debug!(path = %path.display(), "single-pass token parse");
    let mut reader = open_transcript(path)?;
    let mut tokens = TokenCounts::default();
    let mut context = 0u64;
    let mut line = Vec::new();

    while read_raw_line(&mut reader, &mut line)? > 0 {
        let Ok(entry) = serde_json::from_slice::<Value>(&line) else {
            continue;
        };
        if want_session
            && let Some(usage) = find_path(&entry, &["message", "usage"])
            && usage.is_object()
        {
            accumulate_usage(usage, &mut tokens)?;
        }
        if want_context && str_at(&entry, &["message", "role"]).as_deref() == Some("assistant") {
            context = context_sum(&entry);
        }
    }

    if want_session {
        tokens.total = tokens.calculate_total()?;
        totals.session = Some(tokens);
    }
    if want_context {
        totals.context = Some(context);
    }
    Ok(totals)
}

/// Human-readable token count with one decimal digit and a K/M/G suffix.
pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000_000 {
        format!("{:.1}G", tokens as f64 / 1_000_000_000.0)
    } else if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}K", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}

/// Integer percentage of `tokens` against `limit`.
///
/// A zero limit yields 0. When the intermediate product overflows, the
/// result saturates to 100 when clamped and `u32::MAX` otherwise.
pub fn calculate_percentage(tokens: u64, limit: u64, clamp: bool) -> u32 {
    if limit == 0 {
        return 0;
    }
    let Ok(product) = numeric::mul_u64(tokens, 100) else {
        return if clamp { 100 } else { u32::MAX };
    };
    let pct = product / limit;
    if clamp && pct > 100 {
        return 100;
    }
    pct.min(u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_transcript(content: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("session.jsonl");
        std::fs::write(&path, content).expect("write jsonl");
        (tmp, path)
    }

    #[test]
    fn accumulates_usage_across_lines() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"assistant","usage":{"input_tokens":100,"output_tokens":50,"cache_creation_input_tokens":20,"cache_read_input_tokens":10}}}
{"message":{"role":"assistant","usage":{"input_tokens":200,"output_tokens":80}}}"#,
        );
        let tokens = parse_session_tokens(&path).expect("parse");
        assert_eq!(tokens.input, 300);
        assert_eq!(tokens.output, 130);
        assert_eq!(tokens.cache_creation, 20);
        assert_eq!(tokens.cache_read, 10);
        assert_eq!(tokens.total, 460);
    }

    #[test]
    fn aggregated_cache_names_are_fallbacks() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"usage":{"cache_creation_tokens":7,"cache_read_tokens":3}}}
{"message":{"usage":{"cache_creation_input_tokens":5,"cache_creation_tokens":999}}}"#,
        );
        let tokens = parse_session_tokens(&path).expect("parse");
        assert_eq!(tokens.cache_creation, 12);
        assert_eq!(tokens.cache_read, 3);
    }

    #[test]
    fn malformed_and_blank_lines_are_skipped() {
        let (_tmp, path) = write_transcript(
            "not json at all\n\n{\"message\":{\"usage\":{\"input_tokens\":5}}}\n{\"truncated\":\n",
        );
        let tokens = parse_session_tokens(&path).expect("parse");
        assert_eq!(tokens.input, 5);
        assert_eq!(tokens.total, 5);
    }

    #[test]
    fn entries_without_usage_are_ignored() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"user","content":"hi"}}
{"type":"summary"}
{"message":{"usage":{"output_tokens":9}}}"#,
        );
        let tokens = parse_session_tokens(&path).expect("parse");
        assert_eq!(tokens.output, 9);
    }

    #[test]
    fn negative_counter_aborts_the_scan() {
        let (_tmp, path) = write_transcript(r#"{"message":{"usage":{"input_tokens":-5}}}"#);
        assert!(matches!(
            parse_session_tokens(&path),
            Err(StatusError::InvalidConversion)
        ));
    }

    #[test]
    fn parse_is_idempotent() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"usage":{"input_tokens":11,"output_tokens":22}}}"#,
        );
        let first = parse_session_tokens(&path).expect("first");
        let second = parse_session_tokens(&path).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_transcript_reports_not_found() {
        assert!(matches!(
            parse_session_tokens(Path::new("/nonexistent/transcript.jsonl")),
            Err(StatusError::FileNotFound)
        ));
    }

    #[test]
    fn context_uses_last_assistant_entry() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"assistant","usage":{"input_tokens":900,"cache_read_input_tokens":100}}}
{"message":{"role":"user","content":"next"}}
{"message":{"role":"assistant","usage":{"input_tokens":100,"output_tokens":999,"cache_creation_input_tokens":150,"cache_read_input_tokens":20}}}"#,
        );
        // 100 + 150 + 20; output_tokens never counts toward context.
        assert_eq!(count_context_tokens(&path).expect("count"), 270);
    }

    #[test]
    fn context_is_zero_without_assistant_entries() {
        let (_tmp, path) = write_transcript(r#"{"message":{"role":"user","content":"hi"}}"#);
        assert_eq!(count_context_tokens(&path).expect("count"), 0);
    }

    #[test]
    fn context_ignores_bad_fields_leniently() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"assistant","usage":{"input_tokens":-1,"cache_read_input_tokens":40}}}"#,
        );
        assert_eq!(count_context_tokens(&path).expect("count"), 40);
    }

    #[test]
    fn single_pass_matches_two_pass() {
        let content = r#"{"message":{"role":"assistant","usage":{"input_tokens":100,"output_tokens":50}}}
{"message":{"role":"user","content":"x"}}
{"message":{"role":"assistant","usage":{"input_tokens":250,"cache_creation_input_tokens":30,"cache_read_input_tokens":5}}}"#;
        let (_tmp, path) = write_transcript(content);

        let totals = parse_tokens_single_pass(&path, true, true).expect("single pass");
        let session = parse_session_tokens(&path).expect("session");
        let context = count_context_tokens(&path).expect("context");

        assert_eq!(totals.session, Some(session));
        assert_eq!(totals.context, Some(context));
        assert_eq!(totals.context, Some(285));
    }

    #[test]
    fn single_pass_matches_two_pass_when_last_assistant_has_no_usage() {
        let content = r#"{"message":{"role":"assistant","usage":{"input_tokens":500}}}
{"message":{"role":"assistant","content":"done"}}"#;
        let (_tmp, path) = write_transcript(content);

        let totals = parse_tokens_single_pass(&path, true, true).expect("single pass");
        assert_eq!(totals.context, Some(count_context_tokens(&path).expect("context")));
        assert_eq!(totals.context, Some(0));
    }

    #[test]
    fn single_pass_honors_selection_flags() {
        let (_tmp, path) = write_transcript(
            r#"{"message":{"role":"assistant","usage":{"input_tokens":10}}}"#,
        );
        let session_only = parse_tokens_single_pass(&path, true, false).expect("session only");
        assert!(session_only.session.is_some());
        assert!(session_only.context.is_none());

        let neither = parse_tokens_single_pass(&path, false, false).expect("neither");
        assert!(neither.session.is_none());
        assert!(neither.context.is_none());
    }

    #[test]
    fn token_formatting_boundaries() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_000), "1.0K");
        assert_eq!(format_tokens(1_500), "1.5K");
        assert_eq!(format_tokens(1_000_000), "1.0M");
        assert_eq!(format_tokens(1_000_000_000), "1.0G");
        assert_eq!(format_tokens(2_500_000_000), "2.5G");
    }

    #[test]
    fn percentage_calculation() {
        assert_eq!(calculate_percentage(50_000, 200_000, false), 25);
        assert_eq!(calculate_percentage(300_000, 200_000, false), 150);
        assert_eq!(calculate_percentage(300_000, 200_000, true), 100);
        assert_eq!(calculate_percentage(123, 0, false), 0);
    }

    #[test]
    fn percentage_overflow_saturates() {
        assert_eq!(calculate_percentage(u64::MAX, 200_000, true), 100);
        assert_eq!(calculate_percentage(u64::MAX, 200_000, false), u32::MAX);
    }
}
