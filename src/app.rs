//! One invocation of the status line: parse the stdin document, resolve
//! token metrics through the cache, and print the requested rows.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{self, CacheStore};
use crate::cli::Cli;
use crate::display;
use crate::error::StatusError;
use crate::input::StatusInput;
use crate::tokens::{self, TokenCounts};

/// Transcript-derived metrics; `None` means the value was neither cached
/// nor successfully parsed and its rows stay hidden.
#[derive(Debug, Default)]
struct TranscriptMetrics {
    session: Option<TokenCounts>,
    context: Option<u64>,
}

/// Parse one JSON document and print the status line plus requested rows.
pub fn process_document(raw: &[u8], cli: &Cli, use_color: bool) -> Result<(), StatusError> {
    let root: Value = serde_json::from_slice(raw).map_err(|_| StatusError::InvalidJson)?;
    let status = StatusInput::from_json(&root);
    let theme = display::theme(use_color);

    println!(
        "{}",
        display::status_line(theme, cli.verbose, cli.simple, &status)
    );

    let metrics = gather_metrics(&status, cli);
    print_rows(theme, cli, &status, &metrics);
    Ok(())
}

/// Resolve session and context token counts, preferring a fresh cache
/// record over re-reading the transcript.
fn gather_metrics(status: &StatusInput, cli: &Cli) -> TranscriptMetrics {
    let mut metrics = TranscriptMetrics::default();
    let needs_session = cli.needs_session_tokens();
    let needs_context = cli.needs_context_tokens();
    if !needs_session && !needs_context {
        return metrics;
    }
    let Some(transcript) = status.transcript_path.as_deref().filter(|p| !p.is_empty()) else {
        debug!("no transcript path in input, skipping token parsing");
        return metrics;
    };
    let transcript = Path::new(transcript);
    let session_id = status.session_id.as_deref().unwrap_or("");
    let project_dir = status.project_dir.as_deref().unwrap_or("");

    let store = CacheStore::from_env();
    let cached = store.load(Some(session_id)).ok();
    if let Some(cache) = &cached
        && !cache::should_refresh(Some(cache), Some(session_id), Some(project_dir), transcript)
    {
        debug!("using cached token data");
        metrics.session = Some(cache.session_tokens);
        if cache.context_tokens.total > 0 {
            metrics.context = Some(cache.context_tokens.total);
        }
        return metrics;
    }

    debug!("cache miss or stale, parsing transcript");
    if needs_session && needs_context {
        match tokens::parse_tokens_single_pass(transcript, true, true) {
            Ok(totals) => {
                metrics.session = totals.session;
                metrics.context = totals.context.filter(|context| *context > 0);
            }
            Err(err) => warn!(error = %err, "transcript scan failed"),
        }
    } else {
        if needs_session {
            match tokens::parse_session_tokens(transcript) {
                Ok(session) => metrics.session = Some(session),
                Err(err) => warn!(error = %err, "session token scan failed"),
            }
        }
        if needs_context {
            match tokens::count_context_tokens(transcript) {
                Ok(context) if context > 0 => metrics.context = Some(context),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "context token scan failed"),
            }
        }
    }

    // The saved record starts from whatever was loaded, so a failed scan
    // re-stamps the previous counters instead of zeroing them.
    let mut record = cached.unwrap_or_default();
    record.restamp(session_id, project_dir);
    if let Some(session) = metrics.session {
        record.session_tokens = session;
    }
    if let Some(context) = metrics.context {
        record.context_tokens.total = context;
    }
    record.transcript_file_size = cache::transcript_file_size(transcript);
    if let Err(err) = store.save(&record, Some(session_id)) {
        debug!(error = %err, "cache save failed");
    }

    metrics
}

fn print_rows(
    theme: &display::Theme,
    cli: &Cli,
    status: &StatusInput,
    metrics: &TranscriptMetrics,
) {
    let verbose = cli.verbose;

    if cli.show_context_tokens()
        && let Some(context) = metrics.context
    {
        println!(
            "{}",
            display::context_row(theme, verbose, context, cli.clamping)
        );
    }

    if cli.show_session_tokens()
        && let Some(session) = &metrics.session
        && let Some(row) = display::session_row(theme, verbose, session.total, cli.clamping)
    {
        println!("{row}");
    }

    if cli.show_cache_efficiency()
        && let Some(session) = &metrics.session
        && let Some(row) = display::cache_efficiency_row(theme, verbose, session)
    {
        println!("{row}");
    }

    if cli.show_api_time_ratio() {
        println!(
            "{}",
            display::api_time_row(theme, verbose, status.api_ms, status.duration_ms)
        );
    }

    if cli.show_lines_ratio()
        && let Some(row) =
            display::lines_row(theme, verbose, status.lines_added, status.lines_removed)
    {
        println!("{row}");
    }

    if cli.show_input_output_ratio()
        && let Some(session) = &metrics.session
        && let Some(row) = display::input_output_row(theme, verbose, session)
    {
        println!("{row}");
    }

    if cli.show_cache_write_read_ratio()
        && let Some(session) = &metrics.session
        && let Some(row) = display::cache_write_read_row(theme, verbose, session)
    {
        println!("{row}");
    }

    if cli.show_token_breakdown()
        && let Some(session) = &metrics.session
        && let Some(row) = display::token_breakdown(theme, verbose, session)
    {
        println!("{row}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct CacheDirGuard {
        _tmp: TempDir,
        _lock: MutexGuard<'static, ()>,
    }

    // CCSTATUS_CACHE_DIR is process-global; point it at a throwaway
    // directory and hold a lock so parallel tests cannot interleave.
    fn isolated_cache() -> CacheDirGuard {
        let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tmp = TempDir::new().expect("temp dir");
        // SAFETY: the mutex above serializes every writer and reader of
        // this variable within the test binary.
        unsafe { std::env::set_var("CCSTATUS_CACHE_DIR", tmp.path()) };
        CacheDirGuard {
            _tmp: tmp,
            _lock: lock,
        }
    }

    fn input_with_transcript(tmp: &TempDir, jsonl: &str) -> StatusInput {
        let transcript = tmp.path().join("session.jsonl");
        std::fs::write(&transcript, jsonl).expect("write transcript");
        StatusInput::from_json(&json!({
            "session_id": "test-session",
            "workspace": {"project_dir": "/home/dev/app"},
            "transcript_path": transcript.to_str().expect("utf-8 path")
        }))
    }

    #[test]
    fn invalid_json_is_reported() {
        let cli = Cli::default();
        assert!(matches!(
            process_document(b"{not json", &cli, false),
            Err(StatusError::InvalidJson)
        ));
    }

    #[test]
    fn no_flags_skips_transcript_work() {
        let status = StatusInput::from_json(&json!({
            "transcript_path": "/nonexistent/session.jsonl"
        }));
        let metrics = gather_metrics(&status, &Cli::default());
        assert!(metrics.session.is_none());
        assert!(metrics.context.is_none());
    }

    #[test]
    fn missing_transcript_leaves_metrics_empty() {
        let _guard = isolated_cache();
        let status = StatusInput::from_json(&json!({
            "session_id": "gone",
            "transcript_path": "/nonexistent/session.jsonl"
        }));
        let cli = Cli {
            all: true,
            ..Cli::default()
        };
        let metrics = gather_metrics(&status, &cli);
        assert!(metrics.session.is_none());
        assert!(metrics.context.is_none());
    }

    #[test]
    fn scan_fills_metrics_and_cache() {
        let _guard = isolated_cache();
        let tmp = TempDir::new().expect("temp dir");
        let status = input_with_transcript(
            &tmp,
            r#"{"message":{"role":"assistant","usage":{"input_tokens":100,"output_tokens":40,"cache_read_input_tokens":60}}}"#,
        );
        let cli = Cli {
            all: true,
            ..Cli::default()
        };

        let metrics = gather_metrics(&status, &cli);
        let session = metrics.session.expect("session parsed");
        assert_eq!(session.total, 200);
        assert_eq!(metrics.context, Some(160));

        // Second run with an unchanged transcript must come from the cache.
        let store = CacheStore::from_env();
        let cached = store.load(Some("test-session")).expect("cache written");
        assert_eq!(cached.session_tokens, session);
        assert_eq!(cached.context_tokens.total, 160);

        let again = gather_metrics(&status, &cli);
        assert_eq!(again.session, Some(session));
        assert_eq!(again.context, Some(160));
    }

    #[test]
    fn failed_rescan_preserves_previous_counters() {
        let _guard = isolated_cache();
        let tmp = TempDir::new().expect("temp dir");
        let status = input_with_transcript(
            &tmp,
            r#"{"message":{"role":"assistant","usage":{"input_tokens":100,"output_tokens":40,"cache_read_input_tokens":60}}}"#,
        );
        let cli = Cli {
            all: true,
            ..Cli::default()
        };
        let first = gather_metrics(&status, &cli);
        assert_eq!(first.session.map(|s| s.total), Some(200));

        // Removing the transcript changes its observed size, forcing a
        // refresh whose scan then fails.
        std::fs::remove_file(tmp.path().join("session.jsonl")).expect("remove transcript");
        let metrics = gather_metrics(&status, &cli);
        assert!(metrics.session.is_none());
        assert!(metrics.context.is_none());

        let store = CacheStore::from_env();
        let record = store.load(Some("test-session")).expect("record kept");
        assert_eq!(record.session_tokens.total, 200);
        assert_eq!(record.context_tokens.total, 160);
        assert_eq!(record.transcript_file_size, 0);
    }

    #[test]
    fn context_only_requests_skip_session_totals() {
        let _guard = isolated_cache();
        let tmp = TempDir::new().expect("temp dir");
        let status = input_with_transcript(
            &tmp,
            r#"{"message":{"role":"assistant","usage":{"input_tokens":30}}}"#,
        );
        let cli = Cli {
            context_tokens: true,
            ..Cli::default()
        };
        let metrics = gather_metrics(&status, &cli);
        assert!(metrics.session.is_none());
        assert_eq!(metrics.context, Some(30));
    }

    #[test]
    fn zero_context_stays_hidden() {
        let _guard = isolated_cache();
        let tmp = TempDir::new().expect("temp dir");
        let status =
            input_with_transcript(&tmp, r#"{"message":{"role":"user","content":"hi"}}"#);
        let cli = Cli {
            all: true,
            ..Cli::default()
        };
        let metrics = gather_metrics(&status, &cli);
        assert_eq!(metrics.context, None);
        assert_eq!(metrics.session, Some(TokenCounts::default()));
    }
}
