//! File-backed cache of per-session token totals.
//!
//! Each status invocation is a fresh process, so parsed transcript totals
//! are persisted between ticks. Records live under a per-user directory,
//! one fixed-size binary record per session, guarded by advisory file
//! locks. The on-disk format is private to a single build; any mismatch is
//! treated as a miss and the transcript is re-parsed.

use std::env;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use fs2::FileExt;
use tracing::debug;

use crate::error::StatusError;
use crate::tokens::TokenCounts;

const CACHE_MAGIC: u32 = 0xCCCC_0002;
const CACHE_MAX_AGE_SECS: i64 = 60;
const LOCK_TIMEOUT: Duration = Duration::from_millis(2000);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

const SESSION_ID_CAP: usize = 128;
const PROJECT_DIR_CAP: usize = 256;
const TOKEN_COUNTS_SIZE: usize = 5 * 8;

/// magic + timestamp + two identity buffers + two counter blocks + size.
pub const RECORD_SIZE: usize = 4 + 8 + SESSION_ID_CAP + PROJECT_DIR_CAP + 2 * TOKEN_COUNTS_SIZE + 8;

/// One cached snapshot of transcript-derived totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCache {
    pub last_update_time: i64,
    pub session_id: String,
    pub project_dir: String,
    pub session_tokens: TokenCounts,
    pub context_tokens: TokenCounts,
    pub transcript_file_size: u64,
}

/// Cache directory root; the default is overridable through the
/// `CCSTATUS_CACHE_DIR` environment variable so tests and sandboxed
/// installs can relocate it.
#[derive(Debug, Clone)]
pub struct CacheStore {
    base: PathBuf,
}

impl CacheStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn from_env() -> Self {
        let base = env::var_os("CCSTATUS_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("ccstatus"));
        Self::new(base)
    }

    /// Cache file path for a session, creating the directory chain on
    /// demand. Directory creation failures are deferred: the subsequent
    /// open reports them.
    pub fn path_for(&self, session_id: Option<&str>) -> PathBuf {
        let dir = self.base.join(user_dir_component());
        if let Err(err) = create_private_dir(&self.base) {
            debug!(error = %err, "cache base directory unavailable");
        }
        if let Err(err) = create_private_dir(&dir) {
            debug!(error = %err, "cache user directory unavailable");
        }

        let file_name = match session_id {
            Some(id) if !id.is_empty() => format!("{}.cache", hash_session_id(id)),
            _ => "default.cache".to_string(),
        };
        let path = dir.join(file_name);
        debug!(path = %path.display(), "cache path");
        path
    }

    pub fn load(&self, session_id: Option<&str>) -> Result<TokenCache, StatusError> {
        let path = self.path_for(session_id);
        let file = File::open(&path).map_err(|_| StatusError::FileNotFound)?;
        lock_with_timeout(&file, false)?;

        let mut buf = [0u8; RECORD_SIZE];
        let read_result = (&file).read_exact(&mut buf);
        let _ = FileExt::unlock(&file);
        read_result?;

        let cache = TokenCache::decode(&buf)?;
        let age = Utc::now().timestamp() - cache.last_update_time;
        if age > CACHE_MAX_AGE_SECS {
            debug!(age, "cache expired");
            return Err(StatusError::InvalidFormat);
        }
        debug!(age, "cache loaded");
        Ok(cache)
    }

    pub fn save(&self, cache: &TokenCache, session_id: Option<&str>) -> Result<(), StatusError> {
        let path = self.path_for(session_id);
        let file = File::create(&path).map_err(|_| StatusError::FileNotFound)?;
        lock_with_timeout(&file, true)?;

        let write_result = (&file).write_all(&cache.encode());
        let _ = FileExt::unlock(&file);
        write_result?;
        debug!(path = %path.display(), "cache saved");
        Ok(())
    }
}

impl TokenCache {
    /// Fresh record stamped with the current time.
    pub fn stamped(session_id: &str, project_dir: &str) -> Self {
        let mut cache = Self::default();
        cache.restamp(session_id, project_dir);
        cache
    }

    /// Refresh identity and timestamp in place, keeping the counters.
    pub fn restamp(&mut self, session_id: &str, project_dir: &str) {
        self.last_update_time = Utc::now().timestamp();
        self.session_id = session_id.to_string();
        self.project_dir = project_dir.to_string();
    }

    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        let mut at = 0;
        put_bytes(&mut buf, &mut at, &CACHE_MAGIC.to_le_bytes());
        put_bytes(&mut buf, &mut at, &self.last_update_time.to_le_bytes());
        put_padded_str(&mut buf, &mut at, &self.session_id, SESSION_ID_CAP);
        put_padded_str(&mut buf, &mut at, &self.project_dir, PROJECT_DIR_CAP);
        put_counts(&mut buf, &mut at, &self.session_tokens);
        put_counts(&mut buf, &mut at, &self.context_tokens);
        put_bytes(&mut buf, &mut at, &self.transcript_file_size.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8; RECORD_SIZE]) -> Result<Self, StatusError> {
        let mut at = 0;
        let magic = read_u32(buf, &mut at);
        if magic != CACHE_MAGIC {
            debug!(magic, expected = CACHE_MAGIC, "cache magic mismatch");
            return Err(StatusError::InvalidFormat);
        }
        Ok(Self {
            last_update_time: read_i64(buf, &mut at),
            session_id: read_padded_str(buf, &mut at, SESSION_ID_CAP),
            project_dir: read_padded_str(buf, &mut at, PROJECT_DIR_CAP),
            session_tokens: read_counts(buf, &mut at),
            context_tokens: read_counts(buf, &mut at),
            transcript_file_size: read_u64(buf, &mut at),
        })
    }
}

/// A record is usable when its identity matches the caller's and it has
/// not aged out. A `None` identity means the caller has nothing to compare
/// against and that check is skipped.
pub fn is_cache_valid(
    cache: &TokenCache,
    session_id: Option<&str>,
    project_dir: Option<&str>,
) -> bool {
    if let Some(id) = session_id
        && cache.session_id != id
    {
        debug!("cache invalid: session id mismatch");
        return false;
    }
    if let Some(dir) = project_dir
        && cache.project_dir != dir
    {
        debug!("cache invalid: project directory mismatch");
        return false;
    }
    let age = Utc::now().timestamp() - cache.last_update_time;
    if age > CACHE_MAX_AGE_SECS {
        debug!(age, "cache invalid: expired");
        return false;
    }
    true
}

/// Staleness policy: refresh on any validity failure, or when the live
/// transcript size no longer matches the recorded one.
pub fn should_refresh(
    cache: Option<&TokenCache>,
    session_id: Option<&str>,
    project_dir: Option<&str>,
    transcript_path: &Path,
) -> bool {
    let Some(cache) = cache else {
        return true;
    };
    if !is_cache_valid(cache, session_id, project_dir) {
        return true;
    }
    let current_size = transcript_file_size(transcript_path);
    if current_size != cache.transcript_file_size {
        debug!(
            cached = cache.transcript_file_size,
            current = current_size,
            "cache refresh needed: transcript size changed"
        );
        return true;
    }
    false
}

/// Transcript size in bytes; 0 when the file is missing or unreadable.
pub fn transcript_file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}

/// FNV-1a over the session id bytes, as 16 lowercase hex digits.
fn hash_session_id(session_id: &str) -> String {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in session_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}

fn lock_with_timeout(file: &File, exclusive: bool) -> Result<(), StatusError> {
    let deadline = Instant::now() + LOCK_TIMEOUT;
    loop {
        let attempt = if exclusive {
            FileExt::try_lock_exclusive(file)
        } else {
            FileExt::try_lock_shared(file)
        };
        match attempt {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    debug!(exclusive, "timed out acquiring cache lock");
                    return Err(StatusError::Io(err));
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(err) => return Err(StatusError::Io(err)),
        }
    }
}

#[cfg(unix)]
fn user_dir_component() -> String {
    // SAFETY: getuid cannot fail and touches no shared state.
    let uid = unsafe { libc::getuid() };
    uid.to_string()
}

#[cfg(not(unix))]
fn user_dir_component() -> String {
    "default".to_string()
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    match fs::DirBuilder::new().mode(0o700).create(path) {
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    match fs::DirBuilder::new().create(path) {
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

fn put_bytes(buf: &mut [u8], at: &mut usize, bytes: &[u8]) {
    buf[*at..*at + bytes.len()].copy_from_slice(bytes);
    *at += bytes.len();
}

/// Copy at most `cap - 1` bytes into a NUL-padded field, truncating at a
/// character boundary.
fn put_padded_str(buf: &mut [u8], at: &mut usize, text: &str, cap: usize) {
    let mut len = text.len().min(cap - 1);
    while len > 0 && !text.is_char_boundary(len) {
        len -= 1;
    }
    buf[*at..*at + len].copy_from_slice(&text.as_bytes()[..len]);
    *at += cap;
}

fn put_counts(buf: &mut [u8], at: &mut usize, counts: &TokenCounts) {
    for value in [
        counts.input,
        counts.output,
        counts.cache_creation,
        counts.cache_read,
        counts.total,
    ] {
        put_bytes(buf, at, &value.to_le_bytes());
    }
}

fn read_u32(buf: &[u8], at: &mut usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[*at..*at + 4]);
    *at += 4;
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8], at: &mut usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[*at..*at + 8]);
    *at += 8;
    u64::from_le_bytes(bytes)
}

fn read_i64(buf: &[u8], at: &mut usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[*at..*at + 8]);
    *at += 8;
    i64::from_le_bytes(bytes)
}

fn read_padded_str(buf: &[u8], at: &mut usize, cap: usize) -> String {
    let field = &buf[*at..*at + cap];
    *at += cap;
    let end = field.iter().position(|b| *b == 0).unwrap_or(cap);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn read_counts(buf: &[u8], at: &mut usize) -> TokenCounts {
    TokenCounts {
        input: read_u64(buf, at),
        output: read_u64(buf, at),
        cache_creation: read_u64(buf, at),
        cache_read: read_u64(buf, at),
        total: read_u64(buf, at),
    }
}
