// src/logwriter/registry.rs

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::logwriter::naming::{
    batch_log_path, parse_log_filename, token_dir, token_log_path,
};
use crate::resolve::normalize_token_id;
use crate::types::Token;

/// Composite key for open log handles. The raw token id is normalized per
/// protocol rules before keying.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LogKey {
    token_id: String,
    protocol: &'static str,
}

impl LogKey {
    fn for_token(token: &Token) -> Self {
        Self {
            token_id: normalize_token_id(&token.id, token.kind),
            protocol: token.kind.lowercase(),
        }
    }
}

/// One open append handle plus mismatch-detection state.
#[derive(Debug)]
struct LogHandle {
    file: File,
    path: PathBuf,
    /// IP embedded in the filename actually being written to. The filename
    /// IP is authoritative for display; the configured IP stays
    /// authoritative for connections.
    file_ip: String,
    header_written: bool,
}

/// Registry owning all open per-token log handles.
///
/// Explicitly constructed at the composition root and passed by reference;
/// lifecycle is "created on first use, closed on explicit close or
/// shutdown". Writes are serialized through the registry lock since
/// multiple batches can target the same token.
#[derive(Debug)]
pub struct LogRegistry {
    root: PathBuf,
    handles: Mutex<HashMap<LogKey, LogHandle>>,
}

impl LogRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open (or reuse) the log handle for a token, returning its path.
    ///
    /// If a file for the same `(node, id, protocol)` already exists with a
    /// different embedded IP, that file is appended to and a mismatch
    /// warning is logged.
    pub fn open(&self, token: &Token) -> Result<PathBuf> {
        let mut handles = self.handles.lock().expect("log registry lock poisoned");
        let handle = self.open_locked(&mut handles, token)?;
        Ok(handle.path.clone())
    }

    /// Append content for a token, opening the handle on first use.
    ///
    /// The first write per handle gets a metadata header. Content is
    /// written as UTF-8 bytes — any valid string is safe, emoji included —
    /// and flushed immediately; durability wins over batching throughput.
    pub fn append(&self, token: &Token, content: &str) -> Result<()> {
        let mut handles = self.handles.lock().expect("log registry lock poisoned");
        let handle = self.open_locked(&mut handles, token)?;

        if !handle.header_written {
            let timestamp = unix_timestamp();
            writeln!(
                handle.file,
                "=== node: {} | token: {} | protocol: {} | opened: {} ===",
                token.node,
                normalize_token_id(&token.id, token.kind),
                token.kind,
                timestamp
            )?;
            handle.header_written = true;
        }

        handle.file.write_all(content.as_bytes())?;
        if !content.ends_with('\n') {
            handle.file.write_all(b"\n")?;
        }
        handle.file.flush()?;
        Ok(())
    }

    /// Close a token's handle. Safe to call when none exists.
    pub fn close(&self, token: &Token) {
        let mut handles = self.handles.lock().expect("log registry lock poisoned");
        if let Some(handle) = handles.remove(&LogKey::for_token(token)) {
            debug!(path = %handle.path.display(), "closing log handle");
        }
    }

    /// Close every open handle. Safe to call repeatedly.
    pub fn close_all(&self) {
        let mut handles = self.handles.lock().expect("log registry lock poisoned");
        let count = handles.len();
        handles.clear();
        if count > 0 {
            debug!(count, "closed all log handles");
        }
    }

    /// IP to display for a token while its handle is open. The filename
    /// IP wins for display even when it disagrees with the configured one.
    pub fn display_ip(&self, token: &Token) -> Option<String> {
        self.handles
            .lock()
            .expect("log registry lock poisoned")
            .get(&LogKey::for_token(token))
            .map(|h| h.file_ip.clone())
    }

    /// Number of currently open handles (diagnostics, housekeeping).
    pub fn open_handles(&self) -> usize {
        self.handles
            .lock()
            .expect("log registry lock poisoned")
            .len()
    }

    /// Open the batch-level log for a node: `{root}/{node}/{node}_{ts}_LOG.log`.
    pub fn open_batch_log(&self, node: &str) -> Result<BatchLog> {
        let path = batch_log_path(&self.root, node);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "opened batch log");
        Ok(BatchLog { file, path })
    }

    fn open_locked<'a>(
        &self,
        handles: &'a mut HashMap<LogKey, LogHandle>,
        token: &Token,
    ) -> Result<&'a mut LogHandle> {
        let key = LogKey::for_token(token);

        if !handles.contains_key(&key) {
            let handle = self.open_new(token)?;
            handles.insert(key.clone(), handle);
        }

        Ok(handles
            .get_mut(&key)
            .expect("handle inserted above must be present"))
    }

    fn open_new(&self, token: &Token) -> Result<LogHandle> {
        let dir = token_dir(&self.root, token);
        fs::create_dir_all(&dir)?;

        let norm_id = normalize_token_id(&token.id, token.kind);

        // An existing file for the same (node, id, protocol) wins over the
        // configured address, but a differing IP is worth a warning.
        let (path, file_ip) = match find_existing(&dir, &token.node, &norm_id, token.kind.lowercase())?
        {
            Some((existing, existing_ip)) => {
                if existing_ip != token.ip {
                    warn!(
                        node = %token.node,
                        token = %norm_id,
                        configured_ip = %token.ip,
                        file_ip = %existing_ip,
                        "log file IP differs from configured IP; appending to existing file"
                    );
                }
                (existing, existing_ip)
            }
            None => (token_log_path(&self.root, token), token.ip.clone()),
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "opened log handle");

        Ok(LogHandle {
            file,
            path,
            file_ip,
            header_written: false,
        })
    }
}

/// Look for an existing log file of the same `(node, id, protocol)` and
/// return its path plus the dotted IP embedded in its name.
fn find_existing(
    dir: &Path,
    node: &str,
    norm_id: &str,
    extension: &str,
) -> Result<Option<(PathBuf, String)>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(parsed) = parse_log_filename(&name.to_string_lossy()) else {
            continue;
        };

        if parsed.node == node && parsed.token_id == norm_id && parsed.extension == extension {
            return Ok(Some((entry.path(), parsed.ip)));
        }
    }

    Ok(None)
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Batch-level log owned by one batch invocation.
#[derive(Debug)]
pub struct BatchLog {
    file: File,
    path: PathBuf,
}

impl BatchLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, line: &str) -> Result<()> {
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }
}
