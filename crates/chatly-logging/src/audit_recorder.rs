use chrono::Local;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Default file name for the request/response trace
pub const DEFAULT_AUDIT_LOG: &str = "http-traffic.log";

/// A single HTTP header as persisted in the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One request/response pair (or failed attempt) as written to the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpExchangeRecord {
    pub timestamp: String, // ISO-8601 local time at request issuance
    pub method: String,
    pub url: String,
    pub request_headers: Vec<HeaderEntry>,
    pub request_body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub response_headers: Vec<HeaderEntry>,
    #[serde(default)]
    pub response_body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl HttpExchangeRecord {
    /// Start a record for a request that is about to be sent
    pub fn for_request(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: Vec<HeaderEntry>,
        body: &[u8],
    ) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            method: method.into(),
            url: url.into(),
            request_headers: headers,
            request_body: String::from_utf8_lossy(body).into_owned(),
            status: None,
            response_headers: Vec::new(),
            response_body: String::new(),
            error: None,
            duration_ms: 0,
        }
    }

    pub fn with_response(mut self, status: u16, headers: Vec<HeaderEntry>, body: &[u8]) -> Self {
        self.status = Some(status);
        self.response_headers = headers;
        self.response_body = String::from_utf8_lossy(body).into_owned();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

struct RecorderInner {
    path: PathBuf,
    redacted: HashSet<String>,
    write_lock: Mutex<()>,
}

/// Appends one JSON line per HTTP exchange to the audit log.
///
/// Cloning is cheap and every clone shares the same file and write lock, so
/// the app creates one recorder and hands it to the transport chain. Headers
/// whose names are in the redaction set (case-insensitive) are dropped from
/// every record before it is serialized.
#[derive(Clone)]
pub struct AuditRecorder {
    inner: Arc<RecorderInner>,
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("path", &self.inner.path)
            .field("redacted_count", &self.inner.redacted.len())
            .finish()
    }
}

impl AuditRecorder {
    pub fn new<I, S>(path: impl Into<PathBuf>, redacted_headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let redacted = redacted_headers
            .into_iter()
            .map(|name| name.as_ref().trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        Self {
            inner: Arc::new(RecorderInner {
                path: path.into(),
                redacted,
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether a header with this name is excluded from records
    pub fn is_redacted(&self, header_name: &str) -> bool {
        self.inner.redacted.contains(&header_name.to_ascii_lowercase())
    }

    /// Drop redacted headers from both header lists
    pub fn redact(&self, mut record: HttpExchangeRecord) -> HttpExchangeRecord {
        record.request_headers.retain(|h| !self.is_redacted(&h.name));
        record.response_headers.retain(|h| !self.is_redacted(&h.name));
        record
    }

    /// Append a record. Failures are logged as warnings and never returned.
    pub async fn record(&self, record: HttpExchangeRecord) {
        let recorder = self.clone();
        let outcome = tokio::task::spawn_blocking(move || recorder.write_record(record)).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.warn_write_failure(&e),
            Err(e) => log::warn!("Audit log writer task failed: {}", e),
        }
    }

    /// Synchronous variant used where no runtime is available to await on,
    /// such as dropping an in-flight exchange.
    pub fn record_blocking(&self, record: HttpExchangeRecord) {
        if let Err(e) = self.write_record(record) {
            self.warn_write_failure(&e);
        }
    }

    fn warn_write_failure(&self, error: &std::io::Error) {
        log::warn!(
            "Failed to write audit record to {}: {}",
            self.inner.path.display(),
            error
        );
    }

    fn write_record(&self, record: HttpExchangeRecord) -> std::io::Result<()> {
        let record = self.redact(record);
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        // Poisoning is harmless: every write is a whole line
        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;

        file.lock_exclusive()?;
        let written = file.write_all(line.as_bytes()).and_then(|_| file.flush());
        let unlocked = FileExt::unlock(&file);
        written?;
        unlocked?;

        Ok(())
    }
}
