//! Append-only audit trail for a lottery session.
//!
//! Every record is mirrored as a `tracing` event on the `audit` target and
//! handed to the installed [`AuditSink`]. Sinks are best effort: a failed
//! append is surfaced to the caller as an [`AuditError`] and never rolls back
//! in-memory state.

use crate::lottery::{DrawResult, Registrant};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditRecord {
    SessionStarted {
        at: DateTime<Utc>,
        time_scale: f64,
        base_seconds: f64,
        extension_seconds: f64,
    },
    Registration {
        username: String,
        at: DateTime<Utc>,
    },
    Snapshot {
        at: DateTime<Utc>,
        registrants: Vec<Registrant>,
    },
    Extension {
        at: DateTime<Utc>,
        participants: usize,
        extension_seconds: f64,
    },
    Result {
        result: DrawResult,
    },
    Cancelled {
        at: DateTime<Utc>,
    },
}

impl AuditRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::Registration { .. } => "registration",
            Self::Snapshot { .. } => "snapshot",
            Self::Extension { .. } => "extension",
            Self::Result { .. } => "result",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionStarted {
                at,
                time_scale,
                base_seconds,
                extension_seconds,
            } => {
                writeln!(f, "\nLottery Session Started: {at}")?;
                writeln!(
                    f,
                    "Time Scale: {time_scale} (window {base_seconds:.0}s, extension {extension_seconds:.0}s)"
                )?;
                write!(f, "Registration Log:")
            }
            Self::Registration { username, at } => write!(f, "{at} - Registered: {username}"),
            Self::Snapshot { at, registrants } => {
                writeln!(f, "\nProgress saved at: {at}")?;
                write!(f, "Current participants ({}):", registrants.len())?;
                for r in registrants {
                    write!(f, "\n- {} (registered at {})", r.username, r.registered_at)?;
                }
                Ok(())
            }
            Self::Extension {
                at,
                participants,
                extension_seconds,
            } => write!(
                f,
                "\n{at} - Registration period extended by {extension_seconds:.0}s due to low participation ({participants} registered)"
            ),
            Self::Result { result } => {
                writeln!(f, "\n{} - Lottery Results", result.drawn_at)?;
                write!(f, "Total participants: {}", result.total_participants)?;
                if let Some(winner) = &result.winner {
                    write!(f, "\nWINNER: {}", winner.username)?;
                    write!(f, "\nWinner registered at: {}", winner.registered_at)?;
                }
                Ok(())
            }
            Self::Cancelled { at } => {
                write!(f, "\n{at} - Lottery cancelled: No participants registered")
            }
        }
    }
}

/// Durable append-only destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Persist one record.
    fn write(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// Mirror the record as a tracing event on the `audit` target, then persist it.
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        tracing::event!(
            target: "audit",
            tracing::Level::INFO,
            event_type = record.kind(),
            record = %serde_json::to_string(record).unwrap_or_default(),
        );
        self.write(record)
    }

    fn append_session_started(
        &self,
        time_scale: f64,
        base: Duration,
        extension: Duration,
        at: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        self.append(&AuditRecord::SessionStarted {
            at,
            time_scale,
            base_seconds: base.as_secs_f64(),
            extension_seconds: extension.as_secs_f64(),
        })
    }

    fn append_registration(&self, username: &str, at: DateTime<Utc>) -> Result<(), AuditError> {
        self.append(&AuditRecord::Registration {
            username: username.to_string(),
            at,
        })
    }

    fn append_snapshot(
        &self,
        registrants: &[Registrant],
        at: DateTime<Utc>,
    ) -> Result<(), AuditError> {
        self.append(&AuditRecord::Snapshot {
            at,
            registrants: registrants.to_vec(),
        })
    }

    fn append_extension(
        &self,
        at: DateTime<Utc>,
        participants: usize,
        extension: Duration,
    ) -> Result<(), AuditError> {
        self.append(&AuditRecord::Extension {
            at,
            participants,
            extension_seconds: extension.as_secs_f64(),
        })
    }

    fn append_result(&self, result: &DrawResult) -> Result<(), AuditError> {
        self.append(&AuditRecord::Result {
            result: result.clone(),
        })
    }

    fn append_cancelled(&self, at: DateTime<Utc>) -> Result<(), AuditError> {
        self.append(&AuditRecord::Cancelled { at })
    }
}

/// Text log opened in append mode for each record.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, AuditError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| AuditError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| AuditError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

impl AuditSink for FileAuditSink {
    fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let _guard = self.lock.lock();
        let mut file = self.open()?;
        writeln!(file, "{record}")
            .and_then(|_| file.flush())
            .map_err(|source| AuditError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// In-process sink; clones share the same record list.
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    inner: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, kind: &str) -> usize {
        self.inner
            .lock()
            .iter()
            .filter(|r| r.kind() == kind)
            .count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.inner.lock().push(record.clone());
        Ok(())
    }
}

/// Discards everything; used when the audit log is disabled.
#[derive(Clone, Copy, Default, Debug)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn write(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lottery::Registry;
    use tempfile::tempdir;

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("lottery_log.txt");
        let sink = FileAuditSink::new(&path);
        let at = Utc::now();
        sink.append_registration("alice", at).unwrap();
        sink.append_registration("bob", at).unwrap();
        sink.append_cancelled(at).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Registered: alice"));
        assert!(text.contains("Registered: bob"));
        assert!(text.contains("Lottery cancelled"));
        assert!(text.find("alice").unwrap() < text.find("bob").unwrap());
    }

    #[test]
    fn file_sink_reports_unwritable_path() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for appending.
        let sink = FileAuditSink::new(dir.path());
        let err = sink.append_cancelled(Utc::now()).unwrap_err();
        assert!(matches!(err, AuditError::Io { .. }));
    }

    #[test]
    fn snapshot_lists_every_registrant() {
        let mut registry = Registry::new();
        registry.register("alice", Utc::now()).unwrap();
        registry.register("bob", Utc::now()).unwrap();
        let record = AuditRecord::Snapshot {
            at: Utc::now(),
            registrants: registry.snapshot(),
        };
        let text = record.to_string();
        assert!(text.contains("Current participants (2):"));
        assert!(text.contains("- alice"));
        assert!(text.contains("- bob"));
    }

    #[test]
    fn memory_sink_counts_by_kind() {
        let sink = MemoryAuditSink::default();
        let at = Utc::now();
        sink.append(&AuditRecord::Cancelled { at }).unwrap();
        sink.append_registration("x", at).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.count("cancelled"), 1);
        assert_eq!(sink.count("registration"), 1);
    }
}
