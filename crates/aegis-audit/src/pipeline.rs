//! The decision/audit pipeline. Two modes — `minimal` writes
//! synchronously and carries only ids; `full` additionally resolves a
//! flat attribute summary, writes it to a WAL before enqueuing, and drains
//! the queue on a background task so the evaluator is never blocked by
//! slow disk I/O.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::entry::AuditEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditMode {
    Minimal,
    Full,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("wal write failed: {0}")]
    Wal(String),
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// How long `record` will wait for a slot in the queue before giving up
/// and dropping the entry, incrementing `dropped_count()`.
const ENQUEUE_DEADLINE: Duration = Duration::from_millis(200);

/// The audit pipeline. `record` is cheap to call from the evaluation hot
/// path: in `minimal` mode it's a direct (tiny) synchronous write; in
/// `full` mode it appends to the WAL synchronously and then hands the
/// entry to a bounded channel drained by a background writer task.
pub struct AuditPipeline {
    mode: AuditMode,
    seq: AtomicU64,
    sender: Option<mpsc::Sender<AuditEntry>>,
    wal_path: Option<PathBuf>,
    dropped: AtomicU64,
}

impl AuditPipeline {
    /// Minimal mode: no queue, no WAL, `record` never touches disk asynchronously.
    pub fn minimal() -> Arc<Self> {
        Arc::new(AuditPipeline {
            mode: AuditMode::Minimal,
            seq: AtomicU64::new(0),
            sender: None,
            wal_path: None,
            dropped: AtomicU64::new(0),
        })
    }

    /// Full mode: spawns the background writer task that drains `queue_capacity`
    /// entries at a time into `log_path`, returning the pipeline and the
    /// task's join handle together so the caller can await a clean shutdown.
    pub fn full(
        wal_path: PathBuf,
        log_path: PathBuf,
        queue_capacity: usize,
        cancel: CancellationToken,
    ) -> (Arc<Self>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let pipeline = Arc::new(AuditPipeline {
            mode: AuditMode::Full,
            seq: AtomicU64::new(0),
            sender: Some(tx),
            wal_path: Some(wal_path),
            dropped: AtomicU64::new(0),
        });
        let handle = spawn_writer(rx, log_path, cancel);
        (pipeline, handle)
    }

    pub fn mode(&self) -> AuditMode {
        self.mode
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Records one decision. Never returns an error to the evaluator on
    /// backpressure — a dropped entry is observable only via
    /// `dropped_count()` and a warning log. Auditing must never deadlock
    /// the evaluator.
    pub async fn record(&self, entry_builder: impl FnOnce(u64) -> AuditEntry) {
        let seq = self.next_seq();
        let entry = entry_builder(seq);

        match self.mode {
            AuditMode::Minimal => {
                if let Ok(line) = entry.to_ndjson_line() {
                    tracing::info!(target: "aegis_audit", "{line}");
                }
            }
            AuditMode::Full => {
                if let Err(err) = self.append_wal(&entry).await {
                    error!(error = %err, "audit WAL write failed");
                }
                self.enqueue(entry).await;
            }
        }
    }

    async fn append_wal(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let Some(path) = &self.wal_path else {
            return Ok(());
        };
        let line = entry.to_ndjson_line()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| AuditError::Wal(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AuditError::Wal(e.to_string()))?;
        file.write_all(b"\n").await.map_err(|e| AuditError::Wal(e.to_string()))?;
        Ok(())
    }

    async fn enqueue(&self, entry: AuditEntry) {
        let Some(sender) = &self.sender else { return };
        match tokio::time::timeout(ENQUEUE_DEADLINE, sender.send(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                warn!("audit queue closed, dropping entry");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("aegis_audit_dropped_total").increment(1);
            }
            Err(_elapsed) => {
                warn!("audit queue full past deadline, dropping entry");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("aegis_audit_dropped_total").increment(1);
            }
        }
    }
}

fn spawn_writer(
    mut rx: mpsc::Receiver<AuditEntry>,
    log_path: PathBuf,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut file = match OpenOptions::new().create(true).append(true).open(&log_path).await {
            Ok(f) => f,
            Err(err) => {
                error!(error = %err, path = %log_path.display(), "failed to open audit log, writer exiting");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    while let Ok(entry) = rx.try_recv() {
                        write_entry(&mut file, &entry).await;
                    }
                    break;
                }
                entry = rx.recv() => {
                    match entry {
                        Some(entry) => write_entry(&mut file, &entry).await,
                        None => break,
                    }
                }
            }
        }
    })
}

async fn write_entry(file: &mut tokio::fs::File, entry: &AuditEntry) {
    let Ok(line) = entry.to_ndjson_line() else {
        return;
    };
    if let Err(err) = file.write_all(line.as_bytes()).await {
        error!(error = %err, "audit log write failed");
        return;
    }
    let _ = file.write_all(b"\n").await;
}

/// Reads every complete line from a WAL file and appends any whose `seq`
/// exceeds `last_durable_seq` to `log_path` — the replay step run once at
/// startup, since the WAL and the log share the same NDJSON format.
pub fn replay_wal(wal_path: &std::path::Path, log_path: &std::path::Path, last_durable_seq: u64) -> std::io::Result<usize> {
    if !wal_path.exists() {
        return Ok(0);
    }
    let contents = std::fs::read_to_string(wal_path)?;
    let mut log_file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    let mut replayed = 0;
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<AuditEntry>(line) else {
            continue;
        };
        if entry.seq > last_durable_seq {
            writeln!(log_file, "{line}")?;
            replayed += 1;
        }
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_kernel::{AccessRequest, EntityRef};
    use aegis_policy::{Decision, DenyReason};

    fn sample_decision() -> Decision {
        let request = AccessRequest::new(EntityRef::character("01ABC"), "look", EntityRef::location("01XYZ"));
        Decision::deny(DenyReason::DefaultDeny, None, 1, &request)
    }

    #[tokio::test]
    async fn minimal_mode_records_without_queue() {
        let pipeline = AuditPipeline::minimal();
        let decision = sample_decision();
        pipeline.record(|seq| AuditEntry::from_decision(&decision, seq, None)).await;
        assert_eq!(pipeline.mode(), AuditMode::Minimal);
        assert_eq!(pipeline.dropped_count(), 0);
    }

    #[tokio::test]
    async fn full_mode_writes_wal_and_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let wal_path = dir.path().join("audit.wal");
        let log_path = dir.path().join("audit.ndjson");
        let cancel = CancellationToken::new();
        let (pipeline, handle) = AuditPipeline::full(wal_path.clone(), log_path.clone(), 16, cancel.clone());

        let decision = sample_decision();
        pipeline.record(|seq| AuditEntry::from_decision(&decision, seq, None)).await;

        assert!(std::fs::read_to_string(&wal_path).unwrap().contains("default_deny"));

        cancel.cancel();
        handle.await.unwrap();

        let log_contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(log_contents.contains("default_deny"));
    }

    #[tokio::test]
    async fn sequence_numbers_are_monotonic() {
        let pipeline = AuditPipeline::minimal();
        let decision = sample_decision();
        let mut seqs = Vec::new();
        for _ in 0..3 {
            pipeline
                .record(|seq| {
                    seqs.push(seq);
                    AuditEntry::from_decision(&decision, seq, None)
                })
                .await;
        }
        assert_eq!(seqs, vec![1, 2, 3]);
    }
}
