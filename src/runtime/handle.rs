use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    config::RuntimeConfig,
    core::sharded::{ShardedStore, StoreSnapshotV1},
    directory::{AttendanceView, UserDirectory},
    engine::{attendance::AttendanceEngine, clock::Clock},
    error::AttendanceError,
    export::{ExportError, Exporter, build_rows},
    op::{Op, StoredOp},
    persist::{OpJournal, OpSink, PersistError, PersistResult},
    record::{AttendanceRecord, AttendanceRequest},
    types::{AttendanceType, OpSeq, Timestamp, UserId},
};

use super::events::AttendanceEvent;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
    #[error("persistence: {0}")]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("runtime channel closed")]
    ChannelClosed,
}

type Engine<C> = AttendanceEngine<Arc<ShardedStore>, C>;

/// Cloneable front door to a running attendance ledger.
///
/// Requests run on the caller's task against the sharded store, so requests
/// for different keys proceed in parallel. Accepted ops flow to a background
/// persistence worker when a sink is configured.
pub struct AttendanceHandle<C: Clock + 'static> {
    engine: Arc<Engine<C>>,
    events_tx: broadcast::Sender<AttendanceEvent>,
    persist_tx: Option<mpsc::Sender<PersistMsg>>,
    config: RuntimeConfig,
    ops_since_snapshot: Arc<AtomicUsize>,
}

impl<C: Clock + 'static> Clone for AttendanceHandle<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            events_tx: self.events_tx.clone(),
            persist_tx: self.persist_tx.clone(),
            config: self.config.clone(),
            ops_since_snapshot: Arc::clone(&self.ops_since_snapshot),
        }
    }
}

enum PersistMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Checkpoint {
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
}

/// Write-ahead journal feeding the persistence worker's bounded queue.
///
/// Refuses ops while the worker holds a batch the sink failed to append.
struct PersistQueue {
    tx: mpsc::Sender<PersistMsg>,
    sink_failed: Arc<AtomicBool>,
}

impl OpJournal for PersistQueue {
    fn record(&self, stored: &StoredOp) -> PersistResult<()> {
        if self.sink_failed.load(Ordering::SeqCst) {
            return Err(PersistError::Message(
                "journal sink failing, earlier ops held for retry".to_string(),
            ));
        }
        self.tx
            .try_send(PersistMsg::Op(stored.clone()))
            .map_err(|err| PersistError::Message(format!("persist queue error: {err}")))
    }
}

/// Starts the ledger over `store`. Must be called inside a Tokio runtime.
pub fn spawn_attendance<C: Clock + 'static>(
    store: ShardedStore,
    sink: Option<Box<dyn OpSink>>,
    clock: C,
    config: RuntimeConfig,
) -> AttendanceHandle<C> {
    let (events_tx, _) = broadcast::channel::<AttendanceEvent>(1024);

    let (store, persist_tx) = if let Some(sink) = sink {
        let bound = config.persist_queue_bound.max(1);
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(bound);
        let sink_failed = Arc::new(AtomicBool::new(false));
        spawn_persistence_worker(
            sink,
            persist_rx,
            events_tx.clone(),
            Arc::clone(&sink_failed),
            config.clone(),
        );
        let journal = Arc::new(PersistQueue {
            tx: persist_tx.clone(),
            sink_failed,
        });
        (store.with_journal(journal), Some(persist_tx))
    } else {
        (store, None)
    };

    info!(
        durable = persist_tx.is_some(),
        latest_seq = store.latest_op_seq(),
        "attendance runtime started"
    );

    AttendanceHandle {
        engine: Arc::new(AttendanceEngine::new(Arc::new(store), clock)),
        events_tx,
        persist_tx,
        config,
        ops_since_snapshot: Arc::new(AtomicUsize::new(0)),
    }
}

impl<C: Clock + 'static> AttendanceHandle<C> {
    pub fn subscribe(&self) -> broadcast::Receiver<AttendanceEvent> {
        self.events_tx.subscribe()
    }

    pub fn engine(&self) -> &Engine<C> {
        &self.engine
    }

    pub fn record_attendance(
        &self,
        request: &AttendanceRequest,
    ) -> Result<AttendanceRecord, RuntimeError> {
        let record = self.engine.record_attendance(request)?;
        debug!(
            user_id = record.user_id,
            record_id = record.record_id,
            kind = ?request.kind,
            status = ?record.status,
            "attendance recorded"
        );

        if self.persist_tx.is_none() {
            let _ = self.events_tx.send(AttendanceEvent::DurableUpTo {
                op_seq: self.engine.store().latest_op_seq(),
            });
        }
        let _ = self.events_tx.send(event_for(&record));

        let ops = self.ops_since_snapshot.fetch_add(1, Ordering::SeqCst) + 1;
        self.maybe_auto_checkpoint(ops);
        Ok(record)
    }

    pub fn today_attendance(
        &self,
        user_id: UserId,
    ) -> Result<Option<AttendanceRecord>, RuntimeError> {
        Ok(self.engine.get_today_attendance(user_id)?)
    }

    pub fn user_records(&self, user_id: UserId) -> Result<Vec<AttendanceRecord>, RuntimeError> {
        Ok(self.engine.get_user_attendance_records(user_id)?)
    }

    pub fn records_by_date_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<AttendanceRecord>, RuntimeError> {
        Ok(self.engine.get_attendance_by_date_range(start, end)?)
    }

    pub fn views_by_date_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        directory: &dyn UserDirectory,
    ) -> Result<Vec<AttendanceView>, RuntimeError> {
        let records = self.records_by_date_range(start, end)?;
        Ok(records
            .iter()
            .map(|r| AttendanceView::enrich(r, directory))
            .collect())
    }

    /// Renders the range query through `exporter`.
    pub fn export_range(
        &self,
        start: Timestamp,
        end: Timestamp,
        directory: &dyn UserDirectory,
        exporter: &dyn Exporter,
    ) -> Result<Vec<u8>, RuntimeError> {
        let records = self.records_by_date_range(start, end)?;
        let bytes = exporter.render(&build_rows(&records, directory))?;
        debug!(rows = records.len(), bytes = bytes.len(), "attendance range exported");
        Ok(bytes)
    }

    /// Journals everything accepted so far and returns the durable sequence.
    ///
    /// A sink failure since the previous flush is reported here; the ops it
    /// held back are retried by the next flush.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        let Some(tx) = &self.persist_tx else {
            return Ok(self.engine.store().latest_op_seq());
        };
        let (flush_tx, flush_rx) = oneshot::channel();
        tx.send(PersistMsg::Flush { resp: flush_tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        Ok(flush_rx.await.map_err(|_| RuntimeError::ChannelClosed)??)
    }

    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        let Some(tx) = &self.persist_tx else {
            return Ok(());
        };
        let snapshot = self.engine.store().snapshot()?;
        let last_seq = snapshot.next_op_seq.saturating_sub(1);
        let (cp_tx, cp_rx) = oneshot::channel();
        tx.send(PersistMsg::Checkpoint {
            snapshot,
            last_seq,
            compact: self.config.compact_after_snapshot,
            resp: cp_tx,
        })
        .await
        .map_err(|_| RuntimeError::ChannelClosed)?;
        cp_rx.await.map_err(|_| RuntimeError::ChannelClosed)??;
        self.ops_since_snapshot.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Drains the persistence worker. Later mutations fail `StorageUnavailable`.
    ///
    /// Fails with the sink's error if the final flush could not journal
    /// every accepted op.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let Some(tx) = &self.persist_tx else {
            return Ok(());
        };
        let (done_tx, done_rx) = oneshot::channel();
        tx.send(PersistMsg::Shutdown { resp: done_tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        Ok(done_rx.await.map_err(|_| RuntimeError::ChannelClosed)??)
    }

    fn maybe_auto_checkpoint(&self, ops: usize) {
        if self.config.snapshot_every_ops == 0 || ops < self.config.snapshot_every_ops {
            return;
        }
        let Some(tx) = &self.persist_tx else {
            return;
        };

        let snapshot = match self.engine.store().snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "auto checkpoint skipped");
                return;
            }
        };
        let last_seq = snapshot.next_op_seq.saturating_sub(1);
        let (cp_tx, _cp_rx) = oneshot::channel();
        let msg = PersistMsg::Checkpoint {
            snapshot,
            last_seq,
            compact: self.config.compact_after_snapshot,
            resp: cp_tx,
        };
        if tx.try_send(msg).is_ok() {
            self.ops_since_snapshot.store(0, Ordering::SeqCst);
        }
    }
}

fn event_for(record: &AttendanceRecord) -> AttendanceEvent {
    match (record.attendance_type, record.check_out_time) {
        (AttendanceType::AnnualLeave, _) => AttendanceEvent::LeaveRecorded {
            record_id: record.record_id,
            user_id: record.user_id,
            day: record.day(),
        },
        (AttendanceType::Work, None) => AttendanceEvent::CheckedIn {
            record_id: record.record_id,
            user_id: record.user_id,
        },
        (AttendanceType::Work, Some(_)) => AttendanceEvent::CheckedOut {
            record_id: record.record_id,
            user_id: record.user_id,
        },
    }
}

fn spawn_persistence_worker(
    sink: Box<dyn OpSink>,
    mut rx: mpsc::Receiver<PersistMsg>,
    events_tx: broadcast::Sender<AttendanceEvent>,
    sink_failed: Arc<AtomicBool>,
    config: RuntimeConfig,
) {
    let latency = Duration::from_millis(config.batch_max_latency_ms);
    let mut worker = PersistWorker {
        sink: Arc::new(Mutex::new(sink)),
        buf: Vec::new(),
        last_durable: 0,
        events_tx,
        sink_failed,
        unreported: None,
    };

    tokio::spawn(async move {
        let mut deadline = Instant::now() + latency;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        worker.drain("persist queue closed").await;
                        break;
                    };

                    match msg {
                        PersistMsg::Op(stored) => {
                            let is_create = matches!(stored.op, Op::Create { .. });
                            worker.buf.push(stored);

                            let batch_full = worker.buf.len() >= config.batch_max_ops;
                            if batch_full || (config.flush_on_create && is_create) {
                                worker.flush_in_background(true).await;
                                deadline = Instant::now() + latency;
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = worker.flush_for_caller().await;
                            let _ = resp.send(result.map(|_| worker.last_durable));
                            deadline = Instant::now() + latency;
                        }
                        PersistMsg::Checkpoint { snapshot, last_seq, compact, resp } => {
                            let result = match worker.flush_for_caller().await {
                                Ok(()) => worker.checkpoint(snapshot, last_seq, compact).await,
                                Err(err) => Err(err),
                            };
                            match &result {
                                Ok(()) => info!(last_seq, compact, "checkpoint complete"),
                                Err(err) => error!(error = %err, last_seq, "checkpoint failed"),
                            }
                            let _ = resp.send(result);
                            deadline = Instant::now() + latency;
                        }
                        PersistMsg::Shutdown { resp } => {
                            let result = worker.flush_batch(true).await;
                            info!(
                                last_durable = worker.last_durable,
                                held = worker.buf.len(),
                                "persistence worker stopped"
                            );
                            let _ = resp.send(result);
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !worker.buf.is_empty() => {
                    worker.flush_in_background(false).await;
                    deadline = Instant::now() + latency;
                }
            }
        }
    });
}

/// State owned by the persistence worker task.
///
/// Ops whose append failed stay in `buf` and are retried by the next flush.
/// While any are held, `sink_failed` makes the journal refuse new ops, and
/// the first flush or checkpoint request afterwards receives the error.
struct PersistWorker {
    sink: Arc<Mutex<Box<dyn OpSink>>>,
    buf: Vec<StoredOp>,
    last_durable: OpSeq,
    events_tx: broadcast::Sender<AttendanceEvent>,
    sink_failed: Arc<AtomicBool>,
    unreported: Option<PersistError>,
}

impl PersistWorker {
    /// Flush nobody is waiting on; a failure is kept for the next caller.
    async fn flush_in_background(&mut self, call_flush: bool) {
        if let Err(err) = self.flush_batch(call_flush).await {
            self.unreported = Some(err);
        }
    }

    async fn flush_for_caller(&mut self) -> Result<(), PersistError> {
        match self.unreported.take() {
            Some(err) => Err(err),
            None => self.flush_batch(true).await,
        }
    }

    async fn drain(&mut self, reason: &str) {
        if let Err(err) = self.flush_batch(true).await {
            error!(error = %err, held = self.buf.len(), reason, "ops left unjournaled");
        }
    }

    async fn flush_batch(&mut self, call_flush: bool) -> Result<(), PersistError> {
        if self.buf.is_empty() && !call_flush {
            return Ok(());
        }

        let ops = Arc::new(std::mem::take(&mut self.buf));
        let batch = ops.len();
        let sink_ref = Arc::clone(&self.sink);
        let ops_ref = Arc::clone(&ops);
        let result = tokio::task::spawn_blocking(move || {
            let mut sink = sink_ref.blocking_lock();
            append_and_flush(&mut **sink, &ops_ref, call_flush)
        })
        .await
        .unwrap_or_else(|e| Err(PersistError::Message(format!("join error: {e}"))));

        match result {
            Ok(appended) => {
                if let Some(seq) = appended {
                    self.last_durable = self.last_durable.max(seq);
                    debug!(batch, op_seq = self.last_durable, "journal batch appended");
                    let _ = self.events_tx.send(AttendanceEvent::DurableUpTo {
                        op_seq: self.last_durable,
                    });
                }
                if self.sink_failed.swap(false, Ordering::SeqCst) {
                    info!(op_seq = self.last_durable, "journal sink recovered");
                }
                Ok(())
            }
            Err(err) => {
                error!(error = %err, batch, "journal append failed; holding batch for retry");
                self.buf = Arc::try_unwrap(ops).unwrap_or_else(|shared| shared.as_ref().clone());
                self.sink_failed.store(true, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    async fn checkpoint(
        &mut self,
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
    ) -> Result<(), PersistError> {
        let sink_ref = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || {
            let mut sink = sink_ref.blocking_lock();
            sink.write_snapshot(&snapshot, last_seq)?;
            if compact {
                sink.compact_through(last_seq)?;
            }
            Result::<(), PersistError>::Ok(())
        })
        .await
        .unwrap_or_else(|e| Err(PersistError::Message(format!("join error: {e}"))))
    }
}

fn append_and_flush(
    sink: &mut dyn OpSink,
    ops: &[StoredOp],
    call_flush: bool,
) -> PersistResult<Option<OpSeq>> {
    let appended = if ops.is_empty() {
        None
    } else {
        Some(sink.append_ops(ops)?)
    };
    if call_flush {
        sink.flush()?;
    }
    Ok(appended)
}
