use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::{self, Duration, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    core::store::{EntryStore, StoreError},
    entry::{Entry, EntryDraft, MissingField},
    persist::{PersistError, SaveReport, SnapshotGate, SnapshotSink},
};

use super::events::{SaveTrigger, StoreEvent};

/// Failures surfaced through a [`StoreHandle`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Invalid(#[from] MissingField),
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// A save was requested but the runtime has no sink.
    #[error("no snapshot sink configured")]
    NoSink,
    #[error("store runtime is not running")]
    ChannelClosed,
}

/// Runtime tuning knobs.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Period of the snapshot scheduler in milliseconds; `0` disables it.
    pub snapshot_interval_ms: u64,
    /// Queue a snapshot after every successful create or delete.
    pub save_on_mutation: bool,
    /// Write a last snapshot when [`StoreHandle::shutdown`] is called.
    pub save_on_shutdown: bool,
    pub command_queue_bound: usize,
    pub persist_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: 59_000,
            save_on_mutation: true,
            save_on_shutdown: true,
            command_queue_bound: 256,
            persist_queue_bound: 16,
        }
    }
}

/// Cloneable handle to the single-writer store task.
///
/// Every operation, including the view-counting lookups, is executed by
/// that one task, so callers never observe a store mid-mutation.
#[derive(Clone)]
pub struct StoreHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<StoreEvent>,
    last_save: watch::Receiver<Option<SaveReport>>,
}

enum Command {
    Add {
        draft: EntryDraft,
        resp: oneshot::Sender<Result<Entry, RuntimeError>>,
    },
    Delete {
        name: String,
        resp: oneshot::Sender<Result<Entry, RuntimeError>>,
    },
    FindByName {
        name: String,
        resp: oneshot::Sender<Result<Entry, RuntimeError>>,
    },
    FindByUrl {
        url: String,
        resp: oneshot::Sender<Result<Entry, RuntimeError>>,
    },
    FindByTags {
        tags: Vec<String>,
        resp: oneshot::Sender<Vec<Entry>>,
    },
    Get {
        name: String,
        resp: oneshot::Sender<Option<Entry>>,
    },
    Size {
        resp: oneshot::Sender<usize>,
    },
    Dump {
        resp: oneshot::Sender<Vec<Entry>>,
    },
    Tags {
        resp: oneshot::Sender<Vec<String>>,
    },
    Save {
        resp: oneshot::Sender<Result<SaveReport, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    Save {
        entries: Vec<Entry>,
        trigger: SaveTrigger,
        resp: Option<oneshot::Sender<Result<SaveReport, RuntimeError>>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Moves `store` into a dedicated task and returns a handle to it.
///
/// With a `sink`, a persistence worker writes snapshots through a
/// [`SnapshotGate`] on the configured interval, after mutations, and on
/// demand. Without one, saves fail with [`RuntimeError::NoSink`].
pub fn spawn_store(
    store: EntryStore,
    sink: Option<Box<dyn SnapshotSink>>,
    config: RuntimeConfig,
) -> StoreHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<StoreEvent>(1024);
    let (last_save_tx, last_save_rx) = watch::channel(None);

    let persist_tx = sink.map(|sink| {
        let (tx, rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
        spawn_persistence_worker(SnapshotGate::new(sink), rx, events_tx.clone(), last_save_tx);
        tx
    });

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut store = store;
        let mut ticker = persist_tx
            .as_ref()
            .and_then(|_| snapshot_ticker(config.snapshot_interval_ms));

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    let done = handle_command(
                        cmd,
                        &mut store,
                        &events_tx_loop,
                        persist_tx.as_ref(),
                        &config,
                    ).await;
                    if done {
                        break;
                    }
                }
                _ = next_tick(&mut ticker) => {
                    debug!("snapshot interval elapsed");
                    request_save(&store, persist_tx.as_ref(), SaveTrigger::Interval);
                }
            }
        }
        debug!("store runtime stopped");
    });

    StoreHandle {
        cmd_tx,
        events_tx,
        last_save: last_save_rx,
    }
}

impl StoreHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    /// Metadata of the most recent successful save, if any.
    pub fn last_save(&self) -> Option<SaveReport> {
        *self.last_save.borrow()
    }

    /// Validates and stamps `draft`, then adds it. Returns the stored entry.
    pub async fn add(&self, draft: EntryDraft) -> Result<Entry, RuntimeError> {
        self.request(|resp| Command::Add { draft, resp }).await?
    }

    pub async fn delete(&self, name: impl Into<String>) -> Result<Entry, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::Delete { name, resp }).await?
    }

    /// Looks up by name, counting a view.
    pub async fn find_by_name(&self, name: impl Into<String>) -> Result<Entry, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::FindByName { name, resp }).await?
    }

    /// Looks up by URL without counting a view.
    pub async fn find_by_url(&self, url: impl Into<String>) -> Result<Entry, RuntimeError> {
        let url = url.into();
        self.request(|resp| Command::FindByUrl { url, resp }).await?
    }

    /// Looks up by tags, counting one view per tag match.
    pub async fn find_by_tags(&self, tags: Vec<String>) -> Result<Vec<Entry>, RuntimeError> {
        self.request(|resp| Command::FindByTags { tags, resp }).await
    }

    pub async fn get(&self, name: impl Into<String>) -> Result<Option<Entry>, RuntimeError> {
        let name = name.into();
        self.request(|resp| Command::Get { name, resp }).await
    }

    pub async fn size(&self) -> Result<usize, RuntimeError> {
        self.request(|resp| Command::Size { resp }).await
    }

    pub async fn dump(&self) -> Result<Vec<Entry>, RuntimeError> {
        self.request(|resp| Command::Dump { resp }).await
    }

    pub async fn tags(&self) -> Result<Vec<String>, RuntimeError> {
        self.request(|resp| Command::Tags { resp }).await
    }

    /// Writes a snapshot and waits for the outcome.
    pub async fn save(&self) -> Result<SaveReport, RuntimeError> {
        self.request(|resp| Command::Save { resp }).await?
    }

    /// Flushes a final snapshot (if configured) and stops the runtime.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    store: &mut EntryStore,
    events_tx: &broadcast::Sender<StoreEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &RuntimeConfig,
) -> bool {
    match cmd {
        Command::Add { draft, resp } => {
            let res = add_entry(store, draft);
            match &res {
                Ok(entry) => {
                    info!(name = %entry.name, url = %entry.url, "created entry");
                    let _ = events_tx.send(StoreEvent::Added {
                        name: entry.name.clone(),
                    });
                    if config.save_on_mutation {
                        request_save(store, persist_tx, SaveTrigger::Mutation);
                    }
                }
                Err(err) => warn!(%err, "failed to create entry"),
            }
            let _ = resp.send(res);
        }
        Command::Delete { name, resp } => {
            let res = store.delete(&name).map_err(RuntimeError::from);
            match &res {
                Ok(_) => {
                    info!(%name, "deleted entry");
                    let _ = events_tx.send(StoreEvent::Deleted { name });
                    if config.save_on_mutation {
                        request_save(store, persist_tx, SaveTrigger::Mutation);
                    }
                }
                Err(err) => warn!(%err, "failed to delete entry"),
            }
            let _ = resp.send(res);
        }
        Command::FindByName { name, resp } => {
            let res = store.find_by_name(&name).cloned().map_err(RuntimeError::from);
            let _ = resp.send(res);
        }
        Command::FindByUrl { url, resp } => {
            let res = store.find_by_url(&url).cloned().map_err(RuntimeError::from);
            let _ = resp.send(res);
        }
        Command::FindByTags { tags, resp } => {
            let _ = resp.send(store.find_by_tags(&tags));
        }
        Command::Get { name, resp } => {
            let _ = resp.send(store.get(&name).cloned());
        }
        Command::Size { resp } => {
            let _ = resp.send(store.len());
        }
        Command::Dump { resp } => {
            let _ = resp.send(store.export_snapshot());
        }
        Command::Tags { resp } => {
            let _ = resp.send(store.tags().into_iter().map(str::to_string).collect());
        }
        Command::Save { resp } => {
            let Some(tx) = persist_tx else {
                let _ = resp.send(Err(RuntimeError::NoSink));
                return false;
            };
            let msg = PersistMsg::Save {
                entries: store.export_snapshot(),
                trigger: SaveTrigger::Manual,
                resp: Some(resp),
            };
            // The persist queue may be full; wait for room off the actor loop.
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Err(err) = tx.send(msg).await {
                    if let PersistMsg::Save { resp: Some(resp), .. } = err.0 {
                        let _ = resp.send(Err(RuntimeError::ChannelClosed));
                    }
                }
            });
        }
        Command::Shutdown { resp } => {
            let out = match persist_tx {
                Some(tx) => shutdown_persistence(store, tx, config).await,
                None => Ok(()),
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

fn add_entry(store: &mut EntryStore, draft: EntryDraft) -> Result<Entry, RuntimeError> {
    draft.validate()?;
    let entry = draft.into_entry();
    store.add(entry.clone())?;
    Ok(entry)
}

fn request_save(
    store: &EntryStore,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    trigger: SaveTrigger,
) {
    let Some(tx) = persist_tx else {
        return;
    };
    let msg = PersistMsg::Save {
        entries: store.export_snapshot(),
        trigger,
        resp: None,
    };
    if let Err(err) = tx.try_send(msg) {
        warn!(?trigger, %err, "snapshot request dropped");
    }
}

async fn shutdown_persistence(
    store: &EntryStore,
    tx: &mpsc::Sender<PersistMsg>,
    config: &RuntimeConfig,
) -> Result<(), RuntimeError> {
    let mut out = Ok(());

    if config.save_on_shutdown {
        let (save_tx, save_rx) = oneshot::channel();
        let msg = PersistMsg::Save {
            entries: store.export_snapshot(),
            trigger: SaveTrigger::Shutdown,
            resp: Some(save_tx),
        };
        tx.send(msg).await.map_err(|_| RuntimeError::ChannelClosed)?;
        out = save_rx
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
            .and_then(|r| r.map(|_| ()));
    }

    let (done_tx, done_rx) = oneshot::channel();
    tx.send(PersistMsg::Shutdown { resp: done_tx })
        .await
        .map_err(|_| RuntimeError::ChannelClosed)?;
    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)?;
    out
}

fn spawn_persistence_worker(
    gate: SnapshotGate,
    mut rx: mpsc::Receiver<PersistMsg>,
    events_tx: broadcast::Sender<StoreEvent>,
    last_save_tx: watch::Sender<Option<SaveReport>>,
) {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                PersistMsg::Save {
                    entries,
                    trigger,
                    resp,
                } => {
                    let result = gate.save(entries).await;
                    match &result {
                        Ok(report) => {
                            last_save_tx.send_replace(Some(*report));
                            let _ = events_tx.send(StoreEvent::Saved {
                                trigger,
                                report: *report,
                            });
                        }
                        Err(err) => {
                            warn!(?trigger, "snapshot not written, will retry on next trigger");
                            let _ = events_tx.send(StoreEvent::SaveFailed {
                                trigger,
                                reason: err.to_string(),
                            });
                        }
                    }
                    if let Some(resp) = resp {
                        let _ = resp.send(result.map_err(RuntimeError::from));
                    }
                }
                PersistMsg::Shutdown { resp } => {
                    let _ = resp.send(());
                    break;
                }
            }
        }
        debug!("persistence worker stopped");
    });
}

fn snapshot_ticker(interval_ms: u64) -> Option<Interval> {
    if interval_ms == 0 {
        return None;
    }
    let period = Duration::from_millis(interval_ms);
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
