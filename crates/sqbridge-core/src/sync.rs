//! Bulk synchronization of the channel list to the console.
//!
//! A run walks the channel list in order and, for every transmitted preamp,
//! sends phantom, pad, then gain, pausing [`PACING_DELAY`] before the next
//! preamp. The first transport failure aborts the run; commands already sent
//! are not rolled back. Only one run may be active at a time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{ChannelState, ControlChange, PreampBus};
use crate::command::Command;
use crate::control::log_tx;
use crate::error::{Error, Result};
use crate::store::StateStore;
use crate::transport::{ConsoleAddress, Transport, TransportError};

/// Pause between preamp command groups. The console drops commands sent faster.
pub const PACING_DELAY: Duration = Duration::from_millis(40);

/// Whether a run is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Idle,
    Running,
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncOutcome {
    /// Every planned preamp group was sent
    Completed { synced: usize, commands: usize },
    /// The run stopped at the first failed command
    Failed { error: String, commands: usize },
}

/// Progress of the current or most recent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub status: SyncState,
    /// Preamp groups fully sent
    pub current: usize,
    /// Preamp groups planned
    pub total: usize,
    /// Individual commands sent
    pub commands_sent: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<SyncOutcome>,
}

/// One preamp's worth of commands.
#[derive(Debug, Clone, PartialEq)]
pub struct PreampGroup {
    pub channel_id: i64,
    pub bus: PreampBus,
    pub preamp_id: i64,
    pub changes: [ControlChange; 3],
}

/// Expand a channel list into the ordered preamp groups a run will send.
#[must_use]
pub fn plan(channels: &[ChannelState]) -> Vec<PreampGroup> {
    channels
        .iter()
        .flat_map(|channel| {
            channel.transmitted_preamps().into_iter().map(move |preamp_id| PreampGroup {
                channel_id: channel.id,
                bus: channel.preamp_bus,
                preamp_id,
                changes: ControlChange::sequence_for(channel),
            })
        })
        .collect()
}

/// Single-flight background sync of the channel list.
pub struct SyncEngine<T> {
    store: Arc<StateStore>,
    transport: Arc<T>,
    job: Arc<Mutex<SyncStatus>>,
}

impl<T: Transport> SyncEngine<T> {
    #[must_use]
    pub fn new(store: Arc<StateStore>, transport: Arc<T>) -> Self {
        Self { store, transport, job: Arc::new(Mutex::new(SyncStatus::default())) }
    }

    /// Current progress.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.job.lock().clone()
    }

    /// Claim the engine for a new run over `channels`.
    ///
    /// The running check and the transition to running happen under one lock,
    /// so two callers can never both start.
    ///
    /// # Errors
    /// Returns [`Error::SyncInProgress`] if a run is already active; that run
    /// is left untouched.
    pub fn begin(&self, addr: ConsoleAddress, channels: &[ChannelState]) -> Result<SyncRun<T>> {
        let groups = plan(channels);
        {
            let mut job = self.job.lock();
            if job.status == SyncState::Running {
                return Err(Error::SyncInProgress);
            }
            *job = SyncStatus {
                status: SyncState::Running,
                current: 0,
                total: groups.len(),
                commands_sent: 0,
                last_result: None,
            };
        }
        info!(%addr, channels = channels.len(), groups = groups.len(), "Sync started");

        Ok(SyncRun {
            addr,
            groups,
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            job: Arc::clone(&self.job),
            _release: ReleaseOnDrop(Arc::clone(&self.job)),
        })
    }

    /// Start a run in the background.
    ///
    /// # Errors
    /// Returns [`Error::SyncInProgress`] if a run is already active.
    pub fn start(&self, addr: ConsoleAddress, channels: &[ChannelState]) -> Result<SyncHandle> {
        let run = self.begin(addr, channels)?;
        let total = run.groups.len();
        let task = tokio::spawn(run.execute());
        Ok(SyncHandle { total, task })
    }
}

/// Handle to a run started with [`SyncEngine::start`].
#[derive(Debug)]
pub struct SyncHandle {
    /// Planned preamp groups
    pub total: usize,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Wait for the run to reach a terminal state.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Sync task ended abnormally");
        }
    }
}

/// A claimed run, ready to execute.
///
/// The engine stays running until this value is dropped, whether or not it
/// was ever executed.
pub struct SyncRun<T> {
    addr: ConsoleAddress,
    groups: Vec<PreampGroup>,
    store: Arc<StateStore>,
    transport: Arc<T>,
    job: Arc<Mutex<SyncStatus>>,
    _release: ReleaseOnDrop,
}

impl<T> fmt::Debug for SyncRun<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRun")
            .field("addr", &self.addr)
            .field("groups", &self.groups.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> SyncRun<T> {
    /// Send every planned group, then record the outcome.
    pub async fn execute(self) {
        let outcome = match self.send_all().await {
            Ok(commands) => {
                info!(synced = self.groups.len(), commands, "Sync complete");
                SyncOutcome::Completed { synced: self.groups.len(), commands }
            }
            Err((e, commands)) => {
                warn!(addr = %self.addr, error = %e, commands, "Sync aborted");
                SyncOutcome::Failed { error: e.to_string(), commands }
            }
        };
        self.job.lock().last_result = Some(outcome);
    }

    async fn send_all(&self) -> std::result::Result<usize, (TransportError, usize)> {
        let mut commands = 0;
        for (index, group) in self.groups.iter().enumerate() {
            debug!(
                channel_id = group.channel_id,
                bus = %group.bus,
                preamp = group.preamp_id,
                "Syncing preamp"
            );
            for change in group.changes {
                let command = Command::encode(group.bus, group.preamp_id, change);
                if let Err(e) = self.transport.send(&self.addr, command).await {
                    return Err((e, commands));
                }
                log_tx(group.bus, group.preamp_id, change);
                commands += 1;
                self.job.lock().commands_sent = commands;
                self.store.update_control(group.bus, group.preamp_id, change);
            }
            self.job.lock().current = index + 1;
            tokio::time::sleep(PACING_DELAY).await;
        }
        Ok(commands)
    }
}

/// Returns the job to idle however the run ends, including panics and aborts.
struct ReleaseOnDrop(Arc<Mutex<SyncStatus>>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        let mut job = self.0.lock();
        if job.last_result.is_none() {
            job.last_result = Some(SyncOutcome::Failed {
                error: "sync interrupted".to_string(),
                commands: job.commands_sent,
            });
        }
        job.status = SyncState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use assert_matches::assert_matches;

    fn addr() -> ConsoleAddress {
        ConsoleAddress::new("10.0.0.50", 51326)
    }

    fn two_channels() -> Vec<ChannelState> {
        let mut vox = ChannelState::mono(1, "Vox", PreampBus::Local, 3);
        vox.phantom = true;
        vox.gain = 20.0;
        let mut keys = ChannelState::stereo(2, "Keys", PreampBus::Local, 5, 6);
        keys.pad = true;
        keys.gain = 10.0;
        vec![vox, keys]
    }

    fn engine(transport: MemoryTransport) -> (SyncEngine<MemoryTransport>, Arc<MemoryTransport>) {
        let store = Arc::new(StateStore::new());
        store.replace(two_channels()).unwrap();
        let transport = Arc::new(transport);
        (SyncEngine::new(store, Arc::clone(&transport)), transport)
    }

    #[test]
    fn test_plan_skips_line_inputs() {
        let channels = vec![
            ChannelState::mono(1, "Vox", PreampBus::Local, 3),
            ChannelState::stereo(2, "ST1", PreampBus::Local, 18, 19),
            ChannelState::stereo(3, "Keys", PreampBus::Local, 5, 6),
            ChannelState::mono(4, "Stage", PreampBus::SLink, 20),
        ];
        let groups: Vec<_> = plan(&channels).iter().map(|g| (g.bus, g.preamp_id)).collect();
        assert_eq!(
            groups,
            vec![
                (PreampBus::Local, 3),
                (PreampBus::Local, 5),
                (PreampBus::Local, 6),
                (PreampBus::SLink, 20),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_sync_sends_in_order() {
        let (engine, transport) = engine(MemoryTransport::new());
        let channels = two_channels();

        let handle = engine.start(addr(), &channels).expect("idle engine");
        assert_eq!(handle.total, 3);
        handle.wait().await;

        let status = engine.status();
        assert_eq!(status.status, SyncState::Idle);
        assert_eq!(status.current, 3);
        assert_eq!(status.total, 3);
        assert_eq!(status.commands_sent, 9);
        assert_eq!(status.last_result, Some(SyncOutcome::Completed { synced: 3, commands: 9 }));

        let expected = vec![
            Command::phantom(PreampBus::Local, 3, true),
            Command::pad(PreampBus::Local, 3, false),
            Command::gain(PreampBus::Local, 3, 20.0),
            Command::phantom(PreampBus::Local, 5, false),
            Command::pad(PreampBus::Local, 5, true),
            Command::gain(PreampBus::Local, 5, 10.0),
            Command::phantom(PreampBus::Local, 6, false),
            Command::pad(PreampBus::Local, 6, true),
            Command::gain(PreampBus::Local, 6, 10.0),
        ];
        assert_eq!(transport.sent(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_are_paced() {
        let (engine, _transport) = engine(MemoryTransport::new());
        let started = tokio::time::Instant::now();

        engine.start(addr(), &two_channels()).unwrap().wait().await;

        assert!(started.elapsed() >= PACING_DELAY * 3);
        assert_eq!(engine.status().commands_sent, 9);
    }

    #[test]
    fn test_run_debug_shows_target() {
        let (engine, _transport) = engine(MemoryTransport::new());
        let run = engine.begin(addr(), &two_channels()).unwrap();
        let rendered = format!("{run:?}");
        assert!(rendered.contains("10.0.0.50"));
        assert!(rendered.contains("groups: 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_line_inputs_never_sent() {
        let (engine, transport) = engine(MemoryTransport::new());
        let channels = vec![
            ChannelState::stereo(1, "ST1", PreampBus::Local, 18, 19),
            ChannelState::stereo(2, "ST2", PreampBus::Local, 20, 21),
        ];

        let handle = engine.start(addr(), &channels).unwrap();
        assert_eq!(handle.total, 0);
        handle.wait().await;

        assert!(transport.sent().is_empty());
        assert_eq!(
            engine.status().last_result,
            Some(SyncOutcome::Completed { synced: 0, commands: 0 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected_while_running() {
        let (engine, _transport) = engine(MemoryTransport::new());
        let channels = two_channels();

        let run = engine.begin(addr(), &channels).unwrap();
        let before = engine.status();
        assert_eq!(before.status, SyncState::Running);

        assert_matches!(engine.begin(addr(), &[]), Err(Error::SyncInProgress));
        assert_matches!(engine.start(addr(), &[]), Err(Error::SyncInProgress));
        assert_eq!(engine.status(), before);

        run.execute().await;
        assert_eq!(engine.status().status, SyncState::Idle);
        tokio_test::assert_ok!(engine.begin(addr(), &channels));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_aborts_run() {
        // Commands: ch1 phantom, pad, gain, ch2 phantom, pad, [gain fails]
        let (engine, transport) = engine(MemoryTransport::failing_at(5));
        let channels = two_channels();

        engine.start(addr(), &channels).unwrap().wait().await;

        let status = engine.status();
        assert_eq!(status.status, SyncState::Idle);
        assert_eq!(status.current, 1);
        assert_eq!(status.commands_sent, 5);
        assert_matches!(
            status.last_result,
            Some(SyncOutcome::Failed { ref error, commands: 5 })
                if error.contains("10.0.0.50:51326")
        );
        assert_eq!(transport.sent().len(), 5);
        assert!(!transport.sent().contains(&Command::phantom(PreampBus::Local, 6, false)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_run_clears_last_result() {
        let (engine, _transport) = engine(MemoryTransport::new());
        engine.start(addr(), &two_channels()).unwrap().wait().await;
        assert!(engine.status().last_result.is_some());

        let run = engine.begin(addr(), &two_channels()).unwrap();
        assert_eq!(engine.status().last_result, None);
        assert_eq!(engine.status().current, 0);
        run.execute().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_returns_to_idle() {
        let (engine, _transport) = engine(MemoryTransport::new());
        let handle = engine.start(addr(), &two_channels()).unwrap();
        handle.task.abort();
        let _ = handle.task.await;

        let status = engine.status();
        assert_eq!(status.status, SyncState::Idle);
        assert_matches!(status.last_result, Some(SyncOutcome::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_updates_mirror() {
        let store = Arc::new(StateStore::new());
        store.replace(vec![ChannelState::mono(1, "Vox", PreampBus::SLink, 4)]).unwrap();
        let engine = SyncEngine::new(Arc::clone(&store), Arc::new(MemoryTransport::new()));

        let mut wanted = ChannelState::mono(1, "Vox", PreampBus::SLink, 4);
        wanted.phantom = true;
        wanted.gain = 42.0;
        engine.start(addr(), &[wanted.clone()]).unwrap().wait().await;

        assert_eq!(store.get(), vec![wanted]);
    }

    #[test]
    fn test_status_json_shape() {
        let status = SyncStatus {
            status: SyncState::Idle,
            current: 2,
            total: 3,
            commands_sent: 7,
            last_result: Some(SyncOutcome::Failed { error: "dial x: refused".into(), commands: 7 }),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "idle");
        assert_eq!(value["last_result"]["error"], "dial x: refused");

        let idle = serde_json::to_value(SyncStatus::default()).unwrap();
        assert!(idle.get("last_result").is_none());
    }
}
