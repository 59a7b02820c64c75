//! Public entry point: a running set of players.
//!
//! [`Viewer`] validates commands at issuance and enqueues them for the
//! processing loop, which runs on its own thread between
//! [`start`](Viewer::start) and [`stop`](Viewer::stop).
//!
//! ```no_run
//! use std::sync::Arc;
//! use viewer::{ViewerBuilder, engine::sim::SimulatedEngine, store::MemoryBackend};
//!
//! let mut viewer = ViewerBuilder::new(Arc::new(SimulatedEngine::default()))
//!     .store(Box::new(MemoryBackend::new()))
//!     .build()?;
//! viewer.start()?;
//! viewer.play()?;
//! viewer.stop()?;
//! # Ok::<(), viewer::ViewerError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::config::{PlayerConfiguration, ViewerConfig};
use crate::dispatcher::{Command, EventDispatcher, Message};
use crate::display::SessionView;
use crate::engine::{Engine, EngineBinding, SurfaceHandle};
use crate::error::{Result, ViewerError};
use crate::events::{ViewerEvent, ViewerEventBus};
use crate::registry::SessionRegistry;
use crate::session::PlaybackSession;
use crate::store::{ConfigStore, KvBackend, SuspendSnapshot, SuspendedSession};
use crate::wake::{KeepAwake, NoWakeLock, WakeLock};

/// Assembles a [`Viewer`].
pub struct ViewerBuilder {
    engine: Arc<dyn Engine>,
    config: ViewerConfig,
    backend: Option<Box<dyn KvBackend>>,
    resume: Option<SuspendSnapshot>,
    wake_lock: Arc<dyn WakeLock>,
}

impl ViewerBuilder {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            config: ViewerConfig::default(),
            backend: None,
            resume: None,
            wake_lock: Arc::new(NoWakeLock),
        }
    }

    pub fn config(mut self, config: ViewerConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist configurations here: loaded by `build`, saved by `stop`.
    pub fn store(mut self, backend: Box<dyn KvBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Seed the players from a suspend snapshot instead of the store.
    pub fn resume(mut self, snapshot: SuspendSnapshot) -> Self {
        self.resume = Some(snapshot);
        self
    }

    pub fn wake_lock(mut self, lock: Arc<dyn WakeLock>) -> Self {
        self.wake_lock = lock;
        self
    }

    pub fn build(self) -> Result<Viewer> {
        self.config.validate()?;
        let count = self.config.session_count;
        let defaults = self.config.default_stream.clone();
        let store = self
            .backend
            .map(|backend| ConfigStore::new(backend, defaults.clone(), count));

        let seed = match self.resume {
            Some(mut snapshot) => {
                tracing::info!(sessions = snapshot.sessions.len(), "resuming from snapshot");
                snapshot.sessions.truncate(count);
                while snapshot.sessions.len() < count {
                    snapshot.sessions.push(fresh(defaults.clone()));
                }
                snapshot
            }
            None => {
                let configs = match &store {
                    Some(store) => store.load(),
                    None => vec![defaults; count],
                };
                SuspendSnapshot {
                    active: self.config.start_active,
                    sessions: configs.into_iter().map(fresh).collect(),
                }
            }
        };

        Ok(Viewer {
            engine: self.engine,
            slots: count,
            store,
            seed,
            wake_lock: self.wake_lock,
            bus: ViewerEventBus::new(),
            tx: None,
            binding: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }
}

fn fresh(config: PlayerConfiguration) -> SuspendedSession {
    SuspendedSession {
        config,
        position_ms: 0,
        duration_ms: 0,
        desired_playing: false,
    }
}

/// A fixed set of players sharing one engine binding.
pub struct Viewer {
    engine: Arc<dyn Engine>,
    slots: usize,
    store: Option<ConfigStore>,
    /// Intent the next `start` builds its sessions from.
    seed: SuspendSnapshot,
    wake_lock: Arc<dyn WakeLock>,
    bus: ViewerEventBus,
    tx: Option<Sender<Message>>,
    binding: Option<Arc<EngineBinding>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Viewer {
    /// Bind the engine, create every player's pipeline and start the
    /// processing loop.
    ///
    /// Engine failures here are fatal: they are broadcast once as
    /// [`ViewerEvent::Fatal`], nothing is retried and no pipeline is left
    /// behind.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(ViewerError::AlreadyRunning);
        }

        let binding = match EngineBinding::initialize(self.engine.clone()) {
            Ok(binding) => binding,
            Err(e) => {
                self.bus.broadcast(ViewerEvent::Fatal(e.to_string()));
                return Err(e);
            }
        };

        let sessions = self
            .seed
            .sessions
            .iter()
            .cloned()
            .enumerate()
            .map(|(id, s)| PlaybackSession::resumed(id, s))
            .collect();
        let registry = SessionRegistry::from_sessions(sessions, self.seed.active);

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut dispatcher = EventDispatcher::new(
            registry,
            binding.clone(),
            tx.clone(),
            self.bus.clone(),
            KeepAwake::new(self.wake_lock.clone()),
        );
        if let Err(e) = dispatcher.activate_all() {
            drop(dispatcher);
            binding.shutdown();
            return Err(e);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let spawned = thread::Builder::new()
            .name("viewer-dispatch".to_string())
            .spawn(move || {
                dispatcher.run(rx);
                running.store(false, Ordering::SeqCst);
            });
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                binding.shutdown();
                return Err(e.into());
            }
        };

        tracing::info!(sessions = self.slots, active = self.seed.active, "viewer started");
        self.tx = Some(tx);
        self.binding = Some(binding);
        self.worker = Some(worker);
        Ok(())
    }

    /// Tear everything down and save the configurations to the store.
    pub fn stop(&mut self) -> Result<()> {
        let snapshot = self.shutdown()?;
        if let Some(store) = self.store.as_mut() {
            let configs: Vec<_> = snapshot.sessions.iter().map(|s| s.config.clone()).collect();
            store.save(&configs)?;
        }
        tracing::info!("viewer stopped");
        Ok(())
    }

    /// Tear everything down without touching the store, returning the
    /// runtime intent so a later viewer can pick up where this one left off.
    pub fn suspend(&mut self) -> Result<SuspendSnapshot> {
        let snapshot = self.shutdown()?;
        tracing::info!("viewer suspended");
        Ok(snapshot)
    }

    fn shutdown(&mut self) -> Result<SuspendSnapshot> {
        let tx = self.tx.take().ok_or(ViewerError::NotStarted)?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let sent = tx.send(Message::Shutdown(reply_tx));
        drop(tx);
        let reply = match sent {
            Ok(()) => reply_rx.recv().map_err(|_| ViewerError::Disconnected),
            Err(_) => Err(ViewerError::Disconnected),
        };

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("processing loop panicked");
            }
        }
        if let Some(binding) = self.binding.take() {
            binding.shutdown();
        }
        self.running.store(false, Ordering::SeqCst);

        let snapshot = reply?;
        self.seed = snapshot.clone();
        Ok(snapshot)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.slots
    }

    /// Receive every [`ViewerEvent`] from now on.
    pub fn subscribe(&self) -> Receiver<ViewerEvent> {
        self.bus.subscribe()
    }

    /// Current view of every player, in slot order.
    pub fn views(&self) -> Result<Vec<SessionView>> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.enqueue(Message::Snapshot(reply_tx))?;
        reply_rx.recv().map_err(|_| ViewerError::Disconnected)
    }

    fn enqueue(&self, message: Message) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(ViewerError::NotStarted)?;
        tx.send(message).map_err(|_| ViewerError::Disconnected)
    }

    fn command(&self, command: Command) -> Result<()> {
        self.enqueue(Message::Command(command))
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.slots {
            let e = ViewerError::NoSuchSession(slot);
            self.bus.broadcast(ViewerEvent::Rejected {
                slot,
                reason: e.to_string(),
            });
            return Err(e);
        }
        Ok(())
    }

    /// Route play/pause/stop/seek to `slot`.
    pub fn select_active(&self, slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        self.command(Command::SelectActive(slot))
    }

    pub fn cycle_active(&self) -> Result<()> {
        self.command(Command::CycleActive)
    }

    pub fn play(&self) -> Result<()> {
        self.command(Command::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.command(Command::Pause)
    }

    pub fn stop_playback(&self) -> Result<()> {
        self.command(Command::Stop)
    }

    /// Replace the configuration of `slot`.
    ///
    /// An unacceptable URI is refused here: nothing is enqueued, the
    /// previous configuration stays, and a [`ViewerEvent::Rejected`] is
    /// broadcast.
    pub fn set_config(&self, slot: usize, config: PlayerConfiguration) -> Result<()> {
        self.check_slot(slot)?;
        if let Err(e) = config.validate() {
            tracing::warn!(slot, uri = %config.uri, error = %e, "configuration rejected");
            self.bus.broadcast(ViewerEvent::Rejected {
                slot,
                reason: e.to_string(),
            });
            return Err(e);
        }
        self.command(Command::SetConfig(slot, config))
    }

    /// Replace the configuration of the active player.
    ///
    /// The target is resolved when the command is processed, so a pending
    /// `select_active` is honoured. An unacceptable URI is refused here.
    pub fn configure_active(&self, config: PlayerConfiguration) -> Result<()> {
        if let Err(e) = config.validate() {
            tracing::warn!(uri = %config.uri, error = %e, "configuration rejected");
            return Err(e);
        }
        self.command(Command::ConfigureActive(config))
    }

    pub fn seek_start(&self) -> Result<()> {
        self.command(Command::SeekStart)
    }

    pub fn seek_drag(&self, position_ms: u64) -> Result<()> {
        self.command(Command::SeekDrag(position_ms))
    }

    pub fn seek_commit(&self, position_ms: u64) -> Result<()> {
        self.command(Command::SeekCommit(position_ms))
    }

    pub fn bind_surface(&self, slot: usize, surface: SurfaceHandle) -> Result<()> {
        self.check_slot(slot)?;
        self.command(Command::BindSurface(slot, surface))
    }

    /// Must be called before the host destroys the surface of `slot`.
    pub fn unbind_surface(&self, slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        self.command(Command::UnbindSurface(slot))
    }

    pub fn restart(&self, slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        self.command(Command::Restart(slot))
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if self.tx.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!(error = %e, "viewer teardown failed");
            }
        }
    }
}
