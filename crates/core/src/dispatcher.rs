//! The single ordered processing context.
//!
//! Producers (the UI-facing [`Viewer`](crate::Viewer) and every engine
//! thread) only enqueue [`Message`]s. One consumer, [`EventDispatcher::run`],
//! drains the queue and is the only code that ever mutates sessions, the
//! handle map or the active index. Per-session ordering is therefore the
//! queue order; nothing is ever applied concurrently.
//!
//! Engine events are resolved to a slot at dequeue time. A handle that no
//! live activation owns (destroyed, or reused and re-ticketed) is dropped.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::config::PlayerConfiguration;
use crate::display::{SessionView, error_text};
use crate::engine::{EngineBinding, EngineEvent, EngineHandle, SurfaceHandle, Ticket};
use crate::error::{Result, ViewerError};
use crate::events::{ViewerEvent, ViewerEventBus};
use crate::registry::SessionRegistry;
use crate::store::SuspendSnapshot;
use crate::wake::KeepAwake;

/// A user command. Transport and seek commands target the active player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectActive(usize),
    CycleActive,
    Play,
    Pause,
    Stop,
    SetConfig(usize, PlayerConfiguration),
    /// Replace the configuration of whichever player is active on arrival.
    ConfigureActive(PlayerConfiguration),
    SeekStart,
    SeekDrag(u64),
    SeekCommit(u64),
    BindSurface(usize, SurfaceHandle),
    UnbindSurface(usize),
    /// Destroy and recreate a player's pipeline, keeping its intent.
    Restart(usize),
}

/// Everything the processing loop consumes.
#[derive(Debug)]
pub enum Message {
    /// Raw engine callback, tagged with its origin.
    Engine {
        handle: EngineHandle,
        ticket: Ticket,
        event: EngineEvent,
    },
    Command(Command),
    /// Reply with the current view of every player.
    Snapshot(Sender<Vec<SessionView>>),
    /// Capture the runtime intent, destroy every pipeline and exit.
    Shutdown(Sender<SuspendSnapshot>),
}

/// Whether the loop should keep going after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub struct EventDispatcher {
    registry: SessionRegistry,
    binding: Arc<EngineBinding>,
    tx: Sender<Message>,
    bus: ViewerEventBus,
    awake: KeepAwake,
    fatal_reported: bool,
}

impl EventDispatcher {
    /// `tx` must feed the receiver later passed to [`run`](Self::run); it is
    /// handed to the engine inside every event sink.
    pub fn new(
        registry: SessionRegistry,
        binding: Arc<EngineBinding>,
        tx: Sender<Message>,
        bus: ViewerEventBus,
        awake: KeepAwake,
    ) -> Self {
        Self {
            registry,
            binding,
            tx,
            bus,
            awake,
            fatal_reported: false,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn is_awake(&self) -> bool {
        self.awake.is_held()
    }

    /// Create the pipeline of every slot.
    ///
    /// Creation failure is fatal: pipelines already created are destroyed,
    /// the failure is broadcast once and returned. Nothing is retried.
    pub fn activate_all(&mut self) -> Result<()> {
        let engine = self.binding.engine();
        for slot in 0..self.registry.len() {
            if let Err(e) = self.registry.activate(slot, engine, &self.tx) {
                tracing::error!(slot, error = %e, "engine creation failed");
                self.registry.destroy_all(engine);
                self.report_fatal(&e);
                return Err(e);
            }
        }
        tracing::info!(sessions = self.registry.len(), "all players created");
        for slot in 0..self.registry.len() {
            self.publish(slot);
        }
        Ok(())
    }

    /// Drain `rx` until a [`Message::Shutdown`] arrives or every sender is
    /// gone.
    pub fn run(mut self, rx: Receiver<Message>) {
        tracing::info!(sessions = self.registry.len(), "processing loop started");
        while let Ok(message) = rx.recv() {
            if self.handle(message) == Flow::Stop {
                break;
            }
        }
        self.teardown();
        tracing::info!("processing loop stopped");
    }

    /// Apply one message.
    pub fn handle(&mut self, message: Message) -> Flow {
        let flow = match message {
            Message::Engine {
                handle,
                ticket,
                event,
            } => {
                self.on_engine_event(handle, ticket, event);
                Flow::Continue
            }
            Message::Command(command) => {
                if let Err(e) = self.on_command(command) {
                    tracing::warn!(error = %e, "command failed");
                }
                Flow::Continue
            }
            Message::Snapshot(reply) => {
                let _ = reply.send(self.views());
                Flow::Continue
            }
            Message::Shutdown(reply) => {
                let snapshot = self.suspend_snapshot();
                self.teardown();
                let _ = reply.send(snapshot);
                Flow::Stop
            }
        };
        self.awake.update(self.registry.playing_count());
        flow
    }

    fn on_engine_event(&mut self, handle: EngineHandle, ticket: Ticket, event: EngineEvent) {
        let Some(slot) = self.registry.resolve(handle, ticket) else {
            tracing::debug!(%handle, %ticket, ?event, "dropping event for unowned handle");
            return;
        };
        let engine = self.binding.engine();
        let Ok(session) = self.registry.get_mut(slot) else {
            return;
        };

        match event {
            EngineEvent::Initialized => {
                tracing::debug!(slot, %handle, "engine initialized");
                session.on_initialized(engine);
                self.publish(slot);
            }
            EngineEvent::StateChanged(text) => {
                tracing::debug!(slot, state = %text, "engine state");
                session.on_state_changed(&text);
                self.publish(slot);
            }
            EngineEvent::PositionUpdated {
                position_ms,
                duration_ms,
            } => {
                tracing::trace!(slot, position_ms, duration_ms, "position");
                session.on_position(position_ms, duration_ms);
                self.publish(slot);
            }
            EngineEvent::Error(message) => {
                tracing::warn!(slot, %message, "engine error");
                self.bus.broadcast(ViewerEvent::Error {
                    slot,
                    message: error_text(slot, &message),
                });
            }
            EngineEvent::MediaSizeChanged { width, height } => {
                tracing::debug!(slot, width, height, "media size");
                session.on_media_size(width, height);
                self.bus
                    .broadcast(ViewerEvent::MediaSize { slot, width, height });
            }
        }
    }

    fn on_command(&mut self, command: Command) -> Result<()> {
        tracing::debug!(?command, active = self.registry.active(), "command");
        let engine = self.binding.engine();
        let active = self.registry.active();

        match command {
            Command::SelectActive(slot) => {
                if let Err(e) = self.registry.select_active(slot) {
                    self.reject(slot, &e);
                    return Err(e);
                }
                self.announce_active(active);
            }
            Command::CycleActive => {
                if !self.registry.is_empty() {
                    self.registry.cycle_active();
                    self.announce_active(active);
                }
            }
            Command::Play => {
                self.registry.active_session_mut().play(engine)?;
                self.publish(active);
            }
            Command::Pause => {
                self.registry.active_session_mut().pause(engine)?;
                self.publish(active);
            }
            Command::Stop => {
                self.registry.active_session_mut().stop(engine)?;
                self.publish(active);
            }
            Command::SetConfig(slot, config) => self.configure(slot, config)?,
            Command::ConfigureActive(config) => self.configure(active, config)?,
            Command::SeekStart => {
                self.registry.active_session_mut().begin_drag(engine)?;
                self.publish(active);
            }
            Command::SeekDrag(position_ms) => {
                self.registry.active_session_mut().drag_to(position_ms)?;
                self.publish(active);
            }
            Command::SeekCommit(position_ms) => {
                let target = self
                    .registry
                    .active_session_mut()
                    .commit_seek(engine, position_ms)?;
                tracing::debug!(slot = active, target, "seek committed");
                self.publish(active);
            }
            Command::BindSurface(slot, surface) => {
                self.registry.get_mut(slot)?.bind_surface(engine, surface)?;
            }
            Command::UnbindSurface(slot) => {
                self.registry.get_mut(slot)?.unbind_surface(engine)?;
            }
            Command::Restart(slot) => {
                if let Err(e) = self.registry.restart(slot, engine, &self.tx) {
                    if matches!(e, ViewerError::EngineCreate { .. }) {
                        self.report_fatal(&e);
                    }
                    return Err(e);
                }
                self.publish(slot);
            }
        }
        Ok(())
    }

    fn configure(&mut self, slot: usize, config: PlayerConfiguration) -> Result<()> {
        if let Err(e) = config.validate() {
            tracing::warn!(slot, uri = %config.uri, "configuration rejected");
            self.reject(slot, &e);
            return Err(e);
        }
        let engine = self.binding.engine();
        self.registry.get_mut(slot)?.set_config(engine, config)?;
        self.publish(slot);
        Ok(())
    }

    fn announce_active(&self, previous: usize) {
        let slot = self.registry.active();
        if let Ok(session) = self.registry.get(slot) {
            self.bus.broadcast(ViewerEvent::ActiveChanged {
                slot,
                name: session.display_name(),
            });
        }
        self.publish(previous);
        if previous != slot {
            self.publish(slot);
        }
    }

    fn publish(&self, slot: usize) {
        if let Ok(session) = self.registry.get(slot) {
            let active = slot == self.registry.active();
            self.bus
                .broadcast(ViewerEvent::SessionChanged(SessionView::of(session, active)));
        }
    }

    fn reject(&self, slot: usize, error: &ViewerError) {
        self.bus.broadcast(ViewerEvent::Rejected {
            slot,
            reason: error.to_string(),
        });
    }

    fn report_fatal(&mut self, error: &ViewerError) {
        if !self.fatal_reported {
            self.fatal_reported = true;
            self.bus.broadcast(ViewerEvent::Fatal(error.to_string()));
        }
    }

    fn views(&self) -> Vec<SessionView> {
        let active = self.registry.active();
        self.registry
            .iter()
            .map(|s| SessionView::of(s, s.id() == active))
            .collect()
    }

    fn suspend_snapshot(&self) -> SuspendSnapshot {
        SuspendSnapshot {
            active: self.registry.active(),
            sessions: self.registry.iter().map(|s| s.suspended()).collect(),
        }
    }

    fn teardown(&mut self) {
        self.registry.destroy_all(self.binding.engine());
        self.awake.update(0);
    }
}
