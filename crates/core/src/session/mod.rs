//! Per-player playback state machine.
//!
//! A session is one independently controllable stream: a configuration, an
//! engine pipeline and the user's intent for it. Its lifecycle:
//!
//! ```text
//! create()             Uninitialized -> Initializing
//! Initialized event    Initializing  -> Ready   (re-applies uri, position, intent)
//! play / pause / stop  Ready         -> Ready   (transport intent only)
//! destroy()            any           -> Destroyed
//! ```
//!
//! Playing and paused are *transport intent*, tracked in [`Transport`] and
//! `desired_playing`. The engine's own view of its pipeline state is relayed
//! verbatim as display text and never drives this machine.
//!
//! Commands issued before the engine is ready are recorded as intent and
//! applied when the `Initialized` event arrives.

pub mod seek;

use crate::config::PlayerConfiguration;
use crate::engine::{Engine, EngineHandle, EventSink, SurfaceHandle, Ticket};
use crate::error::{Result, ViewerError};
use crate::store::SuspendedSession;
pub use seek::SeekController;

/// Coarse lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No pipeline allocated yet.
    Uninitialized,
    /// Pipeline allocated, waiting for the engine's `Initialized` event.
    Initializing,
    /// Engine accepts commands.
    Ready,
    /// Pipeline released. Terminal.
    Destroyed,
}

/// Last transport command the user issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stopped,
    Playing,
    Paused,
}

/// One player slot.
#[derive(Debug)]
pub struct PlaybackSession {
    id: usize,
    config: PlayerConfiguration,
    handle: Option<EngineHandle>,
    ticket: Option<Ticket>,
    state: SessionState,
    desired_playing: bool,
    transport: Transport,
    seek: SeekController,
    engine_state: String,
    media_size: Option<(u32, u32)>,
    surface: Option<SurfaceHandle>,
}

impl PlaybackSession {
    pub fn new(id: usize, config: PlayerConfiguration) -> Self {
        Self {
            id,
            config,
            handle: None,
            ticket: None,
            state: SessionState::Uninitialized,
            desired_playing: false,
            transport: Transport::Stopped,
            seek: SeekController::new(),
            engine_state: String::new(),
            media_size: None,
            surface: None,
        }
    }

    /// Rebuild a session from suspended intent.
    pub fn resumed(id: usize, suspended: SuspendedSession) -> Self {
        let mut session = Self::new(id, suspended.config);
        session.seek = SeekController::restored(suspended.position_ms, suspended.duration_ms);
        session.desired_playing = suspended.desired_playing;
        if suspended.desired_playing {
            session.transport = Transport::Playing;
        }
        session
    }

    pub fn suspended(&self) -> SuspendedSession {
        SuspendedSession {
            config: self.config.clone(),
            position_ms: self.seek.reported_position_ms(),
            duration_ms: self.seek.reported_duration_ms(),
            desired_playing: self.desired_playing,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn config(&self) -> &PlayerConfiguration {
        &self.config
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        self.handle
    }

    pub fn ticket(&self) -> Option<Ticket> {
        self.ticket
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn desired_playing(&self) -> bool {
        self.desired_playing
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn seek(&self) -> &SeekController {
        &self.seek
    }

    /// Last state text relayed by the engine.
    pub fn engine_state(&self) -> &str {
        &self.engine_state
    }

    pub fn media_size(&self) -> Option<(u32, u32)> {
        self.media_size
    }

    pub fn surface(&self) -> Option<SurfaceHandle> {
        self.surface
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Humanized name: the configured name, or the player number.
    pub fn display_name(&self) -> String {
        if self.config.name.is_empty() {
            format!("Player {}", self.id)
        } else {
            self.config.name.clone()
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.state == SessionState::Destroyed {
            return Err(ViewerError::SessionDestroyed(self.id));
        }
        Ok(())
    }

    /// Allocate the engine pipeline. The session becomes `Initializing`
    /// until the engine reports `Initialized` on `sink`.
    pub fn create(&mut self, engine: &dyn Engine, sink: EventSink) -> Result<EngineHandle> {
        self.ensure_alive()?;
        if let Some(handle) = self.handle {
            return Ok(handle);
        }

        let ticket = sink.ticket();
        let handle = engine.create(sink).map_err(|e| match e {
            ViewerError::EngineCreate { reason, .. } => ViewerError::EngineCreate {
                slot: self.id,
                reason,
            },
            other => ViewerError::EngineCreate {
                slot: self.id,
                reason: other.to_string(),
            },
        })?;

        self.handle = Some(handle);
        self.ticket = Some(ticket);
        self.set_state(SessionState::Initializing);
        Ok(handle)
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::debug!(session = self.id, old_state = ?self.state, new_state = ?state, "state transition");
        self.state = state;
    }

    /// The engine finished (re)initializing. Push everything the user has
    /// asked for so far, so the pipeline converges to the user's intent
    /// rather than to its power-on defaults.
    ///
    /// Returns `false` if the event does not apply in the current state.
    pub fn on_initialized(&mut self, engine: &dyn Engine) -> bool {
        let Some(handle) = self.handle else {
            return false;
        };
        if !matches!(
            self.state,
            SessionState::Initializing | SessionState::Ready
        ) {
            return false;
        }
        self.set_state(SessionState::Ready);

        tracing::debug!(
            session = self.id,
            uri = %self.config.uri,
            position_ms = self.seek.reported_position_ms(),
            playing = self.desired_playing,
            "restoring intent on engine"
        );
        engine.set_uri(handle, &self.config.uri, &self.config.user, &self.config.pass);
        engine.set_position(handle, self.seek.reported_position_ms());
        if let Some(surface) = self.surface {
            engine.bind_surface(handle, surface);
        }
        match self.transport {
            Transport::Playing => engine.play(handle),
            Transport::Paused => engine.pause(handle),
            Transport::Stopped => {}
        }
        true
    }

    /// Handle to command, if the engine is accepting commands.
    fn ready_handle(&self) -> Option<EngineHandle> {
        if self.state == SessionState::Ready {
            self.handle
        } else {
            None
        }
    }

    pub fn play(&mut self, engine: &dyn Engine) -> Result<()> {
        self.ensure_alive()?;
        self.desired_playing = true;
        self.transport = Transport::Playing;
        match self.ready_handle() {
            Some(handle) => engine.play(handle),
            None => tracing::debug!(session = self.id, "play deferred until engine is ready"),
        }
        Ok(())
    }

    pub fn pause(&mut self, engine: &dyn Engine) -> Result<()> {
        self.ensure_alive()?;
        self.desired_playing = false;
        self.transport = Transport::Paused;
        if let Some(handle) = self.ready_handle() {
            engine.pause(handle);
        }
        Ok(())
    }

    pub fn stop(&mut self, engine: &dyn Engine) -> Result<()> {
        self.ensure_alive()?;
        self.desired_playing = false;
        self.transport = Transport::Stopped;
        if let Some(handle) = self.ready_handle() {
            engine.ready(handle);
        }
        Ok(())
    }

    /// Replace the configuration. The caller has already validated it.
    pub fn set_config(&mut self, engine: &dyn Engine, config: PlayerConfiguration) -> Result<()> {
        self.ensure_alive()?;
        tracing::debug!(session = self.id, uri = %config.uri, "configuration replaced");
        self.config = config;
        self.seek.reset();
        self.media_size = None;
        if let Some(handle) = self.ready_handle() {
            engine.set_uri(handle, &self.config.uri, &self.config.user, &self.config.pass);
        }
        Ok(())
    }

    /// User grabbed the seek control. The engine is paused so the position
    /// does not run away under the gesture.
    pub fn begin_drag(&mut self, engine: &dyn Engine) -> Result<()> {
        self.ensure_alive()?;
        if self.seek.begin_drag() {
            if let Some(handle) = self.ready_handle() {
                engine.pause(handle);
            }
        }
        Ok(())
    }

    pub fn drag_to(&mut self, position_ms: u64) -> Result<u64> {
        self.ensure_alive()?;
        Ok(self.seek.drag_to(position_ms))
    }

    /// User released the seek control at `position_ms`.
    pub fn commit_seek(&mut self, engine: &dyn Engine, position_ms: u64) -> Result<u64> {
        self.ensure_alive()?;
        let target = self.seek.commit(position_ms);
        if let Some(handle) = self.ready_handle() {
            engine.set_position(handle, target);
            if self.desired_playing {
                engine.play(handle);
            }
        }
        Ok(target)
    }

    pub fn on_state_changed(&mut self, text: &str) {
        self.engine_state = text.to_string();
    }

    pub fn on_position(&mut self, position_ms: u64, duration_ms: u64) -> bool {
        self.seek.on_position(position_ms, duration_ms)
    }

    pub fn on_media_size(&mut self, width: u32, height: u32) {
        self.media_size = Some((width, height));
    }

    /// A render surface became available.
    pub fn bind_surface(&mut self, engine: &dyn Engine, surface: SurfaceHandle) -> Result<()> {
        self.ensure_alive()?;
        self.surface = Some(surface);
        if let Some(handle) = self.handle {
            engine.bind_surface(handle, surface);
        }
        Ok(())
    }

    /// The render surface is about to be destroyed.
    pub fn unbind_surface(&mut self, engine: &dyn Engine) -> Result<()> {
        self.ensure_alive()?;
        if self.surface.take().is_some() {
            if let Some(handle) = self.handle {
                engine.unbind_surface(handle);
            }
        }
        Ok(())
    }

    /// Release the pipeline. Returns the handle that was released, if any,
    /// so the caller can invalidate its routing entry.
    pub fn destroy(&mut self, engine: &dyn Engine) -> Option<EngineHandle> {
        if self.state == SessionState::Destroyed {
            return None;
        }
        let handle = self.handle.take();
        if let Some(handle) = handle {
            if self.surface.take().is_some() {
                engine.unbind_surface(handle);
            }
            engine.destroy(handle);
        }
        self.ticket = None;
        self.set_state(SessionState::Destroyed);
        handle
    }
}
