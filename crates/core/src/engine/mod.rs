//! Native playback engine contract.
//!
//! The engine owns the actual media pipelines. The coordinator only sees:
//!
//! - an opaque [`EngineHandle`] per pipeline, returned by [`Engine::create`];
//! - fire-and-forget commands ([`Engine::play`], [`Engine::set_position`], ...);
//! - asynchronous callbacks delivered through the [`EventSink`] handed to
//!   `create`, from whatever thread the engine runs them on.
//!
//! Handle values may be recycled by the engine after
//! [`Engine::destroy`]. Every sink carries the [`Ticket`] of the activation it
//! was created for, so an event from a previous activation can never be
//! attributed to a new one that happens to receive the same handle value.
//!
//! ## Process binding
//!
//! [`EngineBinding::initialize`] must succeed once before any pipeline is
//! created. The binding is an explicit value: dropping it (or calling
//! [`EngineBinding::shutdown`]) tears the engine down.

#[cfg(test)]
pub(crate) mod mock;
pub mod sim;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::Sender;

use crate::dispatcher::Message;
use crate::error::Result;

/// Opaque identifier of one engine pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineHandle(pub u64);

impl fmt::Display for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Opaque render surface provided by the host windowing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

static TICKET_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generation tag of one engine activation. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub(crate) fn next() -> Self {
        Ticket(TICKET_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback raised by the engine for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The pipeline is built and its loop is running; commands are accepted.
    Initialized,
    /// The pipeline reported a new state. Opaque display text.
    StateChanged(String),
    /// Periodic position report, in milliseconds.
    PositionUpdated { position_ms: u64, duration_ms: u64 },
    /// Playback error. Advisory only.
    Error(String),
    /// Decoded video dimensions changed or became known.
    MediaSizeChanged { width: u32, height: u32 },
}

/// Where an engine delivers callbacks for one activation.
///
/// Cheap to clone; safe to call from any thread. Once the coordinator is
/// gone, emitted events are silently discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<Message>,
    ticket: Ticket,
}

impl EventSink {
    pub(crate) fn new(tx: Sender<Message>, ticket: Ticket) -> Self {
        Self { tx, ticket }
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn emit(&self, handle: EngineHandle, event: EngineEvent) {
        if self
            .tx
            .send(Message::Engine {
                handle,
                ticket: self.ticket,
                event,
            })
            .is_err()
        {
            tracing::trace!(%handle, "coordinator gone, engine event discarded");
        }
    }

    pub fn initialized(&self, handle: EngineHandle) {
        self.emit(handle, EngineEvent::Initialized);
    }

    pub fn state_changed(&self, handle: EngineHandle, state: &str) {
        self.emit(handle, EngineEvent::StateChanged(state.to_string()));
    }

    pub fn position_updated(&self, handle: EngineHandle, position_ms: u64, duration_ms: u64) {
        self.emit(
            handle,
            EngineEvent::PositionUpdated {
                position_ms,
                duration_ms,
            },
        );
    }

    pub fn error(&self, handle: EngineHandle, message: &str) {
        self.emit(handle, EngineEvent::Error(message.to_string()));
    }

    pub fn media_size_changed(&self, handle: EngineHandle, width: u32, height: u32) {
        self.emit(handle, EngineEvent::MediaSizeChanged { width, height });
    }
}

/// A native media engine.
///
/// Only [`initialize`](Self::initialize) and [`create`](Self::create) can
/// fail. Every other command is fire-and-forget; its outcome is observed
/// through later events.
pub trait Engine: Send + Sync {
    /// Process-level setup. Called once, before any `create`.
    fn initialize(&self) -> Result<()>;

    /// Release process-level resources. Called once, after every pipeline
    /// has been destroyed.
    fn shutdown(&self) {}

    /// Allocate a pipeline. Completion is signalled by
    /// [`EngineEvent::Initialized`] on `sink`.
    fn create(&self, sink: EventSink) -> Result<EngineHandle>;

    /// Tear the pipeline down. No events for `handle` may be emitted after
    /// this returns.
    fn destroy(&self, handle: EngineHandle);

    fn set_uri(&self, handle: EngineHandle, uri: &str, user: &str, pass: &str);
    fn play(&self, handle: EngineHandle);
    fn pause(&self, handle: EngineHandle);
    /// Return to the ready (stopped) state without destroying the pipeline.
    fn ready(&self, handle: EngineHandle);
    fn set_position(&self, handle: EngineHandle, position_ms: u64);

    fn bind_surface(&self, handle: EngineHandle, surface: SurfaceHandle);
    fn unbind_surface(&self, handle: EngineHandle);
}

/// Proof that the engine has been initialized for this process.
pub struct EngineBinding {
    engine: Arc<dyn Engine>,
    live: AtomicBool,
}

impl EngineBinding {
    /// Initialize `engine`. A failure here is fatal for playback and should
    /// be reported to the user once.
    pub fn initialize(engine: Arc<dyn Engine>) -> Result<Arc<Self>> {
        if let Err(e) = engine.initialize() {
            tracing::error!(error = %e, "engine binding failed");
            return Err(e);
        }
        tracing::info!("engine binding initialized");
        Ok(Arc::new(Self {
            engine,
            live: AtomicBool::new(true),
        }))
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Tear the binding down. Idempotent.
    pub fn shutdown(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.engine.shutdown();
            tracing::info!("engine binding shut down");
        }
    }
}

impl Drop for EngineBinding {
    fn drop(&mut self) {
        self.shutdown();
    }
}
