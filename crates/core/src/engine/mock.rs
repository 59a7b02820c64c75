//! Recording engine for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{Engine, EngineHandle, EventSink, SurfaceHandle};
use crate::error::{Result, ViewerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Create(EngineHandle),
    Destroy(EngineHandle),
    SetUri {
        handle: EngineHandle,
        uri: String,
        user: String,
        pass: String,
    },
    Play(EngineHandle),
    Pause(EngineHandle),
    Ready(EngineHandle),
    SetPosition(EngineHandle, u64),
    BindSurface(EngineHandle, SurfaceHandle),
    UnbindSurface(EngineHandle),
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    live: HashMap<EngineHandle, EventSink>,
    creates_left: Option<usize>,
}

/// Records every command and keeps the sink of each live pipeline so tests
/// can inject callbacks. Released handle values are handed out again,
/// lowest first.
pub(crate) struct MockEngine {
    state: Mutex<MockState>,
    fail_init: bool,
    initialized: AtomicBool,
    shutdowns: AtomicUsize,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fail_init: false,
            initialized: AtomicBool::new(false),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::new()
        }
    }

    /// Allow `n` more successful creates, then refuse.
    pub(crate) fn fail_creates_after(&self, n: usize) {
        self.state.lock().creates_left = Some(n);
    }

    pub(crate) fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.lock().calls)
    }

    pub(crate) fn sink(&self, handle: EngineHandle) -> Option<EventSink> {
        self.state.lock().live.get(&handle).cloned()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub(crate) fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

impl Engine for MockEngine {
    fn initialize(&self) -> Result<()> {
        if self.fail_init {
            return Err(ViewerError::EngineInit("mock refused".into()));
        }
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(ViewerError::BindingAlreadyInitialized);
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn create(&self, sink: EventSink) -> Result<EngineHandle> {
        let mut state = self.state.lock();
        if let Some(left) = state.creates_left.as_mut() {
            if *left == 0 {
                return Err(ViewerError::EngineCreate {
                    slot: state.live.len(),
                    reason: "mock out of pipelines".into(),
                });
            }
            *left -= 1;
        }
        let handle = (1..)
            .map(EngineHandle)
            .find(|h| !state.live.contains_key(h))
            .unwrap_or(EngineHandle(0));
        state.live.insert(handle, sink);
        state.calls.push(Call::Create(handle));
        Ok(handle)
    }

    fn destroy(&self, handle: EngineHandle) {
        let mut state = self.state.lock();
        state.live.remove(&handle);
        state.calls.push(Call::Destroy(handle));
    }

    fn set_uri(&self, handle: EngineHandle, uri: &str, user: &str, pass: &str) {
        self.record(Call::SetUri {
            handle,
            uri: uri.to_string(),
            user: user.to_string(),
            pass: pass.to_string(),
        });
    }

    fn play(&self, handle: EngineHandle) {
        self.record(Call::Play(handle));
    }

    fn pause(&self, handle: EngineHandle) {
        self.record(Call::Pause(handle));
    }

    fn ready(&self, handle: EngineHandle) {
        self.record(Call::Ready(handle));
    }

    fn set_position(&self, handle: EngineHandle, position_ms: u64) {
        self.record(Call::SetPosition(handle, position_ms));
    }

    fn bind_surface(&self, handle: EngineHandle, surface: SurfaceHandle) {
        self.record(Call::BindSurface(handle, surface));
    }

    fn unbind_surface(&self, handle: EngineHandle) {
        self.record(Call::UnbindSurface(handle));
    }
}
