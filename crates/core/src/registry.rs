//! Fixed set of player sessions and the routing of engine events to them.
//!
//! Engine callbacks carry only the pipeline handle (plus the ticket of the
//! sink they were delivered through). The registry keeps the indirection
//! table `handle -> (slot, ticket)`:
//!
//! - an entry is inserted when a slot's pipeline is created;
//! - it is removed, before anything else can happen, when that pipeline is
//!   destroyed;
//! - an event resolves only if its handle is routed **and** its ticket matches
//!   the current activation of the slot.
//!
//! The second check keeps a late event from a destroyed pipeline off a fresh
//! pipeline that the engine happened to give the same handle value.
//!
//! The registry is owned by the dispatcher's processing loop and is never
//! touched from any other thread.

use std::collections::HashMap;

use crossbeam_channel::Sender;

use crate::config::PlayerConfiguration;
use crate::dispatcher::Message;
use crate::engine::{Engine, EngineHandle, EventSink, Ticket};
use crate::error::{Result, ViewerError};
use crate::session::{PlaybackSession, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Route {
    slot: usize,
    ticket: Ticket,
}

/// Owner of every [`PlaybackSession`], addressed by slot index.
pub struct SessionRegistry {
    sessions: Vec<PlaybackSession>,
    routes: HashMap<EngineHandle, Route>,
    active: usize,
}

impl SessionRegistry {
    /// Build one uninitialized session per configuration.
    pub fn new(configs: Vec<PlayerConfiguration>, active: usize) -> Self {
        let sessions = configs
            .into_iter()
            .enumerate()
            .map(|(id, config)| PlaybackSession::new(id, config))
            .collect();
        Self::from_sessions(sessions, active)
    }

    pub fn from_sessions(sessions: Vec<PlaybackSession>, active: usize) -> Self {
        let active = if active < sessions.len() { active } else { 0 };
        Self {
            sessions,
            routes: HashMap::new(),
            active,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn get(&self, slot: usize) -> Result<&PlaybackSession> {
        self.sessions.get(slot).ok_or(ViewerError::NoSuchSession(slot))
    }

    pub fn get_mut(&mut self, slot: usize) -> Result<&mut PlaybackSession> {
        self.sessions
            .get_mut(slot)
            .ok_or(ViewerError::NoSuchSession(slot))
    }

    pub fn active_session_mut(&mut self) -> &mut PlaybackSession {
        &mut self.sessions[self.active]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaybackSession> {
        self.sessions.iter()
    }

    /// Route transport commands to `slot`. Touches no session.
    pub fn select_active(&mut self, slot: usize) -> Result<()> {
        if slot >= self.sessions.len() {
            return Err(ViewerError::NoSuchSession(slot));
        }
        if self.active != slot {
            tracing::debug!(old = self.active, new = slot, "active player changed");
        }
        self.active = slot;
        Ok(())
    }

    /// Advance the active slot, wrapping around. Returns the new slot.
    pub fn cycle_active(&mut self) -> usize {
        let next = (self.active + 1) % self.sessions.len();
        tracing::debug!(old = self.active, new = next, "active player cycled");
        self.active = next;
        next
    }

    /// Allocate the engine pipeline of `slot` and route its events here.
    ///
    /// A slot that already owns a pipeline keeps it, along with the route
    /// its events resolve through.
    pub fn activate(
        &mut self,
        slot: usize,
        engine: &dyn Engine,
        tx: &Sender<Message>,
    ) -> Result<EngineHandle> {
        let session = self
            .sessions
            .get_mut(slot)
            .ok_or(ViewerError::NoSuchSession(slot))?;
        if let Some(handle) = session.handle() {
            tracing::debug!(%handle, slot, "already active");
            return Ok(handle);
        }
        let ticket = Ticket::next();
        let handle = session.create(engine, EventSink::new(tx.clone(), ticket))?;

        let route = Route { slot, ticket };
        if let Some(previous) = self.routes.insert(handle, route) {
            if previous.slot != slot {
                tracing::error!(%handle, previous = previous.slot, slot, "engine reused a live handle");
            }
        }
        tracing::debug!(%handle, slot, %ticket, routes = self.routes.len(), "handle registered");
        Ok(handle)
    }

    /// Map an engine event back to the slot it belongs to.
    pub fn resolve(&self, handle: EngineHandle, ticket: Ticket) -> Option<usize> {
        let route = self.routes.get(&handle)?;
        if route.ticket != ticket {
            tracing::debug!(%handle, stale = %ticket, current = %route.ticket, "stale activation");
            return None;
        }
        Some(route.slot)
    }

    /// Release the pipeline of `slot`. Its routing entry is gone before this
    /// returns, so queued events for the old handle will not resolve.
    pub fn destroy(&mut self, slot: usize, engine: &dyn Engine) -> Result<()> {
        let session = self
            .sessions
            .get_mut(slot)
            .ok_or(ViewerError::NoSuchSession(slot))?;
        if let Some(handle) = session.handle() {
            if self.routes.get(&handle).is_some_and(|r| r.slot == slot) {
                self.routes.remove(&handle);
                tracing::debug!(%handle, slot, routes = self.routes.len(), "handle unregistered");
            }
        }
        session.destroy(engine);
        Ok(())
    }

    /// Tear down the pipeline of `slot` and build a fresh one that carries
    /// over the configuration, position and playing intent.
    pub fn restart(
        &mut self,
        slot: usize,
        engine: &dyn Engine,
        tx: &Sender<Message>,
    ) -> Result<EngineHandle> {
        let carried = self.get(slot)?.suspended();
        let surface = self.get(slot)?.surface();
        self.destroy(slot, engine)?;

        self.sessions[slot] = PlaybackSession::resumed(slot, carried);
        if let Some(surface) = surface {
            self.sessions[slot].bind_surface(engine, surface)?;
        }
        self.activate(slot, engine, tx)
    }

    /// Destroy every live pipeline.
    pub fn destroy_all(&mut self, engine: &dyn Engine) {
        for slot in 0..self.sessions.len() {
            // Index is always in range here.
            let _ = self.destroy(slot, engine);
        }
    }

    /// Number of live sessions the user wants playing.
    pub fn playing_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.desired_playing() && s.state() != SessionState::Destroyed)
            .count()
    }

    pub fn configs(&self) -> Vec<PlayerConfiguration> {
        self.sessions.iter().map(|s| s.config().clone()).collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;

    fn registry(n: usize) -> SessionRegistry {
        SessionRegistry::new(
            (0..n)
                .map(|i| PlayerConfiguration::new(&format!("rtsp://cam/{i}")))
                .collect(),
            0,
        )
    }

    #[test]
    fn activate_routes_handle_to_slot() {
        let engine = MockEngine::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = registry(2);

        let h0 = reg.activate(0, &engine, &tx).unwrap();
        let h1 = reg.activate(1, &engine, &tx).unwrap();
        assert_ne!(h0, h1);

        let t0 = reg.get(0).unwrap().ticket().unwrap();
        let t1 = reg.get(1).unwrap().ticket().unwrap();
        assert_eq!(reg.resolve(h0, t0), Some(0));
        assert_eq!(reg.resolve(h1, t1), Some(1));
        assert_eq!(reg.resolve(h0, t1), None);
        assert_eq!(reg.resolve(EngineHandle(99), t0), None);
    }

    #[test]
    fn activating_twice_keeps_the_live_route() {
        let engine = MockEngine::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = registry(1);

        let first = reg.activate(0, &engine, &tx).unwrap();
        let ticket = reg.get(0).unwrap().ticket().unwrap();
        let second = reg.activate(0, &engine, &tx).unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.live_count(), 1);
        assert_eq!(reg.get(0).unwrap().ticket(), Some(ticket));
        assert_eq!(reg.resolve(first, ticket), Some(0));
        assert_eq!(reg.route_count(), 1);
    }

    #[test]
    fn destroy_invalidates_route() {
        let engine = MockEngine::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = registry(2);
        let h0 = reg.activate(0, &engine, &tx).unwrap();
        let t0 = reg.get(0).unwrap().ticket().unwrap();

        reg.destroy(0, &engine).unwrap();
        assert_eq!(reg.resolve(h0, t0), None);
        assert_eq!(reg.route_count(), 0);
        assert_eq!(reg.get(0).unwrap().state(), SessionState::Destroyed);
    }

    #[test]
    fn reused_handle_value_does_not_alias() {
        let engine = MockEngine::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = registry(1);

        let old = reg.activate(0, &engine, &tx).unwrap();
        let old_ticket = reg.get(0).unwrap().ticket().unwrap();
        let new = reg.restart(0, &engine, &tx).unwrap();
        let new_ticket = reg.get(0).unwrap().ticket().unwrap();

        // The mock hands the freed value straight back.
        assert_eq!(old, new);
        assert_eq!(reg.resolve(new, old_ticket), None);
        assert_eq!(reg.resolve(new, new_ticket), Some(0));
    }

    #[test]
    fn restart_carries_intent() {
        let engine = MockEngine::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = registry(1);
        reg.activate(0, &engine, &tx).unwrap();
        reg.get_mut(0).unwrap().on_initialized(&engine);
        reg.get_mut(0).unwrap().play(&engine).unwrap();
        reg.get_mut(0).unwrap().on_position(8_000, 16_000);

        reg.restart(0, &engine, &tx).unwrap();
        let session = reg.get(0).unwrap();
        assert_eq!(session.state(), SessionState::Initializing);
        assert!(session.desired_playing());
        assert_eq!(session.seek().reported_position_ms(), 8_000);
        assert_eq!(engine.live_count(), 1);
    }

    #[test]
    fn select_active_is_pure_routing() {
        let engine = MockEngine::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = registry(2);
        reg.activate(0, &engine, &tx).unwrap();
        reg.get_mut(0).unwrap().play(&engine).unwrap();
        engine.take_calls();

        reg.select_active(1).unwrap();
        assert_eq!(reg.active(), 1);
        assert!(reg.get(0).unwrap().desired_playing());
        assert!(engine.take_calls().is_empty());
        assert!(matches!(
            reg.select_active(2),
            Err(ViewerError::NoSuchSession(2))
        ));
        assert_eq!(reg.active(), 1);
    }

    #[test]
    fn cycle_wraps() {
        let mut reg = registry(2);
        assert_eq!(reg.cycle_active(), 1);
        assert_eq!(reg.cycle_active(), 0);
    }

    #[test]
    fn playing_count_ignores_destroyed() {
        let engine = MockEngine::new();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut reg = registry(2);
        reg.activate(0, &engine, &tx).unwrap();
        reg.activate(1, &engine, &tx).unwrap();
        reg.get_mut(0).unwrap().play(&engine).unwrap();
        reg.get_mut(1).unwrap().play(&engine).unwrap();
        assert_eq!(reg.playing_count(), 2);
        reg.destroy(1, &engine).unwrap();
        assert_eq!(reg.playing_count(), 1);
    }
}
