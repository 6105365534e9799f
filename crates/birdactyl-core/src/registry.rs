//! Handler registry.
//!
//! The registry maps a call selector to its handler for each of the four
//! handler kinds, and keeps the registration metadata in registration order
//! for the info report.
//!
//! # Concurrency
//!
//! Exact lookups go through a [`DashMap`], so the steady-state read path
//! never contends on a global lock. Ordered metadata lives in a separate
//! `RwLock<Vec<_>>` that is only written during registration. Registration
//! may still happen while the plugin is serving (late registration through
//! the plugin context).
//!
//! # Duplicates
//!
//! Registering a selector twice replaces the handler in place and keeps the
//! original position in the metadata order. A warning is logged; it is not
//! an error.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::{Event, EventResult};
use crate::handler::{EventHandler, IntoOutcome, MixinHandler, RouteHandler, ScheduleHandler};
use crate::http::{Request, Response};
use crate::mixin::{Mixin, MixinContext, MixinResult};
use crate::routing::{RouteEntry, RouteInfo, route_key};

/// Schedule metadata reported to the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub id: String,
    /// Cron expression, interpreted by the panel.
    pub cron: String,
}

/// Mixin metadata reported to the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinInfo {
    pub target: String,
    pub priority: i32,
}

/// Point-in-time copy of every registration, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub events: Vec<String>,
    pub routes: Vec<RouteInfo>,
    pub schedules: Vec<ScheduleInfo>,
    pub mixins: Vec<MixinInfo>,
}

// ─── Table ────────────────────────────────────────────────────────────────────

/// Selector-keyed handlers plus their metadata in insertion order.
struct Table<H: ?Sized, M> {
    handlers: DashMap<String, Arc<H>>,
    order: RwLock<Vec<(String, M)>>,
}

impl<H: ?Sized, M: Clone> Table<H, M> {
    fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Inserts or replaces; returns true when a handler was replaced.
    fn insert(&self, key: String, meta: M, handler: Arc<H>) -> bool {
        let mut order = self.order.write();
        let replaced = self.handlers.insert(key.clone(), handler).is_some();
        match order.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = meta,
            None => order.push((key, meta)),
        }
        replaced
    }

    fn get(&self, key: &str) -> Option<Arc<H>> {
        self.handlers.get(key).map(|h| Arc::clone(h.value()))
    }

    fn metadata(&self) -> Vec<M> {
        self.order.read().iter().map(|(_, m)| m.clone()).collect()
    }

    fn len(&self) -> usize {
        self.handlers.len()
    }
}

// ─── Registry ─────────────────────────────────────────────────────────────────

/// Registry of every handler a plugin declares.
///
/// All methods take `&self`; the registry is shared as `Arc<Registry>`
/// between the plugin builder, the dispatcher and the plugin context.
pub struct Registry {
    events: Table<dyn EventHandler, String>,
    routes: Table<dyn RouteHandler, RouteEntry>,
    schedules: Table<dyn ScheduleHandler, ScheduleInfo>,
    mixins: Table<dyn MixinHandler, MixinInfo>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            events: Table::new(),
            routes: Table::new(),
            schedules: Table::new(),
            mixins: Table::new(),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers an event handler for an exact event type.
    pub fn on_event<F, R>(&self, event_type: impl Into<String>, handler: F)
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: IntoOutcome<EventResult>,
    {
        self.register_event(event_type, Arc::new(handler));
    }

    pub fn register_event(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_type = event_type.into();
        if self
            .events
            .insert(event_type.clone(), event_type.clone(), handler)
        {
            warn!(event = %event_type, "Duplicate event handler, last registration wins");
        } else {
            debug!(event = %event_type, "Registered event handler");
        }
    }

    /// Registers a route handler.
    ///
    /// `method` may be `*` for any method; a `path` ending in `*` matches by
    /// prefix.
    pub fn route<F, R>(&self, method: &str, path: &str, handler: F)
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: IntoOutcome<Response>,
    {
        self.register_route(method, path, Arc::new(handler));
    }

    pub fn register_route(&self, method: &str, path: &str, handler: Arc<dyn RouteHandler>) {
        let entry = RouteEntry::new(method, path);
        let key = entry.key();
        if self.routes.insert(key.clone(), entry, handler) {
            warn!(route = %key, "Duplicate route handler, last registration wins");
        } else {
            debug!(route = %key, "Registered route handler");
        }
    }

    /// Registers a schedule handler. The cron expression is reported to the
    /// panel, which decides when to fire it.
    pub fn schedule<F, R>(&self, id: impl Into<String>, cron: impl Into<String>, handler: F)
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoOutcome<()>,
    {
        self.register_schedule(id, cron, Arc::new(handler));
    }

    pub fn register_schedule(
        &self,
        id: impl Into<String>,
        cron: impl Into<String>,
        handler: Arc<dyn ScheduleHandler>,
    ) {
        let info = ScheduleInfo {
            id: id.into(),
            cron: cron.into(),
        };
        let id = info.id.clone();
        if self.schedules.insert(id.clone(), info, handler) {
            warn!(schedule = %id, "Duplicate schedule handler, last registration wins");
        } else {
            debug!(schedule = %id, "Registered schedule handler");
        }
    }

    /// Registers a mixin handler for a target.
    pub fn mixin<F, R>(&self, target: impl Into<String>, priority: i32, handler: F)
    where
        F: Fn(&mut MixinContext) -> R + Send + Sync + 'static,
        R: IntoOutcome<MixinResult>,
    {
        self.register_mixin_handler(target, priority, Arc::new(handler));
    }

    /// Registers a type implementing [`Mixin`] under its declared target.
    pub fn register_mixin<M: Mixin>(&self, mixin: M) {
        self.mixin(M::TARGET, M::PRIORITY, move |ctx: &mut MixinContext| {
            mixin.handle(ctx)
        });
    }

    pub fn register_mixin_handler(
        &self,
        target: impl Into<String>,
        priority: i32,
        handler: Arc<dyn MixinHandler>,
    ) {
        let info = MixinInfo {
            target: target.into(),
            priority,
        };
        let target = info.target.clone();
        if self.mixins.insert(target.clone(), info, handler) {
            warn!(
                mixin = %target,
                priority,
                "Mixin target registered twice, last registration wins"
            );
        } else {
            debug!(mixin = %target, priority, "Registered mixin handler");
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn event_handler(&self, event_type: &str) -> Option<Arc<dyn EventHandler>> {
        self.events.get(event_type)
    }

    pub fn schedule_handler(&self, id: &str) -> Option<Arc<dyn ScheduleHandler>> {
        self.schedules.get(id)
    }

    pub fn mixin_handler(&self, target: &str) -> Option<Arc<dyn MixinHandler>> {
        self.mixins.get(target)
    }

    /// Resolves a request to a route handler.
    ///
    /// Tries the exact `METHOD:path` key first, then scans routes in
    /// registration order and returns the first whose method and pattern
    /// accept the request.
    pub fn match_route(&self, method: &str, path: &str) -> Option<(RouteInfo, Arc<dyn RouteHandler>)> {
        let key = route_key(method, path);
        if let Some(handler) = self.routes.get(&key) {
            let info = RouteInfo {
                method: method.to_string(),
                path: path.to_string(),
            };
            return Some((info, handler));
        }

        let order = self.routes.order.read();
        order
            .iter()
            .filter(|(_, entry)| entry.matches(method, path))
            .find_map(|(key, entry)| {
                self.routes
                    .get(key)
                    .map(|handler| (entry.info().clone(), handler))
            })
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            events: self.events.metadata(),
            routes: self
                .routes
                .metadata()
                .into_iter()
                .map(|entry| entry.info().clone())
                .collect(),
            schedules: self.schedules.metadata(),
            mixins: self.mixins.metadata(),
        }
    }

    /// Total number of registered handlers across all kinds.
    pub fn len(&self) -> usize {
        self.events.len() + self.routes.len() + self.schedules.len() + self.mixins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
