//! Birdactyl Core - dispatch core for panel plugins.
//!
//! A plugin is a service the panel calls into. This crate contains
//! everything that decides what happens on such a call, independent of the
//! transport carrying it:
//!
//! - [`Registry`]: selector to handler maps for events, routes, schedules and mixins
//! - [`routing`]: exact and trailing-wildcard route matching
//! - [`mixin`]: the `NEXT` / `RETURN` / `ERROR` interception protocol
//! - [`Dispatcher`]: the [`PluginService`] implementation the transport serves
//! - [`ReadinessGate`]: one-shot latch opened by the first info call
//! - [`wire`]: request and response messages of the protocol
//!
//! ```rust,ignore
//! use birdactyl_core::{Dispatcher, PluginIdentity, Registry, MixinContext};
//!
//! let registry = Arc::new(Registry::new());
//! registry.mixin("server.create", 0, |ctx: &mut MixinContext| {
//!     let name = ctx.get_str("name").to_uppercase();
//!     ctx.set("name", name);
//!     ctx.next()
//! });
//!
//! let dispatcher = Dispatcher::new(PluginIdentity::new("my-plugin", "1.0.0"), registry);
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gate;
pub mod handler;
pub mod http;
pub mod mixin;
pub mod registry;
pub mod routing;
pub mod value;
pub mod wire;

pub use dispatcher::{Dispatcher, PluginIdentity, PluginService, panic_message};
pub use error::{DispatchError, DispatchResult, HandlerKind};
pub use event::{Event, EventResult};
pub use gate::ReadinessGate;
pub use handler::{EventHandler, IntoOutcome, MixinHandler, RouteHandler, ScheduleHandler};
pub use http::{Request, Response};
pub use mixin::{Mixin, MixinAction, MixinContext, MixinResult, Notification, targets};
pub use registry::{MixinInfo, Registry, RegistrySnapshot, ScheduleInfo};
pub use routing::{ANY_METHOD, RouteInfo};
pub use value::Payload;
