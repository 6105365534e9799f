//! Handler traits, one per call kind.
//!
//! Handlers are plain synchronous closures. They run on the blocking pool,
//! so a handler body may perform blocking I/O such as calls through the
//! blocking panel client without stalling other in-flight calls.
//!
//! Every closure of the right shape implements the matching trait:
//!
//! | kind | closure shape |
//! |---|---|
//! | [`EventHandler`] | `Fn(&Event) -> R` where `R: IntoOutcome<EventResult>` |
//! | [`RouteHandler`] | `Fn(&Request) -> R` where `R: IntoOutcome<Response>` |
//! | [`ScheduleHandler`] | `Fn() -> R` where `R: IntoOutcome<()>` |
//! | [`MixinHandler`] | `Fn(&mut MixinContext) -> R` where `R: IntoOutcome<MixinResult>` |
//!
//! `R` is either the value itself or a `Result` of it with any displayable
//! error, so handlers can use `?`:
//!
//! ```rust,ignore
//! registry.route("GET", "/motd", |_req: &Request| -> anyhow::Result<Response> {
//!     let motd = std::fs::read_to_string("motd.txt")?;
//!     Ok(Response::text(motd))
//! });
//! ```

use std::fmt::Display;

use crate::event::{Event, EventResult};
use crate::http::{Request, Response};
use crate::mixin::{MixinContext, MixinResult};

// ============================================================================
// IntoOutcome - Normalize handler return values
// ============================================================================

/// Conversion from a handler's return value into its outcome.
///
/// The error side is the rendered message; it becomes a handler fault for
/// that single call.
pub trait IntoOutcome<T> {
    fn into_outcome(self) -> Result<T, String>;
}

macro_rules! impl_into_outcome {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOutcome<$ty> for $ty {
                fn into_outcome(self) -> Result<$ty, String> {
                    Ok(self)
                }
            }

            impl<E: Display> IntoOutcome<$ty> for Result<$ty, E> {
                fn into_outcome(self) -> Result<$ty, String> {
                    self.map_err(|e| e.to_string())
                }
            }
        )*
    };
}

impl_into_outcome!(EventResult, Response, MixinResult, ());

// ============================================================================
// Handler traits
// ============================================================================

/// Decides whether the panel may proceed with an action.
pub trait EventHandler: Send + Sync + 'static {
    fn call(&self, event: &Event) -> Result<EventResult, String>;
}

impl<F, R> EventHandler for F
where
    F: Fn(&Event) -> R + Send + Sync + 'static,
    R: IntoOutcome<EventResult>,
{
    fn call(&self, event: &Event) -> Result<EventResult, String> {
        self(event).into_outcome()
    }
}

/// Serves a proxied HTTP request.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, request: &Request) -> Result<Response, String>;
}

impl<F, R> RouteHandler for F
where
    F: Fn(&Request) -> R + Send + Sync + 'static,
    R: IntoOutcome<Response>,
{
    fn call(&self, request: &Request) -> Result<Response, String> {
        self(request).into_outcome()
    }
}

/// Runs when the panel fires a schedule.
pub trait ScheduleHandler: Send + Sync + 'static {
    fn call(&self) -> Result<(), String>;
}

impl<F, R> ScheduleHandler for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoOutcome<()>,
{
    fn call(&self) -> Result<(), String> {
        self().into_outcome()
    }
}

/// Handles one hop of a mixin pipeline.
pub trait MixinHandler: Send + Sync + 'static {
    fn call(&self, ctx: &mut MixinContext) -> Result<MixinResult, String>;
}

impl<F, R> MixinHandler for F
where
    F: Fn(&mut MixinContext) -> R + Send + Sync + 'static,
    R: IntoOutcome<MixinResult>,
{
    fn call(&self, ctx: &mut MixinContext) -> Result<MixinResult, String> {
        self(ctx).into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_plain_and_fallible_closures() {
        let plain = |_e: &Event| EventResult::allow();
        let fallible = |_e: &Event| -> Result<EventResult, String> { Err("denied".into()) };

        let event = Event::new("server.start", HashMap::new(), true);
        assert!(EventHandler::call(&plain, &event).unwrap().is_allowed());
        assert_eq!(EventHandler::call(&fallible, &event).unwrap_err(), "denied");
    }

    #[test]
    fn test_unit_schedule() {
        let tick = || {};
        assert!(ScheduleHandler::call(&tick).is_ok());

        let failing = || -> Result<(), std::io::Error> {
            Err(std::io::Error::other("disk full"))
        };
        assert_eq!(ScheduleHandler::call(&failing).unwrap_err(), "disk full");
    }
}
