//! The mixin interception protocol.
//!
//! A mixin is one hop of a pipeline the panel runs across every plugin that
//! registered for a target. Each hop sees the current input plus opaque
//! chain data and answers with exactly one of three decisions:
//!
//! - `NEXT`: continue, optionally with a modified input
//! - `RETURN`: stop here and use the output as the final answer
//! - `ERROR`: abort and surface the message to the initiator
//!
//! ```rust,ignore
//! plugin.mixin(targets::SERVER_CREATE, |ctx: &mut MixinContext| {
//!     if ctx.get_int("memory") > 8192 {
//!         return ctx.error("memory limit exceeded");
//!     }
//!     let name = ctx.get_str("name").to_uppercase();
//!     ctx.set("name", name);
//!     ctx.next()
//! });
//! ```
//!
//! Stateful handlers can be written as types implementing [`Mixin`]:
//!
//! ```rust,ignore
//! struct DenyDelete;
//!
//! impl Mixin for DenyDelete {
//!     const TARGET: &'static str = targets::SERVER_DELETE;
//!     const PRIORITY: i32 = 10;
//!
//!     fn handle(&self, ctx: &mut MixinContext) -> MixinResult {
//!         ctx.error("deletion is disabled")
//!     }
//! }
//!
//! plugin.register_mixin(DenyDelete);
//! ```

mod context;
mod result;
pub mod targets;

pub use context::MixinContext;
pub use result::{MixinAction, MixinResult, Notification, RESULT_KEY};

/// A mixin handler declared as a type.
///
/// The target and priority are associated constants, so a type registers
/// for exactly one target.
pub trait Mixin: Send + Sync + 'static {
    /// The target this mixin intercepts.
    const TARGET: &'static str;

    /// Ordering hint reported to the panel. Not enforced locally.
    const PRIORITY: i32 = 0;

    fn handle(&self, ctx: &mut MixinContext) -> MixinResult;
}
