//! The unit of deferred work produced by dispatch.
use std::fmt;

/// A resolved, executable action.
///
/// All configuration is captured when the directive is constructed; the
/// consumer only ever calls [`execute`](Directive::execute) or
/// [`describe`](Directive::describe), once.
pub trait Directive: Send + fmt::Debug {
    /// Perform the action, returning whether it succeeded.
    ///
    /// Failures are logged by the implementation; the return value is only a
    /// signal to the caller (conditions use it, the install loop ignores it).
    fn execute(&self) -> bool;

    /// Human-readable dry-run rendering.
    fn describe(&self) -> String;
}

/// Owned trait object as sent through the pipeline channel.
pub type BoxedDirective = Box<dyn Directive>;
