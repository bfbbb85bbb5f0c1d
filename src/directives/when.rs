//! `when`: dispatch a body only if a condition holds.
use tracing::warn;

use crate::condition;
use crate::context::Context;
use crate::dispatch::Dispatcher;
use crate::error::DottyError;
use crate::value::Value;

/// Constructor for `when`. The body shares the enclosing context.
///
/// # Errors
///
/// Propagates fatal errors from the body.
pub fn construct(dispatcher: &Dispatcher, ctx: &mut Context, args: &[Value]) -> Result<(), DottyError> {
    let [condition, body @ ..] = args else {
        warn!("Encountered :when directive with no body");
        return Ok(());
    };
    if body.is_empty() {
        warn!("Encountered :when directive with no body");
        return Ok(());
    }
    if condition::evaluate(dispatcher, ctx, condition) {
        dispatcher.dispatch_tree(ctx, body)?;
    }
    Ok(())
}
