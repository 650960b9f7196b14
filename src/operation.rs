//! Compiled operations.
//!
//! An [`Operation`] is a plain `Value -> Result<Value, Error>` closure behind an
//! `Rc`, so cloning a handle never rebuilds anything. Operations that would be
//! the identity share one [`Operation::noop`] instance, which callers detect by
//! pointer identity with [`Operation::is_noop`].
//!
//! Parsing has a second shape for schemas with asynchronous leaves: an
//! [`AsyncOperation`] runs every synchronous check immediately and hands back a
//! [`Staged`] value whose pending part only runs when its future is polled.
use std::fmt;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::Value;

use crate::error::Error;

/// Second phase of a staged parse.
pub type Deferred = LocalBoxFuture<'static, Result<Value, Error>>;

type SyncFn = dyn Fn(Value) -> Result<Value, Error>;
type StagedFn = dyn Fn(Value) -> Result<Staged, Error>;

// ————————————————————————————————————————————————————————————————————————————
// SYNC
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone)]
pub struct Operation(Rc<SyncFn>);

fn noop_operation(input: Value) -> Result<Value, Error> {
    Ok(input)
}

thread_local! {
    static NOOP: Operation = Operation(Rc::new(noop_operation));
}

impl Operation {
    pub(crate) fn new(f: impl Fn(Value) -> Result<Value, Error> + 'static) -> Self {
        Operation(Rc::new(f))
    }

    /// An operation that fails with the same error on every call.
    pub(crate) fn failing(error: Error) -> Self {
        Operation::new(move |_| Err(error.clone()))
    }

    /// The shared identity operation.
    pub fn noop() -> Self {
        NOOP.with(Clone::clone)
    }

    pub fn is_noop(&self) -> bool {
        NOOP.with(|noop| Rc::ptr_eq(&noop.0, &self.0))
    }

    pub fn ptr_eq(&self, other: &Operation) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn run(&self, input: Value) -> Result<Value, Error> {
        (self.0)(input)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            f.write_str("Operation(noop)")
        } else {
            f.write_str("Operation(..)")
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ASYNC
// ————————————————————————————————————————————————————————————————————————————

/// Outcome of the synchronous phase of an async parse.
pub enum Staged {
    Ready(Value),
    Pending(Deferred),
}

impl Staged {
    pub fn is_ready(&self) -> bool {
        matches!(self, Staged::Ready(_))
    }

    pub fn into_deferred(self) -> Deferred {
        match self {
            Staged::Ready(value) => future::ready(Ok(value)).boxed_local(),
            Staged::Pending(deferred) => deferred,
        }
    }

    /// Apply `f` to the eventual value: immediately when ready, after the
    /// pending part resolves otherwise.
    pub(crate) fn and_then(self, f: impl FnOnce(Value) -> Result<Value, Error> + 'static) -> Result<Staged, Error> {
        match self {
            Staged::Ready(value) => f(value).map(Staged::Ready),
            Staged::Pending(deferred) => Ok(Staged::Pending(
                async move { f(deferred.await?) }.boxed_local(),
            )),
        }
    }

    /// Rewrite an error coming out of the pending part. Ready values pass.
    pub(crate) fn map_pending_err(self, f: impl FnOnce(Error) -> Error + 'static) -> Staged {
        match self {
            Staged::Ready(value) => Staged::Ready(value),
            Staged::Pending(deferred) => Staged::Pending(deferred.map(|r| r.map_err(f)).boxed_local()),
        }
    }
}

impl fmt::Debug for Staged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staged::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Staged::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

#[derive(Clone)]
pub struct AsyncOperation(Rc<StagedFn>);

impl AsyncOperation {
    pub(crate) fn new(f: impl Fn(Value) -> Result<Staged, Error> + 'static) -> Self {
        AsyncOperation(Rc::new(f))
    }

    pub fn ptr_eq(&self, other: &AsyncOperation) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn run(&self, input: Value) -> Result<Staged, Error> {
        (self.0)(input)
    }
}

impl fmt::Debug for AsyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncOperation(..)")
    }
}

/// Compiled parse operation of a node: plain for fully synchronous schemas,
/// staged when anything below needs to await.
#[derive(Clone, Debug)]
pub enum ParseOperation {
    Sync(Operation),
    Async(AsyncOperation),
}

impl ParseOperation {
    pub fn is_async(&self) -> bool {
        matches!(self, ParseOperation::Async(_))
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, ParseOperation::Sync(op) if op.is_noop())
    }

    pub fn ptr_eq(&self, other: &ParseOperation) -> bool {
        match (self, other) {
            (ParseOperation::Sync(a), ParseOperation::Sync(b)) => a.ptr_eq(b),
            (ParseOperation::Async(a), ParseOperation::Async(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Run the synchronous phase. Sync operations are always ready.
    pub fn stage(&self, input: Value) -> Result<Staged, Error> {
        match self {
            ParseOperation::Sync(op) => op.run(input).map(Staged::Ready),
            ParseOperation::Async(op) => op.run(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn noop_is_shared() {
        let a = Operation::noop();
        let b = Operation::noop();
        assert!(a.ptr_eq(&b));
        assert!(a.is_noop());
        assert!(!Operation::new(Ok).is_noop());
        assert_eq!(a.run(json!({"x": 1})).unwrap(), json!({"x": 1}));
    }

    #[test]
    fn staged_and_then_defers_on_pending() {
        let pending = Staged::Pending(future::ready(Ok(json!(2))).boxed_local());
        let mapped = pending.and_then(|v| Ok(json!(v.as_i64().unwrap() * 10))).unwrap();
        assert!(!mapped.is_ready());
        assert_eq!(block_on(mapped.into_deferred()).unwrap(), json!(20));
    }

    #[test]
    fn pending_errors_can_be_rewritten() {
        let failing = Staged::Pending(
            future::ready(Err(Error::parsing(ErrorKind::Custom("late".into())))).boxed_local(),
        );
        let error = block_on(failing.map_pending_err(|e| e.prepend("field")).into_deferred()).unwrap_err();
        assert_eq!(error.path.to_string(), r#"["field"]"#);
    }
}
