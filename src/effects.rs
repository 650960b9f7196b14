//! Transform / refine / preprocess / catch / variant / default wrappers.
//!
//! Each wrapper is a new node around a base schema. On parse the wrapper runs
//! around the base's compiled operation in wrapping order (so a typical chain
//! is preprocess → base → transform → refine); on serialize the same wrappers
//! apply in reverse.
//!
//! User functions return `anyhow::Result<Value>`. A failure is reported as
//! [`ErrorKind::Custom`] unless the closure returned one of this crate's
//! [`Error`]s, which then propagates untouched.
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;

use crate::error::{Direction, Error, ErrorKind};
use crate::literal::Literal;
use crate::operation::{AsyncOperation, Operation, ParseOperation, Staged};
use crate::schema::{Kind, Schema, literal};

pub type SyncFn = Rc<dyn Fn(Value) -> anyhow::Result<Value>>;
pub type AsyncFn = Rc<dyn Fn(Value) -> LocalBoxFuture<'static, anyhow::Result<Value>>>;
pub type PredicateFn = Rc<dyn Fn(&Value) -> bool>;
pub type AsyncPredicateFn = Rc<dyn Fn(Value) -> LocalBoxFuture<'static, bool>>;
pub type FallbackFn = Rc<dyn Fn(&Error, &Value) -> Value>;
pub type DefaultFn = Rc<dyn Fn() -> Value>;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone)]
pub(crate) enum Parser {
    Sync(SyncFn),
    Async(AsyncFn),
}

/// Parse/serialize functions for `custom`, `transform` and `preprocess`.
///
/// Setting `parser` replaces an `async_parser` and vice versa. A direction
/// without a function cannot run: its operation fails with
/// [`ErrorKind::InvalidOperation`].
#[derive(Clone, Default)]
pub struct Handlers {
    pub(crate) parser: Option<Parser>,
    pub(crate) serializer: Option<SyncFn>,
}

impl Handlers {
    pub fn new() -> Self { Self::default() }

    pub fn parser(mut self, f: impl Fn(Value) -> anyhow::Result<Value> + 'static) -> Self {
        self.parser = Some(Parser::Sync(Rc::new(f)));
        self
    }

    pub fn async_parser<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + 'static,
    {
        self.parser = Some(Parser::Async(Rc::new(move |value| f(value).boxed_local())));
        self
    }

    pub fn serializer(mut self, f: impl Fn(Value) -> anyhow::Result<Value> + 'static) -> Self {
        self.serializer = Some(Rc::new(f));
        self
    }

    pub fn is_async(&self) -> bool {
        matches!(self.parser, Some(Parser::Async(_)))
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parser = match &self.parser {
            None => "none",
            Some(Parser::Sync(_)) => "sync",
            Some(Parser::Async(_)) => "async",
        };
        f.debug_struct("Handlers")
            .field("parser", &parser)
            .field("serializer", &self.serializer.is_some())
            .finish()
    }
}

/// Predicate behind a refinement.
#[derive(Clone)]
pub enum Check {
    Sync(PredicateFn),
    Async(AsyncPredicateFn),
}

#[derive(Clone)]
pub enum Effect {
    Transform(Handlers),
    Preprocess(Handlers),
    Refine { message: String, check: Check },
    Catch(FallbackFn),
    /// External literal on the wire, internal literal in the typed value.
    Variant { external: Literal, internal: Literal },
    /// Value for an absent (`null`) parse result.
    Default(DefaultFn),
}

impl Effect {
    pub fn is_async(&self) -> bool {
        match self {
            Effect::Transform(handlers) | Effect::Preprocess(handlers) => handlers.is_async(),
            Effect::Refine { check, .. } => matches!(check, Check::Async(_)),
            Effect::Catch(_) | Effect::Variant { .. } | Effect::Default(_) => false,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Effect::Transform(_) => "transform",
            Effect::Preprocess(_) => "preprocess",
            Effect::Refine { .. } => "refine",
            Effect::Catch(_) => "catch",
            Effect::Variant { .. } => "variant",
            Effect::Default(_) => "get_or",
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Transform(handlers) => f.debug_tuple("Transform").field(handlers).finish(),
            Effect::Preprocess(handlers) => f.debug_tuple("Preprocess").field(handlers).finish(),
            Effect::Refine { message, check } => f
                .debug_struct("Refine")
                .field("message", message)
                .field("async", &matches!(check, Check::Async(_)))
                .finish(),
            Effect::Catch(_) => f.write_str("Catch"),
            Effect::Variant { external, internal } => f
                .debug_struct("Variant")
                .field("external", external)
                .field("internal", internal)
                .finish(),
            Effect::Default(_) => f.write_str("Default"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    fn wrap(&self, effect: Effect) -> Schema {
        Schema::new(Kind::Transformed { base: self.clone(), effect })
    }

    /// Map the parsed value (and back, when a serializer is given).
    pub fn transform(&self, handlers: Handlers) -> Schema {
        self.wrap(Effect::Transform(handlers))
    }

    /// Adjust the raw input before this schema parses it (and the serialized
    /// output after, when a serializer is given).
    pub fn preprocess(&self, handlers: Handlers) -> Schema {
        self.wrap(Effect::Preprocess(handlers))
    }

    /// Validate without changing the value, in both directions.
    pub fn refine(&self, message: impl Into<String>, predicate: impl Fn(&Value) -> bool + 'static) -> Schema {
        self.wrap(Effect::Refine { message: message.into(), check: Check::Sync(Rc::new(predicate)) })
    }

    /// Validate asynchronously after parsing. Skipped on serialize.
    pub fn refine_async<F, Fut>(&self, message: impl Into<String>, predicate: F) -> Schema
    where
        F: Fn(Value) -> Fut + 'static,
        Fut: Future<Output = bool> + 'static,
    {
        let check = Check::Async(Rc::new(move |value| predicate(value).boxed_local()));
        self.wrap(Effect::Refine { message: message.into(), check })
    }

    /// Replace a parse failure of this schema with `fallback(error, input)`.
    pub fn catch(&self, fallback: impl Fn(&Error, &Value) -> Value + 'static) -> Schema {
        self.wrap(Effect::Catch(Rc::new(fallback)))
    }

    /// Parse an absent value as `default`. Meant for `option`, `null` and
    /// `nullable` schemas; serialize passes the value through unchanged.
    ///
    /// ```
    /// use serde_json::json;
    /// use shape_schema::{int, object, option};
    ///
    /// let schema = object([("retries", option(int()).get_or(json!(3)))]);
    /// assert_eq!(schema.parse(json!({})).unwrap(), json!({"retries": 3}));
    /// assert_eq!(schema.parse(json!({"retries": 5})).unwrap(), json!({"retries": 5}));
    /// ```
    pub fn get_or(&self, default: Value) -> Schema {
        self.get_or_with(move || default.clone())
    }

    /// Like [`Schema::get_or`], calling `default` for every absent value.
    pub fn get_or_with(&self, default: impl Fn() -> Value + 'static) -> Schema {
        self.wrap(Effect::Default(Rc::new(default)))
    }

    /// Parse this literal schema into `internal`; serialize `internal` back.
    /// Non-literal schemas are returned unchanged.
    pub fn variant(&self, internal: impl Into<Literal>) -> Schema {
        match self.classify() {
            Kind::Literal(external) => {
                let external = external.clone();
                self.wrap(Effect::Variant { external, internal: internal.into() })
            }
            _ => self.clone(),
        }
    }
}

/// Union member mapping the wire literal `external` to `internal`.
pub fn variant(external: impl Into<Literal>, internal: impl Into<Literal>) -> Schema {
    literal(external).variant(internal)
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILATION
// ————————————————————————————————————————————————————————————————————————————

fn missing_handler(effect: &str, direction: Direction) -> Error {
    let which = match direction {
        Direction::Parsing => "parser",
        Direction::Serializing => "serializer",
    };
    tracing::warn!(effect, which, "compiled an operation without its handler");
    Error::new(ErrorKind::InvalidOperation(format!("The {effect} {which} is missing")), direction)
}

fn refinement(message: &str, direction: Direction) -> Error {
    Error::new(ErrorKind::Refinement(message.to_string()), direction)
}

fn run_user(f: &SyncFn, value: Value, direction: Direction) -> Result<Value, Error> {
    f(value).map_err(|e| Error::from_user(e, direction))
}

fn defer_user(f: &AsyncFn, value: Value) -> LocalBoxFuture<'static, Result<Value, Error>> {
    let pending = f(value);
    async move { pending.await.map_err(|e| Error::from_user(e, Direction::Parsing)) }.boxed_local()
}

/// Synchronous parse of `effect` around the compiled `base`.
pub(crate) fn compile_parse(base: Operation, effect: &Effect) -> Operation {
    match effect {
        Effect::Transform(handlers) => match &handlers.parser {
            Some(Parser::Sync(f)) => {
                let f = f.clone();
                Operation::new(move |input| {
                    let value = base.run(input)?;
                    run_user(&f, value, Direction::Parsing)
                })
            }
            Some(Parser::Async(_)) => Operation::failing(Error::parsing(ErrorKind::UnexpectedAsync)),
            None => Operation::failing(missing_handler("transform", Direction::Parsing)),
        },
        Effect::Preprocess(handlers) => match &handlers.parser {
            Some(Parser::Sync(f)) => {
                let f = f.clone();
                Operation::new(move |input| base.run(run_user(&f, input, Direction::Parsing)?))
            }
            Some(Parser::Async(_)) => Operation::failing(Error::parsing(ErrorKind::UnexpectedAsync)),
            None => Operation::failing(missing_handler("preprocess", Direction::Parsing)),
        },
        Effect::Refine { message, check: Check::Sync(predicate) } => {
            let (message, predicate) = (message.clone(), predicate.clone());
            Operation::new(move |input| {
                let value = base.run(input)?;
                if predicate(&value) { Ok(value) } else { Err(refinement(&message, Direction::Parsing)) }
            })
        }
        // async checks only exist behind staged operations
        Effect::Refine { check: Check::Async(_), .. } => {
            Operation::failing(Error::parsing(ErrorKind::UnexpectedAsync))
        }
        Effect::Catch(fallback) => {
            let fallback = fallback.clone();
            Operation::new(move |input| match base.run(input.clone()) {
                Ok(value) => Ok(value),
                Err(error) => Ok(fallback(&error, &input)),
            })
        }
        Effect::Variant { internal, .. } => {
            let internal = internal.to_value();
            Operation::new(move |input| {
                base.run(input)?;
                Ok(internal.clone())
            })
        }
        Effect::Default(default) => {
            let default = default.clone();
            Operation::new(move |input| Ok(or_default(base.run(input)?, &default)))
        }
    }
}

fn or_default(value: Value, default: &DefaultFn) -> Value {
    if value.is_null() { default() } else { value }
}

/// Staged parse of `effect` around `base`, for schemas with async leaves.
pub(crate) fn compile_staged(base: ParseOperation, effect: &Effect) -> AsyncOperation {
    match effect {
        Effect::Transform(handlers) => match &handlers.parser {
            Some(Parser::Sync(f)) => {
                let f = f.clone();
                AsyncOperation::new(move |input| {
                    let f = f.clone();
                    base.stage(input)?.and_then(move |value| run_user(&f, value, Direction::Parsing))
                })
            }
            Some(Parser::Async(f)) => {
                let f = f.clone();
                AsyncOperation::new(move |input| {
                    let f = f.clone();
                    Ok(match base.stage(input)? {
                        Staged::Ready(value) => Staged::Pending(defer_user(&f, value)),
                        Staged::Pending(deferred) => Staged::Pending(
                            async move { defer_user(&f, deferred.await?).await }.boxed_local(),
                        ),
                    })
                })
            }
            None => failing_staged(missing_handler("transform", Direction::Parsing)),
        },
        Effect::Preprocess(handlers) => match &handlers.parser {
            Some(Parser::Sync(f)) => {
                let f = f.clone();
                AsyncOperation::new(move |input| base.stage(run_user(&f, input, Direction::Parsing)?))
            }
            // the base can only see the value once the preprocessor resolves
            Some(Parser::Async(f)) => {
                let f = f.clone();
                AsyncOperation::new(move |input| {
                    let preprocessed = defer_user(&f, input);
                    let base = base.clone();
                    Ok(Staged::Pending(
                        async move { base.stage(preprocessed.await?)?.into_deferred().await }.boxed_local(),
                    ))
                })
            }
            None => failing_staged(missing_handler("preprocess", Direction::Parsing)),
        },
        Effect::Refine { message, check } => {
            let message = message.clone();
            match check {
                Check::Sync(predicate) => {
                    let predicate = predicate.clone();
                    AsyncOperation::new(move |input| {
                        let (message, predicate) = (message.clone(), predicate.clone());
                        base.stage(input)?.and_then(move |value| {
                            if predicate(&value) { Ok(value) } else { Err(refinement(&message, Direction::Parsing)) }
                        })
                    })
                }
                Check::Async(predicate) => {
                    let predicate = predicate.clone();
                    AsyncOperation::new(move |input| {
                        let (message, predicate) = (message.clone(), predicate.clone());
                        let staged = base.stage(input)?;
                        Ok(Staged::Pending(
                            async move {
                                let value = staged.into_deferred().await?;
                                if predicate(value.clone()).await {
                                    Ok(value)
                                } else {
                                    Err(refinement(&message, Direction::Parsing))
                                }
                            }
                            .boxed_local(),
                        ))
                    })
                }
            }
        }
        Effect::Catch(fallback) => {
            let fallback = fallback.clone();
            AsyncOperation::new(move |input| match base.stage(input.clone()) {
                Err(error) => Ok(Staged::Ready(fallback(&error, &input))),
                Ok(Staged::Ready(value)) => Ok(Staged::Ready(value)),
                Ok(Staged::Pending(deferred)) => {
                    let fallback = fallback.clone();
                    Ok(Staged::Pending(
                        async move {
                            match deferred.await {
                                Ok(value) => Ok(value),
                                Err(error) => Ok(fallback(&error, &input)),
                            }
                        }
                        .boxed_local(),
                    ))
                }
            })
        }
        Effect::Variant { internal, .. } => {
            let internal = internal.to_value();
            AsyncOperation::new(move |input| {
                let internal = internal.clone();
                base.stage(input)?.and_then(move |_| Ok(internal))
            })
        }
        Effect::Default(default) => {
            let default = default.clone();
            AsyncOperation::new(move |input| {
                let default = default.clone();
                base.stage(input)?.and_then(move |value| Ok(or_default(value, &default)))
            })
        }
    }
}

fn failing_staged(error: Error) -> AsyncOperation {
    AsyncOperation::new(move |_| Err(error.clone()))
}

/// Serialize of `effect` around the compiled base serializer.
pub(crate) fn compile_serialize(base: Operation, effect: &Effect) -> Operation {
    match effect {
        Effect::Transform(handlers) => match &handlers.serializer {
            Some(f) => {
                let f = f.clone();
                Operation::new(move |value| base.run(run_user(&f, value, Direction::Serializing)?))
            }
            None => Operation::failing(missing_handler("transform", Direction::Serializing)),
        },
        Effect::Preprocess(handlers) => match &handlers.serializer {
            Some(f) => {
                let f = f.clone();
                Operation::new(move |value| {
                    let serialized = base.run(value)?;
                    run_user(&f, serialized, Direction::Serializing)
                })
            }
            None => Operation::failing(missing_handler("preprocess", Direction::Serializing)),
        },
        Effect::Refine { message, check: Check::Sync(predicate) } => {
            let (message, predicate) = (message.clone(), predicate.clone());
            Operation::new(move |value| {
                if !predicate(&value) {
                    return Err(refinement(&message, Direction::Serializing));
                }
                base.run(value)
            })
        }
        Effect::Refine { check: Check::Async(_), .. } | Effect::Catch(_) | Effect::Default(_) => base,
        Effect::Variant { external, internal } => {
            let (external, internal) = (external.clone(), internal.clone());
            Operation::new(move |value| {
                if internal.matches(&value) {
                    base.run(external.to_value())
                } else {
                    Err(Error::serializing(ErrorKind::InvalidLiteral { expected: internal.clone(), received: value }))
                }
            })
        }
    }
}
