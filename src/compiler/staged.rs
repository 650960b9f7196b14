//! Staged (async) parse operations.
//!
//! Only nodes with an async leaf somewhere below get here. Every synchronous
//! check (types, literals, tuple sizes, sync children) runs while the staged
//! operation is called; what is left are the pending children, which are
//! joined when the returned future is polled. A pending child's error gets the
//! child's segment inside its own future, so it is prefixed exactly once.
use std::rc::Rc;

use futures::future::{FutureExt, join_all};
use serde_json::{Map, Value};

use super::parse::{check_tuple_size, decode_json_string, unknown_keys};
use crate::config::UnknownKeys;
use crate::effects::{self, Parser};
use crate::error::{Direction, Error, ErrorKind};
use crate::operation::{AsyncOperation, Deferred, ParseOperation, Staged};
use crate::path::Segment;
use crate::schema::{Expected, Kind, ObjectShape, Schema};
use crate::{recursive, union};

const PARSING: Direction = Direction::Parsing;

pub(crate) fn compile(schema: &Schema) -> AsyncOperation {
    let expected = Expected::of(schema);
    match schema.classify() {
        Kind::Array(item) => {
            let item = item.parse_operation();
            AsyncOperation::new(move |input| {
                let Value::Array(items) = input else {
                    return Err(Error::invalid_type(PARSING, expected.name(), &input));
                };
                let mut slots = Slots::with_capacity(items.len());
                for (index, value) in items.into_iter().enumerate() {
                    slots.push(index, item.stage(value))?;
                }
                Ok(slots.finish(Value::Array))
            })
        }
        Kind::Dict(item) => {
            let item = item.parse_operation();
            AsyncOperation::new(move |input| {
                let Value::Object(entries) = input else {
                    return Err(Error::invalid_type(PARSING, expected.name(), &input));
                };
                let mut keys = Vec::with_capacity(entries.len());
                let mut slots = Slots::with_capacity(entries.len());
                for (key, value) in entries {
                    slots.push(key.as_str(), item.stage(value))?;
                    keys.push(key);
                }
                Ok(slots.finish(move |values| Value::Object(keys.into_iter().zip(values).collect())))
            })
        }
        Kind::Object(shape) => compile_object(shape, expected),
        Kind::Tuple(items) => {
            let ops: Rc<[ParseOperation]> = items.iter().map(Schema::parse_operation).collect();
            AsyncOperation::new(move |input| {
                let Value::Array(values) = input else {
                    return Err(Error::invalid_type(PARSING, expected.name(), &input));
                };
                check_tuple_size(ops.len(), values.len(), PARSING)?;
                let mut slots = Slots::with_capacity(values.len());
                for (index, (op, value)) in ops.iter().zip(values).enumerate() {
                    slots.push(index, op.stage(value))?;
                }
                Ok(slots.finish(Value::Array))
            })
        }
        Kind::Option(inner) | Kind::Null(inner) | Kind::Nullable(inner) => {
            let inner = inner.parse_operation();
            AsyncOperation::new(move |input| match input {
                Value::Null => Ok(Staged::Ready(Value::Null)),
                other => inner.stage(other),
            })
        }
        Kind::Union(members) => union::compile_staged(members),
        Kind::JsonString(inner) => {
            let inner = inner.parse_operation();
            AsyncOperation::new(move |input| inner.stage(decode_json_string(input, expected.name())?))
        }
        Kind::Custom(custom) => match &custom.handlers.parser {
            Some(Parser::Async(f)) => {
                let f = f.clone();
                AsyncOperation::new(move |input| {
                    let pending = f(input);
                    Ok(Staged::Pending(
                        async move { pending.await.map_err(|e| Error::from_user(e, PARSING)) }.boxed_local(),
                    ))
                })
            }
            _ => lift(super::parse::compile(schema)),
        },
        Kind::Transformed { base, effect } => effects::compile_staged(base.parse_operation(), effect),
        Kind::Recursive(reference) => recursive::compile_staged(schema, reference),
        // leaves are never async on their own
        _ => lift(super::parse::compile(schema)),
    }
}

fn lift(op: crate::operation::Operation) -> AsyncOperation {
    AsyncOperation::new(move |input| op.run(input).map(Staged::Ready))
}

fn compile_object(shape: &ObjectShape, expected: Expected) -> AsyncOperation {
    let fields: Rc<[(String, ParseOperation)]> = shape
        .fields
        .iter()
        .map(|(name, field)| (name.clone(), field.parse_operation()))
        .collect();
    let strict = unknown_keys(shape) == UnknownKeys::Strict;

    AsyncOperation::new(move |input| {
        let Value::Object(mut entries) = input else {
            return Err(Error::invalid_type(PARSING, expected.name(), &input));
        };
        let mut slots = Slots::with_capacity(fields.len());
        for (name, op) in fields.iter() {
            let value = entries.remove(name).unwrap_or(Value::Null);
            slots.push(name.as_str(), op.stage(value))?;
        }
        if strict {
            if let Some(key) = entries.keys().next() {
                return Err(Error::parsing(ErrorKind::ExcessField(key.clone())));
            }
        }
        let names: Vec<String> = fields.iter().map(|(name, _)| name.clone()).collect();
        Ok(slots.finish(move |values| {
            Value::Object(names.into_iter().zip(values).collect::<Map<String, Value>>())
        }))
    })
}

// ————————————————————————————————————————————————————————————————————————————
// SLOTS
// ————————————————————————————————————————————————————————————————————————————

/// Children's results in order, with pending ones filled in later.
struct Slots {
    values: Vec<Value>,
    pending: Vec<(usize, Deferred)>,
}

impl Slots {
    fn with_capacity(capacity: usize) -> Self {
        Slots { values: Vec::with_capacity(capacity), pending: Vec::new() }
    }

    /// Record one child's synchronous phase, failing fast with the child's
    /// segment prefixed.
    fn push(&mut self, segment: impl Into<Segment>, staged: Result<Staged, Error>) -> Result<(), Error> {
        let segment = segment.into();
        let staged = staged.map_err(|e| e.prepend(segment.clone()))?;
        match staged.map_pending_err(move |e| e.prepend(segment)) {
            Staged::Ready(value) => self.values.push(value),
            Staged::Pending(deferred) => {
                self.pending.push((self.values.len(), deferred));
                self.values.push(Value::Null);
            }
        }
        Ok(())
    }

    /// Ready when nothing is pending; otherwise a future that awaits all
    /// pending children and reports the first failure in child order.
    fn finish(self, build: impl FnOnce(Vec<Value>) -> Value + 'static) -> Staged {
        let Slots { mut values, pending } = self;
        if pending.is_empty() {
            return Staged::Ready(build(values));
        }
        let (positions, deferred): (Vec<usize>, Vec<Deferred>) = pending.into_iter().unzip();
        Staged::Pending(
            async move {
                let results = join_all(deferred).await;
                for (position, result) in positions.into_iter().zip(results) {
                    values[position] = result?;
                }
                Ok(build(values))
            }
            .boxed_local(),
        )
    }
}
