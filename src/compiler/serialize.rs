//! Serialize operations.
//!
//! The typed value already satisfies the schema, so most leaves serialize as
//! the shared no-op and a composite is a no-op when its children are.
use std::rc::Rc;

use serde_json::{Map, Value};

use super::parse::check_tuple_size;
use crate::effects;
use crate::error::{Direction, Error, ErrorKind};
use crate::operation::Operation;
use crate::schema::{Expected, Kind, ObjectShape, Schema};
use crate::{recursive, union};

const SERIALIZING: Direction = Direction::Serializing;

pub(crate) fn compile(schema: &Schema) -> Operation {
    let expected = Expected::of(schema);
    match schema.classify() {
        Kind::Unknown | Kind::Json | Kind::Unit | Kind::String | Kind::Bool | Kind::Int | Kind::Float => {
            Operation::noop()
        }
        Kind::Never => Operation::new(move |value| Err(Error::invalid_type(SERIALIZING, expected.name(), &value))),
        Kind::Literal(literal) => {
            let literal = literal.clone();
            Operation::new(move |value| {
                if literal.matches(&value) {
                    Ok(value)
                } else {
                    Err(Error::serializing(ErrorKind::InvalidLiteral { expected: literal.clone(), received: value }))
                }
            })
        }
        Kind::Array(item) => {
            let item = item.serialize_operation();
            if item.is_noop() {
                return Operation::noop();
            }
            Operation::new(move |value| {
                let Value::Array(items) = value else {
                    return Err(Error::invalid_type(SERIALIZING, expected.name(), &value));
                };
                let mut out = Vec::with_capacity(items.len());
                for (index, v) in items.into_iter().enumerate() {
                    out.push(item.run(v).map_err(|e| e.prepend(index))?);
                }
                Ok(Value::Array(out))
            })
        }
        Kind::Dict(item) => {
            let item = item.serialize_operation();
            if item.is_noop() {
                return Operation::noop();
            }
            Operation::new(move |value| {
                let Value::Object(entries) = value else {
                    return Err(Error::invalid_type(SERIALIZING, expected.name(), &value));
                };
                let mut out = Map::with_capacity(entries.len());
                for (key, v) in entries {
                    let serialized = item.run(v).map_err(|e| e.prepend(key.as_str()))?;
                    out.insert(key, serialized);
                }
                Ok(Value::Object(out))
            })
        }
        Kind::Object(shape) => compile_object(shape, expected),
        Kind::Tuple(items) => {
            let ops: Rc<[Operation]> = items.iter().map(Schema::serialize_operation).collect();
            if ops.iter().all(Operation::is_noop) {
                return Operation::noop();
            }
            Operation::new(move |value| {
                let Value::Array(values) = value else {
                    return Err(Error::invalid_type(SERIALIZING, expected.name(), &value));
                };
                check_tuple_size(ops.len(), values.len(), SERIALIZING)?;
                let mut out = Vec::with_capacity(values.len());
                for (index, (op, v)) in ops.iter().zip(values).enumerate() {
                    out.push(op.run(v).map_err(|e| e.prepend(index))?);
                }
                Ok(Value::Array(out))
            })
        }
        Kind::Option(inner) | Kind::Null(inner) | Kind::Nullable(inner) => {
            let inner = inner.serialize_operation();
            if inner.is_noop() {
                return Operation::noop();
            }
            Operation::new(move |value| match value {
                Value::Null => Ok(Value::Null),
                other => inner.run(other),
            })
        }
        Kind::Union(members) => union::compile_serialize(members),
        Kind::JsonString(inner) => {
            let inner = inner.serialize_operation();
            Operation::new(move |value| {
                let serialized = inner.run(value)?;
                Ok(Value::String(serialized.to_string()))
            })
        }
        Kind::Custom(custom) => match &custom.handlers.serializer {
            Some(f) => {
                let f = f.clone();
                Operation::new(move |value| f(value).map_err(|e| Error::from_user(e, SERIALIZING)))
            }
            None => {
                tracing::warn!(name = %custom.name, "custom schema has no serializer");
                Operation::failing(Error::serializing(ErrorKind::InvalidOperation(format!(
                    "The {} serializer is missing",
                    custom.name
                ))))
            }
        },
        Kind::Transformed { base, effect } => effects::compile_serialize(base.serialize_operation(), effect),
        Kind::Recursive(reference) => recursive::compile_serialize(schema, reference),
    }
}

/// Identity when every field is, unless an `option` field could drop its key.
fn compile_object(shape: &ObjectShape, expected: Expected) -> Operation {
    let fields: Rc<[(String, Operation, bool)]> = shape
        .fields
        .iter()
        .map(|(name, field)| {
            let omit_absent = matches!(field.classify(), Kind::Option(_));
            (name.clone(), field.serialize_operation(), omit_absent)
        })
        .collect();
    if fields.iter().all(|(_, op, omit_absent)| op.is_noop() && !omit_absent) {
        return Operation::noop();
    }

    Operation::new(move |value| {
        let Value::Object(mut entries) = value else {
            return Err(Error::invalid_type(SERIALIZING, expected.name(), &value));
        };
        let mut out = Map::with_capacity(fields.len());
        for (name, op, omit_absent) in fields.iter() {
            let v = entries.remove(name).unwrap_or(Value::Null);
            if *omit_absent && v.is_null() {
                continue;
            }
            let serialized = op.run(v).map_err(|e| e.prepend(name.as_str()))?;
            out.insert(name.clone(), serialized);
        }
        Ok(Value::Object(out))
    })
}
