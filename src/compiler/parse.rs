//! Synchronous parse operations.
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::config::{self, UnknownKeys};
use crate::effects::{self, Parser};
use crate::error::{Direction, Error, ErrorKind};
use crate::operation::{Operation, ParseOperation};
use crate::schema::{Expected, Kind, ObjectShape, Schema};
use crate::{recursive, union};

const PARSING: Direction = Direction::Parsing;

/// Child parse operation inside a synchronous parent.
pub(crate) fn sync_child(schema: &Schema) -> Operation {
    match schema.parse_operation() {
        ParseOperation::Sync(op) => op,
        ParseOperation::Async(_) => Operation::failing(Error::parsing(ErrorKind::UnexpectedAsync)),
    }
}

pub(crate) fn compile(schema: &Schema) -> Operation {
    let expected = Expected::of(schema);
    match schema.classify() {
        Kind::Unknown | Kind::Json => Operation::noop(),
        Kind::Never => Operation::new(move |input| Err(Error::invalid_type(PARSING, expected.name(), &input))),
        Kind::Unit => Operation::new(move |input| match input {
            Value::Null => Ok(Value::Null),
            other => Err(Error::invalid_type(PARSING, expected.name(), &other)),
        }),
        Kind::String => Operation::new(move |input| match input {
            Value::String(_) => Ok(input),
            other => Err(Error::invalid_type(PARSING, expected.name(), &other)),
        }),
        Kind::Bool => Operation::new(move |input| match input {
            Value::Bool(_) => Ok(input),
            other => Err(Error::invalid_type(PARSING, expected.name(), &other)),
        }),
        Kind::Int => Operation::new(move |input| match as_int(&input) {
            Some(int) => Ok(Value::from(int)),
            None => Err(Error::invalid_type(PARSING, expected.name(), &input)),
        }),
        Kind::Float => Operation::new(move |input| match input {
            Value::Number(_) => Ok(input),
            other => Err(Error::invalid_type(PARSING, expected.name(), &other)),
        }),
        Kind::Literal(literal) => {
            let literal = literal.clone();
            Operation::new(move |input| {
                if literal.matches(&input) {
                    Ok(input)
                } else {
                    Err(Error::parsing(ErrorKind::InvalidLiteral { expected: literal.clone(), received: input }))
                }
            })
        }
        Kind::Array(item) => compile_array(sync_child(item), expected),
        Kind::Dict(item) => compile_dict(sync_child(item), expected),
        Kind::Object(shape) => compile_object(shape, expected),
        Kind::Tuple(items) => compile_tuple(items, expected),
        Kind::Option(inner) | Kind::Null(inner) | Kind::Nullable(inner) => {
            let inner = sync_child(inner);
            if inner.is_noop() {
                return Operation::noop();
            }
            Operation::new(move |input| match input {
                Value::Null => Ok(Value::Null),
                other => inner.run(other),
            })
        }
        Kind::Union(members) => union::compile_parse(members),
        Kind::JsonString(inner) => {
            let inner = sync_child(inner);
            Operation::new(move |input| inner.run(decode_json_string(input, expected.name())?))
        }
        Kind::Custom(custom) => match &custom.handlers.parser {
            Some(Parser::Sync(f)) => {
                let f = f.clone();
                Operation::new(move |input| f(input).map_err(|e| Error::from_user(e, PARSING)))
            }
            Some(Parser::Async(_)) => Operation::failing(Error::parsing(ErrorKind::UnexpectedAsync)),
            None => {
                tracing::warn!(name = %custom.name, "custom schema has no parser");
                Operation::failing(Error::parsing(ErrorKind::InvalidOperation(format!(
                    "The {} parser is missing",
                    custom.name
                ))))
            }
        },
        Kind::Transformed { base, effect } => effects::compile_parse(sync_child(base), effect),
        Kind::Recursive(reference) => recursive::compile_parse(schema, reference),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COMPOSITES
// ————————————————————————————————————————————————————————————————————————————

fn compile_array(item: Operation, expected: Expected) -> Operation {
    Operation::new(move |input| {
        let Value::Array(items) = input else {
            return Err(Error::invalid_type(PARSING, expected.name(), &input));
        };
        if item.is_noop() {
            return Ok(Value::Array(items));
        }
        let mut out = Vec::with_capacity(items.len());
        for (index, value) in items.into_iter().enumerate() {
            out.push(item.run(value).map_err(|e| e.prepend(index))?);
        }
        Ok(Value::Array(out))
    })
}

fn compile_dict(item: Operation, expected: Expected) -> Operation {
    Operation::new(move |input| {
        let Value::Object(entries) = input else {
            return Err(Error::invalid_type(PARSING, expected.name(), &input));
        };
        if item.is_noop() {
            return Ok(Value::Object(entries));
        }
        let mut out = Map::with_capacity(entries.len());
        for (key, value) in entries {
            let parsed = item.run(value).map_err(|e| e.prepend(key.as_str()))?;
            out.insert(key, parsed);
        }
        Ok(Value::Object(out))
    })
}

pub(crate) fn unknown_keys(shape: &ObjectShape) -> UnknownKeys {
    shape.unknown_keys.unwrap_or_else(|| config::global_config().unknown_keys)
}

fn compile_object(shape: &ObjectShape, expected: Expected) -> Operation {
    let fields: Rc<[(String, Operation)]> = shape
        .fields
        .iter()
        .map(|(name, field)| (name.clone(), sync_child(field)))
        .collect();
    let strict = unknown_keys(shape) == UnknownKeys::Strict;

    Operation::new(move |input| {
        let Value::Object(mut entries) = input else {
            return Err(Error::invalid_type(PARSING, expected.name(), &input));
        };
        let mut out = Map::with_capacity(fields.len());
        for (name, op) in fields.iter() {
            // a missing key reaches the field as `null`
            let value = entries.remove(name).unwrap_or(Value::Null);
            let parsed = op.run(value).map_err(|e| e.prepend(name.as_str()))?;
            out.insert(name.clone(), parsed);
        }
        if strict {
            if let Some(key) = entries.keys().next() {
                return Err(Error::parsing(ErrorKind::ExcessField(key.clone())));
            }
        }
        Ok(Value::Object(out))
    })
}

fn compile_tuple(items: &[Schema], expected: Expected) -> Operation {
    let ops: Rc<[Operation]> = items.iter().map(sync_child).collect();
    Operation::new(move |input| {
        let Value::Array(values) = input else {
            return Err(Error::invalid_type(PARSING, expected.name(), &input));
        };
        check_tuple_size(ops.len(), values.len(), PARSING)?;
        let mut out = Vec::with_capacity(values.len());
        for (index, (op, value)) in ops.iter().zip(values).enumerate() {
            out.push(op.run(value).map_err(|e| e.prepend(index))?);
        }
        Ok(Value::Array(out))
    })
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

pub(crate) fn check_tuple_size(expected: usize, received: usize, direction: Direction) -> Result<(), Error> {
    if expected == received {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::InvalidTupleSize { expected, received }, direction))
    }
}

/// 32-bit integers, including integral floats such as `3.0`.
pub(crate) fn as_int(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else { return None };
    let range = i64::from(i32::MIN)..=i64::from(i32::MAX);
    if let Some(int) = number.as_i64() {
        return range.contains(&int).then_some(int);
    }
    let float = number.as_f64()?;
    (float.fract() == 0.0 && float >= f64::from(i32::MIN) && float <= f64::from(i32::MAX)).then_some(float as i64)
}

pub(crate) fn decode_json_string(input: Value, expected: &str) -> Result<Value, Error> {
    let Value::String(text) = input else {
        return Err(Error::invalid_type(PARSING, expected, &input));
    };
    serde_json::from_str(&text).map_err(|e| Error::parsing(ErrorKind::OperationFailed(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ints_are_32_bit() {
        assert_eq!(as_int(&json!(3)), Some(3));
        assert_eq!(as_int(&json!(3.0)), Some(3));
        assert_eq!(as_int(&json!(3.5)), None);
        assert_eq!(as_int(&json!(2_147_483_648_i64)), None);
        assert_eq!(as_int(&json!("3")), None);
    }

    #[test]
    fn json_strings_decode_before_the_inner_schema() {
        assert_eq!(decode_json_string(json!("[1,2]"), "JsonString").unwrap(), json!([1, 2]));
        let error = decode_json_string(json!("[1,"), "JsonString").unwrap_err();
        assert!(matches!(error.kind, ErrorKind::OperationFailed(_)));
    }
}
