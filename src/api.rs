//! Parse and serialize entry points.
//!
//! Every entry point goes through the node's cached operation. The `_or_raise`
//! forms panic with the structured [`Error`] itself as the payload
//! (`std::panic::panic_any`), so a caller catching the unwind can downcast it
//! and inspect kind and path.
use futures::future::{self, FutureExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Direction, Error, ErrorKind};
use crate::operation::{Deferred, ParseOperation};
use crate::path_de;
use crate::schema::Schema;

fn raise<T>(result: Result<T, Error>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => std::panic::panic_any(error),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PARSE
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Parse an unknown value. Fails with [`ErrorKind::UnexpectedAsync`] when
    /// the schema needs [`Schema::parse_async`].
    pub fn parse(&self, input: Value) -> Result<Value, Error> {
        match self.parse_operation() {
            ParseOperation::Sync(op) => op.run(input),
            ParseOperation::Async(_) => Err(Error::parsing(ErrorKind::UnexpectedAsync)),
        }
    }

    /// # Panics
    ///
    /// With the [`Error`] as payload when parsing fails.
    pub fn parse_or_raise(&self, input: Value) -> Value {
        raise(self.parse(input))
    }

    /// Parse any serializable Rust value.
    pub fn parse_any<T: Serialize + ?Sized>(&self, input: &T) -> Result<Value, Error> {
        self.parse(path_de::to_unknown(input, Direction::Parsing)?)
    }

    /// # Panics
    ///
    /// With the [`Error`] as payload when conversion or parsing fails.
    pub fn parse_any_or_raise<T: Serialize + ?Sized>(&self, input: &T) -> Value {
        raise(self.parse_any(input))
    }

    /// Parse JSON text. Malformed text fails with [`ErrorKind::OperationFailed`].
    pub fn parse_json(&self, text: &str) -> Result<Value, Error> {
        let input: Value = serde_json::from_str(text)
            .map_err(|e| Error::parsing(ErrorKind::OperationFailed(e.to_string())))?;
        self.parse(input)
    }

    /// # Panics
    ///
    /// With the [`Error`] as payload when the text is malformed or parsing fails.
    pub fn parse_json_or_raise(&self, text: &str) -> Value {
        raise(self.parse_json(text))
    }

    /// Parse, then deserialize the result into `T`.
    pub fn parse_into<T: DeserializeOwned>(&self, input: Value) -> Result<T, Error> {
        path_de::from_value_with_path(self.parse(input)?)
    }

    /// # Panics
    ///
    /// With the [`Error`] as payload when parsing or deserializing fails.
    pub fn parse_into_or_raise<T: DeserializeOwned>(&self, input: Value) -> T {
        raise(self.parse_into(input))
    }

    /// Parse with async leaves. All synchronous checks have run by the time
    /// the first async leaf is awaited; a synchronous failure resolves
    /// immediately.
    pub fn parse_async(&self, input: Value) -> Deferred {
        match self.parse_async_in_steps(input) {
            Ok(deferred) => deferred,
            Err(error) => future::ready(Err(error)).boxed_local(),
        }
    }

    pub fn parse_any_async<T: Serialize + ?Sized>(&self, input: &T) -> Deferred {
        match path_de::to_unknown(input, Direction::Parsing) {
            Ok(input) => self.parse_async(input),
            Err(error) => future::ready(Err(error)).boxed_local(),
        }
    }

    /// Two-step async parse: the synchronous phase runs now and its failure
    /// is returned directly; the remaining work is the returned future.
    pub fn parse_async_in_steps(&self, input: Value) -> Result<Deferred, Error> {
        Ok(self.parse_operation().stage(input)?.into_deferred())
    }

    pub fn parse_any_async_in_steps<T: Serialize + ?Sized>(&self, input: &T) -> Result<Deferred, Error> {
        self.parse_async_in_steps(path_de::to_unknown(input, Direction::Parsing)?)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SERIALIZE
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Serialize a typed value back to its unknown form.
    pub fn serialize(&self, value: Value) -> Result<Value, Error> {
        self.serialize_operation().run(value)
    }

    /// # Panics
    ///
    /// With the [`Error`] as payload when serializing fails.
    pub fn serialize_or_raise(&self, value: Value) -> Value {
        raise(self.serialize(value))
    }

    /// Serialize a Rust value through this schema.
    pub fn serialize_from<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value, Error> {
        self.serialize(path_de::to_unknown(value, Direction::Serializing)?)
    }

    /// # Panics
    ///
    /// With the [`Error`] as payload when conversion or serializing fails.
    pub fn serialize_from_or_raise<T: Serialize + ?Sized>(&self, value: &T) -> Value {
        raise(self.serialize_from(value))
    }

    /// Serialize to JSON text, pretty-printed with `indent` spaces when given.
    pub fn serialize_to_json(&self, value: Value, indent: Option<usize>) -> Result<String, Error> {
        let serialized = self.serialize(value)?;
        let failed = |e: serde_json::Error| Error::serializing(ErrorKind::OperationFailed(e.to_string()));
        match indent {
            None => serde_json::to_string(&serialized).map_err(failed),
            Some(width) => {
                let indent = " ".repeat(width);
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut out = Vec::new();
                let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
                serialized.serialize(&mut ser).map_err(failed)?;
                String::from_utf8(out).map_err(|e| Error::serializing(ErrorKind::OperationFailed(e.to_string())))
            }
        }
    }

    /// # Panics
    ///
    /// With the [`Error`] as payload when serializing fails.
    pub fn serialize_to_json_or_raise(&self, value: Value, indent: Option<usize>) -> String {
        raise(self.serialize_to_json(value, indent))
    }
}
