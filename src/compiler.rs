//! Operation compiler.
//!
//! Each node builds its parse and serialize operations lazily, on first use,
//! and keeps them in write-once cells: later calls (and every parent that
//! embeds the node) reuse the same operation. Children are compiled through
//! the same cells, so a shared sub-schema is compiled once no matter how many
//! parents it has.
//!
//! Parse compilation picks one of two shapes per node. A node with no
//! asynchronous leaf anywhere below it gets a plain [`Operation`]; otherwise
//! it gets a staged [`AsyncOperation`](crate::operation::AsyncOperation) that
//! runs all synchronous checks first and defers only the async leaves.
pub mod parse;
pub mod serialize;
pub mod staged;

use std::collections::HashSet;

use crate::schema::{Kind, Node, Schema};
use crate::operation::{Operation, ParseOperation};

impl Schema {
    /// The node's compiled parse operation, built on first call.
    pub fn parse_operation(&self) -> ParseOperation {
        self.0.parse.get_or_init(|| compile_parse(self)).clone()
    }

    /// The node's compiled serialize operation, built on first call.
    pub fn serialize_operation(&self) -> Operation {
        self.0.serialize.get_or_init(|| compile_serialize(self)).clone()
    }

    pub fn is_parse_compiled(&self) -> bool {
        self.0.parse.get().is_some()
    }

    pub fn is_serialize_compiled(&self) -> bool {
        self.0.serialize.get().is_some()
    }

    /// Whether parsing needs the async entry points: true when this node or
    /// anything reachable from it uses an async parser or refinement.
    ///
    /// Reads the compiled operation when there is one and otherwise walks the
    /// schema graph; it never compiles anything.
    pub fn is_async_parse(&self) -> bool {
        if let Some(op) = self.0.parse.get() {
            return op.is_async();
        }
        *self.0.is_async.get_or_init(|| reaches_async(self, &mut HashSet::new()))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Only the walk's root result is cached: below a recursive reference the
/// visited set can cut a path short, so intermediate answers are not final.
fn reaches_async(schema: &Schema, visited: &mut HashSet<*const Node>) -> bool {
    if let Some(cached) = schema.0.is_async.get() {
        return *cached;
    }
    if let Some(op) = schema.0.parse.get() {
        return op.is_async();
    }
    if !visited.insert(std::rc::Rc::as_ptr(&schema.0)) {
        return false;
    }
    match schema.classify() {
        Kind::Custom(custom) => custom.handlers.is_async(),
        Kind::Transformed { base, effect } => effect.is_async() || reaches_async(base, visited),
        Kind::Recursive(reference) => match reference.target() {
            Some(target) => reaches_async(&target, visited),
            None => false,
        },
        _ => schema.children().iter().any(|child| reaches_async(child, visited)),
    }
}

fn compile_parse(schema: &Schema) -> ParseOperation {
    let op = if schema.is_async_parse() {
        ParseOperation::Async(staged::compile(schema))
    } else {
        ParseOperation::Sync(parse::compile(schema))
    };
    tracing::trace!(
        kind = schema.classify().label(),
        is_async = op.is_async(),
        noop = op.is_noop(),
        "compiled parse operation"
    );
    op
}

fn compile_serialize(schema: &Schema) -> Operation {
    let op = serialize::compile(schema);
    tracing::trace!(
        kind = schema.classify().label(),
        noop = op.is_noop(),
        "compiled serialize operation"
    );
    op
}
