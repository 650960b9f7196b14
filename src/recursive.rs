//! Self-referential schemas.
//!
//! `recursive(build)` hands `build` a placeholder node whose target is filled
//! in once `build` returns. The placeholder holds a weak reference (the target
//! owns the placeholder through its children) and only looks the target up
//! when an operation actually runs, so compiling a cyclic schema never
//! re-enters itself and every recursive call goes through the target's one
//! cached operation.
use std::fmt;
use std::rc::{Rc, Weak};

use once_cell::unsync::OnceCell;

use crate::error::{Direction, Error, ErrorKind};
use crate::operation::{AsyncOperation, Operation, ParseOperation};
use crate::schema::{Kind, Node, Schema};

#[derive(Clone)]
pub struct RecursiveRef {
    slot: Rc<OnceCell<Weak<Node>>>,
}

impl RecursiveRef {
    /// The schema this placeholder stands for, once `recursive` has returned.
    pub fn target(&self) -> Option<Schema> {
        self.slot.get()?.upgrade().map(Schema)
    }

    pub fn is_resolved(&self) -> bool {
        self.target().is_some()
    }
}

impl fmt::Debug for RecursiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_resolved() { "resolved" } else { "unresolved" };
        write!(f, "RecursiveRef({state})")
    }
}

/// Build a schema that refers to itself.
///
/// ```
/// use shape_schema::{array, object, recursive, string};
///
/// let node = recursive(|node| object([("id", string()), ("children", array(node))]));
/// let tree = serde_json::json!({"id": "a", "children": [{"id": "b", "children": []}]});
/// assert_eq!(node.parse(tree.clone()).unwrap(), tree);
/// ```
///
/// The placeholder must sit below something that consumes input (a field,
/// an item) before it reaches its own target again. As a direct union member
/// it fails with [`ErrorKind::InvalidOperation`]; wrapped in another schema
/// that passes input through (`union([option(this), int()])`) it recurses
/// without bound on input no earlier member accepts.
pub fn recursive(build: impl FnOnce(Schema) -> Schema) -> Schema {
    let reference = RecursiveRef { slot: Rc::new(OnceCell::new()) };
    let placeholder = Schema::new(Kind::Recursive(reference.clone()));
    let schema = build(placeholder);
    // the slot is fresh, so this cannot already be set
    let _ = reference.slot.set(Rc::downgrade(&schema.0));
    tracing::debug!(resolved = reference.is_resolved(), "built recursive schema");
    schema
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILATION
// ————————————————————————————————————————————————————————————————————————————

fn dangling(direction: Direction) -> Error {
    Error::new(
        ErrorKind::InvalidOperation("The recursive schema reference doesn't resolve to a schema".into()),
        direction,
    )
}

/// `None` when the placeholder resolves to nothing usable (dropped target or
/// the placeholder itself).
fn usable_target(schema: &Schema, reference: &RecursiveRef) -> Option<Schema> {
    reference.target().filter(|target| !target.ptr_eq(schema))
}

pub(crate) fn compile_parse(schema: &Schema, reference: &RecursiveRef) -> Operation {
    if reference.slot.get().is_some() && usable_target(schema, reference).is_none() {
        return Operation::failing(dangling(Direction::Parsing));
    }
    let reference = reference.clone();
    Operation::new(move |input| match reference.target() {
        Some(target) => match target.parse_operation() {
            ParseOperation::Sync(op) => op.run(input),
            ParseOperation::Async(_) => Err(Error::parsing(ErrorKind::UnexpectedAsync)),
        },
        None => Err(dangling(Direction::Parsing)),
    })
}

pub(crate) fn compile_staged(schema: &Schema, reference: &RecursiveRef) -> AsyncOperation {
    if usable_target(schema, reference).is_none() {
        return AsyncOperation::new(|_| Err(dangling(Direction::Parsing)));
    }
    let reference = reference.clone();
    AsyncOperation::new(move |input| match reference.target() {
        Some(target) => target.parse_operation().stage(input),
        None => Err(dangling(Direction::Parsing)),
    })
}

pub(crate) fn compile_serialize(schema: &Schema, reference: &RecursiveRef) -> Operation {
    if reference.slot.get().is_some() && usable_target(schema, reference).is_none() {
        return Operation::failing(dangling(Direction::Serializing));
    }
    let reference = reference.clone();
    Operation::new(move |value| match reference.target() {
        Some(target) => target.serialize_operation().run(value),
        None => Err(dangling(Direction::Serializing)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{array, object, string};

    #[test]
    fn placeholder_resolves_to_the_built_schema() {
        let mut seen = None;
        let schema = recursive(|this| {
            seen = Some(this.clone());
            object([("children", array(this))])
        });
        let Some(placeholder) = seen else { panic!("builder not called") };
        let Kind::Recursive(reference) = placeholder.classify() else { panic!("expected placeholder") };
        assert!(reference.target().is_some_and(|t| t.ptr_eq(&schema)));
    }

    #[test]
    fn self_only_reference_fails_instead_of_looping() {
        let schema = recursive(|this| this);
        let error = schema.parse(serde_json::json!(1)).unwrap_err();
        assert!(matches!(error.kind, ErrorKind::InvalidOperation(_)));
    }
}
