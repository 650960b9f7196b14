//! Union resolution.
//!
//! Parsing is first-match-wins in declaration order. Members that carry a
//! discriminant (a literal, a variant, or an object with a literal field) are
//! indexed by it, so a parse only tries the members whose tag matches the input
//! plus the untagged ones; the order among those is still declaration order.
//! When nothing matches every member is tried so the aggregate error holds one
//! entry per member.
//!
//! Serializing picks candidates the same way, keyed on the typed-side tag.
//!
//! A member that is a bare recursive reference to the union itself (as in
//! `recursive(|this| union([this, int()]))`) could only re-enter the union
//! forever, so it compiles to a failing operation. A reference wrapped in
//! another schema (`option(this)`, say) is not detected and recurses without
//! bound on inputs no earlier member accepts.
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::FutureExt;
use serde_json::Value;

use crate::effects::Effect;
use crate::error::{Direction, Error, ErrorKind};
use crate::literal::Literal;
use crate::operation::{AsyncOperation, Deferred, Operation, ParseOperation, Staged};
use crate::schema::{Kind, Schema};

// ------------------------------- Dispatch --------------------------------- //

/// Where a member's discriminant lives: on the value itself or in a field.
type TagKey = (Option<String>, Literal);

#[derive(Debug, Default)]
struct Dispatch {
    fields: Vec<String>,
    by_tag: HashMap<TagKey, Vec<usize>>,
    untagged: Vec<usize>,
}

#[derive(Clone, Copy)]
enum Side {
    /// tag as it appears in raw input
    Input,
    /// tag as it appears in the typed value
    Output,
}

fn literal_tag(schema: &Schema, side: Side) -> Option<Literal> {
    match (schema.classify(), side) {
        (Kind::Literal(literal), _) => Some(literal.clone()),
        (Kind::Transformed { effect: Effect::Variant { external, .. }, .. }, Side::Input) => Some(external.clone()),
        (Kind::Transformed { effect: Effect::Variant { internal, .. }, .. }, Side::Output) => Some(internal.clone()),
        _ => None,
    }
    .filter(Literal::is_primitive)
}

fn member_tag(schema: &Schema, side: Side) -> Option<TagKey> {
    if let Some(literal) = literal_tag(schema, side) {
        return Some((None, literal));
    }
    match schema.classify() {
        Kind::Object(shape) => shape
            .fields
            .iter()
            .find_map(|(name, field)| literal_tag(field, side).map(|literal| (Some(name.clone()), literal))),
        // a catch may succeed whatever the input looks like
        Kind::Transformed { effect: Effect::Catch(_), base } => match side {
            Side::Input => None,
            Side::Output => member_tag(base, side),
        },
        Kind::Transformed { effect: Effect::Refine { .. }, base } => member_tag(base, side),
        Kind::Transformed { effect: Effect::Transform(_), base } => match side {
            Side::Input => member_tag(base, side),
            Side::Output => None,
        },
        Kind::Transformed { effect: Effect::Preprocess(_), base } => match side {
            Side::Input => None,
            Side::Output => member_tag(base, side),
        },
        _ => None,
    }
}

impl Dispatch {
    fn build(members: &[Schema], side: Side) -> Option<Dispatch> {
        let mut dispatch = Dispatch::default();
        for (index, member) in members.iter().enumerate() {
            match member_tag(member, side) {
                Some((field, literal)) => {
                    if let Some(name) = &field {
                        if !dispatch.fields.contains(name) {
                            dispatch.fields.push(name.clone());
                        }
                    }
                    dispatch.by_tag.entry((field, literal)).or_default().push(index);
                }
                None => dispatch.untagged.push(index),
            }
        }
        if dispatch.by_tag.is_empty() { None } else { Some(dispatch) }
    }

    /// Members worth trying for `value`, in declaration order.
    fn candidates(&self, value: &Value) -> Vec<usize> {
        let mut out = self.untagged.clone();
        if let Some(hits) = self.by_tag.get(&(None, Literal::from_value(value))) {
            out.extend_from_slice(hits);
        }
        if let Value::Object(map) = value {
            for name in &self.fields {
                // a missing field reaches the member's literal as `null`
                let tag = map.get(name).map(Literal::from_value).unwrap_or(Literal::Null);
                if let Some(hits) = self.by_tag.get(&(Some(name.clone()), tag)) {
                    out.extend_from_slice(hits);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

// ---------------------------- Self references ----------------------------- //

fn refers_back(member: &Schema, members: &[Schema]) -> bool {
    let Kind::Recursive(reference) = member.classify() else { return false };
    match reference.target().as_ref().map(Schema::classify) {
        Some(Kind::Union(others)) => {
            others.len() == members.len() && others.iter().zip(members).all(|(a, b)| a.ptr_eq(b))
        }
        _ => false,
    }
}

fn self_reference(direction: Direction) -> Error {
    tracing::warn!(?direction, "union member refers back to its own union");
    Error::new(ErrorKind::InvalidOperation("The union member refers back to the union itself".into()), direction)
}

// -------------------------------- Parse ----------------------------------- //

fn sync_parse_op(schema: &Schema, members: &[Schema]) -> Operation {
    if refers_back(schema, members) {
        return Operation::failing(self_reference(Direction::Parsing));
    }
    match schema.parse_operation() {
        ParseOperation::Sync(op) => op,
        ParseOperation::Async(_) => Operation::failing(Error::parsing(ErrorKind::UnexpectedAsync)),
    }
}

pub(crate) fn compile_parse(members: &[Schema]) -> Operation {
    let ops: Rc<[Operation]> = members.iter().map(|member| sync_parse_op(member, members)).collect();
    let dispatch = Dispatch::build(members, Side::Input);
    tracing::trace!(members = ops.len(), indexed = dispatch.is_some(), "compiled union parser");

    Operation::new(move |input| {
        let mut errors: Vec<Option<Error>> = vec![None; ops.len()];
        let mut tried = vec![false; ops.len()];

        // 1) tag-matching and untagged members
        if let Some(dispatch) = &dispatch {
            for index in dispatch.candidates(&input) {
                tried[index] = true;
                match ops[index].run(input.clone()) {
                    Ok(value) => return Ok(value),
                    Err(error) => errors[index] = Some(error),
                }
            }
        }

        // 2) everything not tried yet, in order
        for (index, op) in ops.iter().enumerate() {
            if tried[index] {
                continue;
            }
            match op.run(input.clone()) {
                Ok(value) => return Ok(value),
                Err(error) => errors[index] = Some(error),
            }
        }

        Err(Error::parsing(ErrorKind::InvalidUnion(errors.into_iter().flatten().collect())))
    })
}

/// Staged parse: members run their synchronous phase in order; the first one
/// that is ready with no pending member before it wins immediately. Otherwise
/// the pending members are awaited in order and the first success wins.
pub(crate) fn compile_staged(members: &[Schema]) -> AsyncOperation {
    let ops: Rc<[ParseOperation]> = members
        .iter()
        .map(|member| {
            if refers_back(member, members) {
                ParseOperation::Sync(Operation::failing(self_reference(Direction::Parsing)))
            } else {
                member.parse_operation()
            }
        })
        .collect();

    AsyncOperation::new(move |input| {
        let mut outcomes: Vec<Result<Deferred, Error>> = Vec::with_capacity(ops.len());
        for op in ops.iter() {
            match op.stage(input.clone()) {
                Err(error) => outcomes.push(Err(error)),
                Ok(Staged::Ready(value)) => {
                    if outcomes.iter().all(Result::is_err) {
                        return Ok(Staged::Ready(value));
                    }
                    outcomes.push(Ok(Staged::Ready(value).into_deferred()));
                    break;
                }
                Ok(Staged::Pending(deferred)) => outcomes.push(Ok(deferred)),
            }
        }

        if outcomes.iter().all(Result::is_err) {
            let errors = outcomes.into_iter().filter_map(Result::err).collect();
            return Err(Error::parsing(ErrorKind::InvalidUnion(errors)));
        }

        Ok(Staged::Pending(
            async move {
                let mut errors = Vec::with_capacity(outcomes.len());
                for outcome in outcomes {
                    match outcome {
                        Err(error) => errors.push(error),
                        Ok(deferred) => match deferred.await {
                            Ok(value) => return Ok(value),
                            Err(error) => errors.push(error),
                        },
                    }
                }
                Err(Error::parsing(ErrorKind::InvalidUnion(errors)))
            }
            .boxed_local(),
        ))
    })
}

// ------------------------------ Serialize --------------------------------- //

pub(crate) fn compile_serialize(members: &[Schema]) -> Operation {
    let ops: Rc<[Operation]> = members
        .iter()
        .map(|member| {
            if refers_back(member, members) {
                Operation::failing(self_reference(Direction::Serializing))
            } else {
                member.serialize_operation()
            }
        })
        .collect();
    let dispatch = Dispatch::build(members, Side::Output);

    Operation::new(move |value| {
        let candidates = match &dispatch {
            Some(dispatch) => dispatch.candidates(&value),
            None => (0..ops.len()).collect(),
        };
        if candidates.is_empty() {
            return Err(Error::serializing(ErrorKind::OperationFailed(
                "Can't serialize value: it doesn't match any union member".into(),
            )));
        }
        let mut errors = Vec::with_capacity(candidates.len());
        for index in candidates {
            match ops[index].run(value.clone()) {
                Ok(serialized) => return Ok(serialized),
                Err(error) => errors.push(error),
            }
        }
        match errors.len() {
            1 => Err(errors.remove(0)),
            _ => Err(Error::serializing(ErrorKind::InvalidUnion(errors))),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{literal, object, string};
    use serde_json::json;

    #[test]
    fn indexes_literal_and_object_tags() {
        let members = vec![
            literal("a"),
            object([("kind", literal("circle")), ("r", string())]),
            string(),
        ];
        let dispatch = Dispatch::build(&members, Side::Input).unwrap();
        assert_eq!(dispatch.untagged, vec![2]);
        assert_eq!(dispatch.candidates(&json!("a")), vec![0, 2]);
        assert_eq!(dispatch.candidates(&json!({"kind": "circle"})), vec![1, 2]);
        assert_eq!(dispatch.candidates(&json!({"kind": "square"})), vec![2]);
    }

    #[test]
    fn variants_are_tagged_differently_per_side() {
        let members = vec![crate::effects::variant("x", 1)];
        let input = Dispatch::build(&members, Side::Input).unwrap();
        let output = Dispatch::build(&members, Side::Output).unwrap();
        assert_eq!(input.candidates(&json!("x")), vec![0]);
        assert_eq!(output.candidates(&json!(1)), vec![0]);
        assert!(output.candidates(&json!("x")).is_empty());
    }
}
