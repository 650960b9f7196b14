//! Reflection: names, descriptive metadata, structural comparison and the
//! `inline` source exporter.
//!
//! Nodes are immutable, so the metadata setters return a copy of the node
//! with the new metadata. The copy shares whatever the original had already
//! compiled.
use std::fmt::Write as _;

use serde_json::Value;

use crate::config::UnknownKeys;
use crate::effects::{Check, Effect};
use crate::error::DefinitionError;
use crate::literal::Literal;
use crate::schema::{Kind, Metadata, Schema};

// ————————————————————————————————————————————————————————————————————————————
// NAMES
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Display name: the one set with [`Schema::set_name`], otherwise the
    /// structural name.
    pub fn name(&self) -> String {
        match &self.0.metadata.name {
            Some(name) => name.clone(),
            None => self.structural_name(),
        }
    }

    /// Name derived from the shape alone, e.g. `Array(Int)` or
    /// `{id: String, tags: Option(Array(String))}`. Used in error messages,
    /// so metadata never changes it.
    ///
    /// Rendered once per node and kept.
    pub fn structural_name(&self) -> String {
        self.0.structural_name.get_or_init(|| kind_name(&self.0.kind)).clone()
    }
}

pub(crate) fn kind_name(kind: &Kind) -> String {
    match kind {
        Kind::Never => "Never".into(),
        Kind::Unknown => "Unknown".into(),
        Kind::Unit => "Unit".into(),
        Kind::String => "String".into(),
        Kind::Bool => "Bool".into(),
        Kind::Int => "Int".into(),
        Kind::Float => "Float".into(),
        Kind::Json => "JSON".into(),
        Kind::Literal(literal) => literal.to_string(),
        Kind::Array(item) => format!("Array({})", item.structural_name()),
        Kind::Dict(item) => format!("Dict({})", item.structural_name()),
        Kind::Object(shape) => {
            let fields: Vec<String> = shape
                .fields
                .iter()
                .map(|(name, field)| format!("{name}: {}", field.structural_name()))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        Kind::Tuple(items) => {
            let items: Vec<String> = items.iter().map(Schema::structural_name).collect();
            format!("Tuple({})", items.join(", "))
        }
        Kind::Option(inner) => format!("Option({})", inner.structural_name()),
        Kind::Null(inner) => format!("Null({})", inner.structural_name()),
        Kind::Nullable(inner) => format!("Nullable({})", inner.structural_name()),
        Kind::Union(members) => {
            let members: Vec<String> = members.iter().map(Schema::structural_name).collect();
            members.join(" | ")
        }
        Kind::JsonString(inner) => format!("JsonString({})", inner.structural_name()),
        Kind::Custom(custom) => custom.name.clone(),
        Kind::Transformed { base, .. } => base.structural_name(),
        Kind::Recursive(_) => "Self".into(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// METADATA
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Copy of this schema under a display name. `self` is left as it was.
    pub fn set_name(&self, name: impl Into<String>) -> Schema {
        let name = name.into();
        self.with_updated_metadata(|metadata| metadata.name = Some(name))
    }

    pub fn describe(&self, description: impl Into<String>) -> Schema {
        let description = description.into();
        self.with_updated_metadata(|metadata| metadata.description = Some(description))
    }

    pub fn description(&self) -> Option<&str> {
        self.0.metadata.description.as_deref()
    }

    /// Mark the schema deprecated with a message for readers.
    pub fn deprecate(&self, message: impl Into<String>) -> Schema {
        let message = message.into();
        self.with_updated_metadata(|metadata| metadata.deprecation = Some(message))
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.0.metadata.deprecation.as_deref()
    }

    /// Attach a free-form entry; an existing entry under `key` is replaced.
    pub fn set_metadata(&self, key: impl Into<String>, value: Value) -> Schema {
        let key = key.into();
        self.with_updated_metadata(|metadata| {
            metadata.custom.insert(key, value);
        })
    }

    pub fn metadata_entry(&self, key: &str) -> Option<&Value> {
        self.0.metadata.custom.get(key)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.0.metadata
    }
}

// ————————————————————————————————————————————————————————————————————————————
// STRUCTURAL EQUALITY
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Equal kinds, children and metadata. Compiled operations are ignored.
    ///
    /// User closures have no equality of their own: two `custom`, `transform`,
    /// `preprocess` or `catch` nodes compare equal when their names (or
    /// refinement messages) do. Recursive references are not followed.
    pub fn structurally_eq(&self, other: &Schema) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.0.metadata != other.0.metadata {
            return false;
        }
        match (self.classify(), other.classify()) {
            (Kind::Never, Kind::Never)
            | (Kind::Unknown, Kind::Unknown)
            | (Kind::Unit, Kind::Unit)
            | (Kind::String, Kind::String)
            | (Kind::Bool, Kind::Bool)
            | (Kind::Int, Kind::Int)
            | (Kind::Float, Kind::Float)
            | (Kind::Json, Kind::Json)
            | (Kind::Recursive(_), Kind::Recursive(_)) => true,
            (Kind::Literal(a), Kind::Literal(b)) => a == b,
            (Kind::Array(a), Kind::Array(b))
            | (Kind::Dict(a), Kind::Dict(b))
            | (Kind::Option(a), Kind::Option(b))
            | (Kind::Null(a), Kind::Null(b))
            | (Kind::Nullable(a), Kind::Nullable(b))
            | (Kind::JsonString(a), Kind::JsonString(b)) => a.structurally_eq(b),
            (Kind::Object(a), Kind::Object(b)) => {
                a.unknown_keys == b.unknown_keys
                    && a.fields.len() == b.fields.len()
                    && a.fields
                        .iter()
                        .zip(&b.fields)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.structurally_eq(vb))
            }
            (Kind::Tuple(a), Kind::Tuple(b)) | (Kind::Union(a), Kind::Union(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structurally_eq(y))
            }
            (Kind::Custom(a), Kind::Custom(b)) => a.name == b.name,
            (Kind::Transformed { base: a, effect: ea }, Kind::Transformed { base: b, effect: eb }) => {
                same_effect(ea, eb) && a.structurally_eq(b)
            }
            _ => false,
        }
    }
}

fn same_effect(a: &Effect, b: &Effect) -> bool {
    match (a, b) {
        (Effect::Refine { message: ma, check: ca }, Effect::Refine { message: mb, check: cb }) => {
            ma == mb && matches!((ca, cb), (Check::Sync(_), Check::Sync(_)) | (Check::Async(_), Check::Async(_)))
        }
        (Effect::Variant { external: xa, internal: ia }, Effect::Variant { external: xb, internal: ib }) => {
            xa == xb && ia == ib
        }
        _ => a.name() == b.name(),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INLINE
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    /// Rust source of the constructor calls that rebuild this schema, e.g.
    /// `array(option(string())).describe("tags")`.
    ///
    /// Nodes built around user closures (`custom`, transforms, refinements,
    /// `preprocess`, `catch`) and recursive schemas have no source form.
    pub fn inline(&self) -> Result<String, DefinitionError> {
        let mut out = String::new();
        inline_into(self, &mut out)?;
        Ok(out)
    }
}

fn inline_into(schema: &Schema, out: &mut String) -> Result<(), DefinitionError> {
    match schema.classify() {
        Kind::Never => out.push_str("never()"),
        Kind::Unknown => out.push_str("unknown()"),
        Kind::Unit => out.push_str("unit()"),
        Kind::String => out.push_str("string()"),
        Kind::Bool => out.push_str("bool()"),
        Kind::Int => out.push_str("int()"),
        Kind::Float => out.push_str("float()"),
        Kind::Json => out.push_str("json()"),
        Kind::Literal(literal) => {
            out.push_str("literal(");
            out.push_str(&literal_source(literal));
            out.push(')');
        }
        Kind::Array(inner) => wrapped("array", inner, out)?,
        Kind::Dict(inner) => wrapped("dict", inner, out)?,
        Kind::Option(inner) => wrapped("option", inner, out)?,
        Kind::Null(inner) => wrapped("null", inner, out)?,
        Kind::Nullable(inner) => wrapped("nullable", inner, out)?,
        Kind::JsonString(inner) => wrapped("json_string", inner, out)?,
        Kind::Object(shape) => {
            if shape.fields.is_empty() {
                out.push_str("object(Vec::<(&str, Schema)>::new())");
            } else {
                out.push_str("object([");
                for (index, (name, field)) in shape.fields.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "({name:?}, ");
                    inline_into(field, out)?;
                    out.push(')');
                }
                out.push_str("])");
            }
            match shape.unknown_keys {
                Some(UnknownKeys::Strict) => out.push_str(".strict()"),
                Some(UnknownKeys::Strip) => out.push_str(".strip()"),
                None => {}
            }
        }
        Kind::Tuple(items) => sequence("tuple", items, out)?,
        Kind::Union(members) => sequence("union", members, out)?,
        Kind::Transformed { effect: Effect::Variant { external, internal }, .. } => {
            let _ = write!(out, "variant({}, {})", literal_source(external), literal_source(internal));
        }
        Kind::Transformed { effect, .. } => {
            return Err(DefinitionError::NotInlinable(effect.name().to_string()));
        }
        Kind::Custom(custom) => return Err(DefinitionError::NotInlinable(custom.name.clone())),
        Kind::Recursive(_) => return Err(DefinitionError::NotInlinable("recursive".into())),
    }
    inline_metadata(&schema.0.metadata, out);
    Ok(())
}

fn wrapped(constructor: &str, inner: &Schema, out: &mut String) -> Result<(), DefinitionError> {
    out.push_str(constructor);
    out.push('(');
    inline_into(inner, out)?;
    out.push(')');
    Ok(())
}

fn sequence(constructor: &str, items: &[Schema], out: &mut String) -> Result<(), DefinitionError> {
    out.push_str(constructor);
    out.push_str("([");
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push_str(", ");
        }
        inline_into(item, out)?;
    }
    out.push_str("])");
    Ok(())
}

fn inline_metadata(metadata: &Metadata, out: &mut String) {
    if let Some(name) = &metadata.name {
        let _ = write!(out, ".set_name({name:?})");
    }
    if let Some(description) = &metadata.description {
        let _ = write!(out, ".describe({description:?})");
    }
    if let Some(deprecation) = &metadata.deprecation {
        let _ = write!(out, ".deprecate({deprecation:?})");
    }
    for (key, value) in &metadata.custom {
        let _ = write!(out, ".set_metadata({key:?}, serde_json::json!({value}))");
    }
}

fn literal_source(literal: &Literal) -> String {
    match literal {
        Literal::Null => "()".into(),
        Literal::Bool(b) => b.to_string(),
        Literal::Number(n) => {
            let f = n.0;
            if f.is_nan() {
                "f64::NAN".into()
            } else if f.is_infinite() {
                if f > 0.0 { "f64::INFINITY".into() } else { "f64::NEG_INFINITY".into() }
            } else if f.fract() == 0.0 && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) {
                format!("{}", f as i64)
            } else {
                format!("{f:?}")
            }
        }
        Literal::String(s) => format!("{s:?}"),
        Literal::Json(value) => format!("serde_json::json!({value})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Handlers, variant};
    use crate::schema::*;
    use serde_json::json;

    #[test]
    fn structural_names_describe_the_shape() {
        let schema = object([("id", int()), ("tags", option(array(string())))]);
        assert_eq!(schema.structural_name(), "{id: Int, tags: Option(Array(String))}");
        assert_eq!(union([literal("a"), literal(1)]).structural_name(), r#""a" | 1"#);
    }

    #[test]
    fn set_name_does_not_change_the_structural_name() {
        let schema = int().set_name("Age");
        assert_eq!(schema.name(), "Age");
        assert_eq!(schema.structural_name(), "Int");
    }

    #[test]
    fn metadata_setters_leave_the_original_untouched() {
        let base = string();
        let described = base.describe("a label").deprecate("use `label2`").set_metadata("ui", json!({"w": 3}));
        assert!(!described.ptr_eq(&base));
        assert_eq!(described.description(), Some("a label"));
        assert_eq!(described.deprecation(), Some("use `label2`"));
        assert_eq!(described.metadata_entry("ui"), Some(&json!({"w": 3})));
        assert_eq!(base.metadata(), &Metadata::default());

        let first = base.describe("A");
        let second = base.describe("B");
        assert_eq!(first.description(), Some("A"));
        assert_eq!(second.description(), Some("B"));
    }

    #[test]
    fn parents_keep_the_child_they_were_built_with() {
        let child = int();
        let parent = object([("n", child.clone())]);
        let _renamed = child.set_name("Count");
        let Kind::Object(shape) = parent.classify() else { panic!("expected object") };
        assert_eq!(shape.field("n").map(Schema::name).as_deref(), Some("Int"));
    }

    #[test]
    fn copies_share_compiled_operations() {
        let schema = object([("a", array(int()))]);
        let parse = schema.parse_operation();
        let described = schema.describe("pairs");
        assert!(described.is_parse_compiled());
        assert!(parse.ptr_eq(&described.parse_operation()));
        assert!(!described.is_serialize_compiled());
    }

    #[test]
    fn structural_names_are_rendered_once() {
        let schema = tuple([int(), string()]);
        assert_eq!(schema.structural_name(), "Tuple(Int, String)");
        assert_eq!(schema.0.structural_name.get().map(String::as_str), Some("Tuple(Int, String)"));
    }

    #[test]
    fn structural_equality_ignores_compiled_operations() {
        let a = object([("a", array(int()))]);
        let b = object([("a", array(int()))]);
        a.parse_operation();
        assert!(a.structurally_eq(&b));
        assert!(!a.structurally_eq(&object([("a", array(float()))])));
        assert!(!a.structurally_eq(&b.describe("different")));
    }

    #[test]
    fn inline_renders_constructor_calls() {
        let schema = object([
            ("kind", literal("point")),
            ("xy", tuple([float(), float()])),
            ("label", nullable(string()).describe("shown on hover")),
        ])
        .strict();
        assert_eq!(
            schema.inline().unwrap(),
            r#"object([("kind", literal("point")), ("xy", tuple([float(), float()])), ("label", nullable(string()).describe("shown on hover"))]).strict()"#
        );
        assert_eq!(union([variant("on", true), literal(2.5)]).inline().unwrap(), r#"union([variant("on", true), literal(2.5)])"#);
    }

    #[test]
    fn closures_are_not_inlinable() {
        let schema = array(custom("Date", Handlers::new()));
        assert_eq!(schema.inline(), Err(DefinitionError::NotInlinable("Date".into())));
        let refined = int().refine("positive", |v| v.as_i64().is_some_and(|n| n > 0));
        assert_eq!(refined.inline(), Err(DefinitionError::NotInlinable("refine".into())));
    }
}
