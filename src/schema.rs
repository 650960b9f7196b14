//! Schema nodes and their constructors.
//!
//! A [`Schema`] is a cheap handle to an immutable node: its [`Kind`] (which
//! owns the child schemas) and its [`Metadata`] never change after
//! construction. The only mutable parts are the compiled-operation cells,
//! which the compiler fills at most once.
pub mod arr;
pub mod num;
pub mod str;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use serde_json::Value;

use crate::config::UnknownKeys;
use crate::effects::{Effect, Handlers};
use crate::error::DefinitionError;
use crate::literal::Literal;
use crate::operation::{Operation, ParseOperation};
use crate::recursive::RecursiveRef;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone)]
pub struct Schema(pub(crate) Rc<Node>);

pub(crate) struct Node {
    pub(crate) kind: Kind,
    pub(crate) metadata: Metadata,
    pub(crate) parse: OnceCell<ParseOperation>,
    pub(crate) serialize: OnceCell<Operation>,
    pub(crate) is_async: OnceCell<bool>,
    pub(crate) structural_name: OnceCell<String>,
    /// The node this one was copied from. A recursive placeholder may point
    /// at it, so it lives as long as the copy.
    _origin: Option<Schema>,
}

impl Node {
    fn fresh(kind: Kind, metadata: Metadata) -> Self {
        Node {
            kind,
            metadata,
            parse: OnceCell::new(),
            serialize: OnceCell::new(),
            is_async: OnceCell::new(),
            structural_name: OnceCell::new(),
            _origin: None,
        }
    }
}

/// Structural name of a node, rendered the first time an error needs it.
///
/// Holds the node's kind (so its children) rather than the node itself: the
/// node owns the operation that owns this.
#[derive(Clone)]
pub(crate) struct Expected(Rc<(Kind, OnceCell<String>)>);

impl Expected {
    pub(crate) fn of(schema: &Schema) -> Self {
        Expected(Rc::new((schema.0.kind.clone(), OnceCell::new())))
    }

    pub(crate) fn name(&self) -> &str {
        self.0.1.get_or_init(|| crate::reflect::kind_name(&self.0.0))
    }
}

/// Descriptive data. Never read by parse or serialize.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deprecation: Option<String>,
    pub custom: IndexMap<String, Value>,
}

#[derive(Clone, Debug)]
pub enum Kind {
    Never,
    Unknown,
    Unit,
    String,
    Bool,
    Int,
    Float,
    Json,
    Literal(Literal),
    Array(Schema),
    Dict(Schema),
    Object(ObjectShape),
    Tuple(Vec<Schema>),
    /// Missing or `null` → absent; absent fields are omitted on serialize.
    Option(Schema),
    /// `null` → absent; serialized back to `null`.
    Null(Schema),
    /// Missing or `null` → absent; serialized back to `null`.
    Nullable(Schema),
    Union(Vec<Schema>),
    /// A JSON document embedded in a string.
    JsonString(Schema),
    Custom(Custom),
    Transformed { base: Schema, effect: Effect },
    Recursive(RecursiveRef),
}

impl Kind {
    /// Short label of the kind alone, without children.
    pub fn label(&self) -> &'static str {
        match self {
            Kind::Never => "never",
            Kind::Unknown => "unknown",
            Kind::Unit => "unit",
            Kind::String => "string",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Json => "json",
            Kind::Literal(_) => "literal",
            Kind::Array(_) => "array",
            Kind::Dict(_) => "dict",
            Kind::Object(_) => "object",
            Kind::Tuple(_) => "tuple",
            Kind::Option(_) => "option",
            Kind::Null(_) => "null",
            Kind::Nullable(_) => "nullable",
            Kind::Union(_) => "union",
            Kind::JsonString(_) => "json_string",
            Kind::Custom(_) => "custom",
            Kind::Transformed { effect, .. } => effect.name(),
            Kind::Recursive(_) => "recursive",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ObjectShape {
    pub fields: IndexMap<String, Schema>,
    /// `None` defers to the global config at compile time.
    pub unknown_keys: Option<UnknownKeys>,
}

impl ObjectShape {
    pub fn field(&self, name: &str) -> Option<&Schema> {
        self.fields.get(name)
    }
}

/// A user-defined leaf with its own parse/serialize handlers.
#[derive(Clone, Debug)]
pub struct Custom {
    pub name: String,
    pub(crate) handlers: Handlers,
}

// ————————————————————————————————————————————————————————————————————————————
// NODE
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    pub(crate) fn new(kind: Kind) -> Self {
        Self::with_metadata(kind, Metadata::default())
    }

    pub(crate) fn with_metadata(kind: Kind, metadata: Metadata) -> Self {
        Schema(Rc::new(Node::fresh(kind, metadata)))
    }

    /// Copy of this node with different metadata. The kind is unchanged, so
    /// whatever is already compiled is shared rather than rebuilt.
    pub(crate) fn with_updated_metadata(&self, update: impl FnOnce(&mut Metadata)) -> Schema {
        let mut metadata = self.0.metadata.clone();
        update(&mut metadata);
        Schema(Rc::new(Node {
            kind: self.0.kind.clone(),
            metadata,
            parse: self.0.parse.clone(),
            serialize: self.0.serialize.clone(),
            is_async: self.0.is_async.clone(),
            structural_name: self.0.structural_name.clone(),
            _origin: Some(self.clone()),
        }))
    }

    /// The node's kind and children, for introspection.
    pub fn classify(&self) -> &Kind {
        &self.0.kind
    }

    /// Same node (not merely an equal one).
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Object schema rejecting undeclared keys. Other kinds are returned as is.
    pub fn strict(&self) -> Schema {
        self.with_unknown_keys(UnknownKeys::Strict)
    }

    /// Object schema dropping undeclared keys. Other kinds are returned as is.
    pub fn strip(&self) -> Schema {
        self.with_unknown_keys(UnknownKeys::Strip)
    }

    fn with_unknown_keys(&self, unknown_keys: UnknownKeys) -> Schema {
        match &self.0.kind {
            Kind::Object(shape) => Schema(Rc::new(Node {
                _origin: Some(self.clone()),
                ..Node::fresh(
                    Kind::Object(ObjectShape { fields: shape.fields.clone(), unknown_keys: Some(unknown_keys) }),
                    self.0.metadata.clone(),
                )
            })),
            _ => self.clone(),
        }
    }

    /// Direct children, in declaration order. Recursive references are leaves.
    pub fn children(&self) -> Vec<Schema> {
        match &self.0.kind {
            Kind::Array(item) | Kind::Dict(item) => vec![item.clone()],
            Kind::Option(inner) | Kind::Null(inner) | Kind::Nullable(inner) | Kind::JsonString(inner) => {
                vec![inner.clone()]
            }
            Kind::Object(shape) => shape.fields.values().cloned().collect(),
            Kind::Tuple(items) | Kind::Union(items) => items.clone(),
            Kind::Transformed { base, .. } => vec![base.clone()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("kind", &self.0.kind)
            .field("metadata", &self.0.metadata)
            .finish()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

pub fn never() -> Schema { Schema::new(Kind::Never) }
pub fn unknown() -> Schema { Schema::new(Kind::Unknown) }
pub fn unit() -> Schema { Schema::new(Kind::Unit) }
pub fn string() -> Schema { Schema::new(Kind::String) }
pub fn bool() -> Schema { Schema::new(Kind::Bool) }
pub fn int() -> Schema { Schema::new(Kind::Int) }
pub fn float() -> Schema { Schema::new(Kind::Float) }
pub fn json() -> Schema { Schema::new(Kind::Json) }

pub fn literal(value: impl Into<Literal>) -> Schema {
    Schema::new(Kind::Literal(value.into()))
}

pub fn array(item: Schema) -> Schema { Schema::new(Kind::Array(item)) }
pub fn dict(value: Schema) -> Schema { Schema::new(Kind::Dict(value)) }
pub fn option(inner: Schema) -> Schema { Schema::new(Kind::Option(inner)) }
pub fn null(inner: Schema) -> Schema { Schema::new(Kind::Null(inner)) }
pub fn nullable(inner: Schema) -> Schema { Schema::new(Kind::Nullable(inner)) }
pub fn json_string(inner: Schema) -> Schema { Schema::new(Kind::JsonString(inner)) }

/// Object schema with fields in declaration order.
pub fn try_object<I, K>(fields: I) -> Result<Schema, DefinitionError>
where
    I: IntoIterator<Item = (K, Schema)>,
    K: Into<String>,
{
    let mut map = IndexMap::new();
    for (name, schema) in fields {
        let name = name.into();
        if map.contains_key(&name) {
            return Err(DefinitionError::DuplicateField(name));
        }
        map.insert(name, schema);
    }
    Ok(Schema::new(Kind::Object(ObjectShape { fields: map, unknown_keys: None })))
}

/// # Panics
///
/// When a field name appears twice.
#[track_caller]
pub fn object<I, K>(fields: I) -> Schema
where
    I: IntoIterator<Item = (K, Schema)>,
    K: Into<String>,
{
    match try_object(fields) {
        Ok(schema) => schema,
        Err(error) => panic!("{error}"),
    }
}

pub fn tuple(items: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Kind::Tuple(items.into_iter().collect()))
}

pub fn tuple1(a: Schema) -> Schema { tuple([a]) }
pub fn tuple2(a: Schema, b: Schema) -> Schema { tuple([a, b]) }
pub fn tuple3(a: Schema, b: Schema, c: Schema) -> Schema { tuple([a, b, c]) }

pub fn try_union(members: impl IntoIterator<Item = Schema>) -> Result<Schema, DefinitionError> {
    let members: Vec<Schema> = members.into_iter().collect();
    if members.is_empty() {
        return Err(DefinitionError::EmptyUnion);
    }
    Ok(Schema::new(Kind::Union(members)))
}

/// # Panics
///
/// When `members` is empty.
#[track_caller]
pub fn union(members: impl IntoIterator<Item = Schema>) -> Schema {
    match try_union(members) {
        Ok(schema) => schema,
        Err(error) => panic!("{error}"),
    }
}

pub fn custom(name: impl Into<String>, handlers: Handlers) -> Schema {
    Schema::new(Kind::Custom(Custom { name: name.into(), handlers }))
}

/// Schema matching exactly the shape of `value`: scalars become literals,
/// arrays tuples and objects objects, all the way down.
///
/// ```
/// use serde_json::json;
/// use shape_schema::schema_of;
///
/// let ping = schema_of(&json!({"type": "ping", "version": [1, 0]}));
/// assert!(ping.parse(json!({"type": "ping", "version": [1, 0]})).is_ok());
/// assert!(ping.parse(json!({"type": "pong", "version": [1, 0]})).is_err());
/// ```
pub fn schema_of(value: &Value) -> Schema {
    match value {
        Value::Array(items) => tuple(items.iter().map(schema_of)),
        Value::Object(fields) => {
            let fields = fields.iter().map(|(name, field)| (name.clone(), schema_of(field))).collect();
            Schema::new(Kind::Object(ObjectShape { fields, unknown_keys: None }))
        }
        scalar => literal(Literal::from_value(scalar)),
    }
}
