//! Schema definitions compiled into cached parse and serialize operations.
//!
//! A schema is built once from constructors ([`object`], [`array`],
//! [`union`], ...). The first parse or serialize compiles the node into an
//! [`Operation`] that is cached on the node and shared with every parent that
//! embeds it; schemas that would not change their input compile to the shared
//! [`Operation::noop`].
//!
//! ```
//! use serde_json::json;
//! use shape_schema::{int, object, option, string};
//!
//! let user = object([("name", string()), ("age", option(int()))]);
//! assert_eq!(user.parse(json!({"name": "a"})).unwrap(), json!({"name": "a", "age": null}));
//! assert_eq!(user.serialize(json!({"name": "a", "age": null})).unwrap(), json!({"name": "a"}));
//!
//! let error = user.parse(json!({"name": 1})).unwrap_err();
//! assert_eq!(error.to_string(), r#"Failed parsing at ["name"]. Reason: Expected String, received 1"#);
//! ```
pub mod api;
pub mod compiler;
pub mod config;
pub mod effects;
pub mod error;
pub mod literal;
pub mod operation;
pub mod path;
pub mod path_de;
pub mod recursive;
pub mod reflect;
pub mod schema;
pub mod union;

pub use config::{Config, UnknownKeys, global_config, reset_global_config, set_global_config};
pub use effects::{Check, Effect, Handlers, variant};
pub use error::{DefinitionError, Direction, Error, ErrorKind};
pub use literal::Literal;
pub use operation::{AsyncOperation, Deferred, Operation, ParseOperation, Staged};
pub use path::{Path, Segment};
pub use recursive::{RecursiveRef, recursive};
pub use schema::{
    Custom, Kind, Metadata, ObjectShape, Schema, array, bool, custom, dict, float, int, json, json_string, literal,
    never, null, nullable, object, option, schema_of, string, try_object, try_union, tuple, tuple1, tuple2, tuple3,
    union, unit, unknown,
};
