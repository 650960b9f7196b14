//! Typed conversions at the edges of the engine.
//!
//! Parsed values leave as `serde_json::Value`; these helpers turn them into
//! Rust types (and Rust values into `Value`) while keeping the location of a
//! failure as a [`Path`].
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Direction, Error, ErrorKind};
use crate::path::{Path, Segment};

fn convert_path(path: &serde_path_to_error::Path) -> Path {
    Path::from_segments(path.iter().filter_map(|segment| match segment {
        serde_path_to_error::Segment::Seq { index } => Some(Segment::Index(*index)),
        serde_path_to_error::Segment::Map { key } => Some(Segment::Key(key.clone())),
        serde_path_to_error::Segment::Enum { variant } => Some(Segment::Key(variant.clone())),
        serde_path_to_error::Segment::Unknown => None,
    }))
}

fn failed<E: std::fmt::Display>(err: serde_path_to_error::Error<E>, direction: Direction) -> Error {
    let path = convert_path(err.path());
    Error::new(ErrorKind::OperationFailed(err.into_inner().to_string()), direction).with_path(path)
}

/// Deserialize a parsed value into `T`, reporting where it didn't fit.
pub fn from_value_with_path<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_path_to_error::deserialize(value).map_err(|err| failed(err, Direction::Parsing))
}

/// Deserialize JSON text with JSON-path context in the error.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, Error> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize(de).map_err(|err| failed(err, Direction::Parsing))
}

/// Serialize a Rust value into an unknown `Value`.
pub fn to_unknown<T: Serialize + ?Sized>(value: &T, direction: Direction) -> Result<Value, Error> {
    serde_path_to_error::serialize(value, serde_json::value::Serializer).map_err(|err| failed(err, direction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn deserialize_error_carries_the_path() {
        let error = from_value_with_path::<Vec<Point>>(json!([{"x": 1, "y": 2}, {"x": 1, "y": "2"}])).unwrap_err();
        assert_eq!(error.path, Path::from_segments([Segment::Index(1), Segment::Key("y".into())]));
        assert!(matches!(error.kind, ErrorKind::OperationFailed(_)));
    }

    #[test]
    fn text_is_read_with_paths_too() {
        let points: Vec<Point> = from_str_with_path(r#"[{"x": 0, "y": 0}]"#).unwrap();
        assert_eq!(points, vec![Point { x: 0, y: 0 }]);
        assert!(from_str_with_path::<Vec<Point>>("[{]").is_err());
    }

    #[test]
    fn serializes_into_values() {
        let value = to_unknown(&vec![(1, "a")], Direction::Serializing).unwrap();
        assert_eq!(value, json!([[1, "a"]]));
    }
}
