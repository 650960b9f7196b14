use pretty_assertions::assert_eq;
use serde::Deserialize;
use serde_json::json;
use shape_schema::{
    ErrorKind, Handlers, Path, Segment, array, custom, dict, float, int, json_string, literal, never, null,
    nullable, object, option, string, tuple, unit, unknown,
};

#[test]
fn array_item_failure_points_at_the_item() {
    let error = array(int()).parse(json!([1, 2, "3"])).unwrap_err();
    assert_eq!(error.path, Path::from_segments([2usize]));
    assert_eq!(error.kind, ErrorKind::InvalidType { expected: "Int".into(), received: json!("3") });
}

#[test]
fn missing_option_field_is_absent() {
    let schema = object([("name", string()), ("age", option(int()))]);
    assert_eq!(schema.parse(json!({"name": "a"})).unwrap(), json!({"name": "a", "age": null}));
}

#[test]
fn missing_required_field_fails_at_the_field() {
    let schema = object([("name", string()), ("age", int())]);
    let error = schema.parse(json!({"age": 3})).unwrap_err();
    assert_eq!(error.path, Path::from_segments(["name"]));
    assert!(matches!(error.kind, ErrorKind::InvalidType { .. }));
}

#[test]
fn object_output_follows_declaration_order_and_strips_unknown_keys() {
    let schema = object([("b", int()), ("a", int())]);
    let parsed = schema.parse(json!({"a": 1, "extra": true, "b": 2})).unwrap();
    let keys: Vec<&String> = parsed.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["b", "a"]);
}

#[test]
fn strict_objects_reject_unknown_keys() {
    let schema = object([("a", int())]).strict();
    let error = schema.parse(json!({"a": 1, "b": 2})).unwrap_err();
    assert_eq!(error.kind, ErrorKind::ExcessField("b".into()));
    assert!(error.path.is_root());
}

#[test]
fn nested_errors_carry_the_full_path() {
    let schema = object([("users", array(object([("tags", dict(int()))])))]);
    let error = schema.parse(json!({"users": [{"tags": {}}, {"tags": {"x": 1, "y": false}}]})).unwrap_err();
    assert_eq!(
        error.path,
        Path::from_segments([
            Segment::from("users"),
            Segment::from(1usize),
            Segment::from("tags"),
            Segment::from("y"),
        ])
    );
    assert_eq!(
        error.to_string(),
        r#"Failed parsing at ["users"][1]["tags"]["y"]. Reason: Expected Int, received false"#
    );
}

#[test]
fn primitives() {
    assert_eq!(int().parse(json!(3.0)).unwrap(), json!(3));
    assert!(int().parse(json!(3.5)).is_err());
    assert!(int().parse(json!(4_000_000_000_i64)).is_err());
    assert_eq!(float().parse(json!(3.5)).unwrap(), json!(3.5));
    assert_eq!(unit().parse(json!(null)).unwrap(), json!(null));
    assert!(never().parse(json!(null)).is_err());
    assert_eq!(unknown().parse(json!({"any": [1]})).unwrap(), json!({"any": [1]}));
}

#[test]
fn literals() {
    assert_eq!(literal(1).parse(json!(1.0)).unwrap(), json!(1.0));
    let error = literal("a").parse(json!("b")).unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidLiteral { expected: "a".into(), received: json!("b") });
    assert!(literal(json!({"x": [1]})).parse(json!({"x": [1]})).is_ok());
}

#[test]
fn tuples_check_their_size() {
    let schema = tuple([int(), string()]);
    assert_eq!(schema.parse(json!([1, "a"])).unwrap(), json!([1, "a"]));
    let error = schema.parse(json!([1])).unwrap_err();
    assert_eq!(error.kind, ErrorKind::InvalidTupleSize { expected: 2, received: 1 });
    assert_eq!(schema.parse(json!([1, 2])).unwrap_err().path, Path::from_segments([1usize]));
}

#[test]
fn null_and_nullable() {
    assert_eq!(nullable(int()).parse(json!(null)).unwrap(), json!(null));
    assert_eq!(null(int()).parse(json!(2)).unwrap(), json!(2));
    let schema = object([("a", nullable(int()))]);
    assert_eq!(schema.parse(json!({})).unwrap(), json!({"a": null}));
}

#[test]
fn json_strings_are_decoded_then_parsed() {
    let schema = json_string(object([("a", int())]));
    assert_eq!(schema.parse(json!(r#"{"a": 1}"#)).unwrap(), json!({"a": 1}));
    let error = schema.parse(json!(r#"{"a": "1"}"#)).unwrap_err();
    assert_eq!(error.path, Path::from_segments(["a"]));
}

#[test]
fn pipeline_runs_preprocess_base_transform_refine() {
    let schema = string()
        .preprocess(Handlers::new().parser(|v| Ok(json!(v.to_string()))))
        .transform(Handlers::new().parser(|v| Ok(json!(v.as_str().map_or(0, str::len)))))
        .refine("too long", |v| v.as_u64().is_some_and(|n| n < 3));

    assert_eq!(schema.parse(json!(12)).unwrap(), json!(2));
    let error = schema.parse(json!(1234)).unwrap_err();
    assert_eq!(error.kind, ErrorKind::Refinement("too long".into()));
}

#[test]
fn user_errors_become_custom_with_the_callers_path() {
    let even = int().transform(Handlers::new().parser(|v| {
        if v.as_i64().is_some_and(|n| n % 2 == 0) {
            Ok(v)
        } else {
            anyhow::bail!("odd number")
        }
    }));
    let error = array(even).parse(json!([2, 3])).unwrap_err();
    assert_eq!(error.kind, ErrorKind::Custom("odd number".into()));
    assert_eq!(error.path, Path::from_segments([1usize]));
}

#[test]
fn catch_recovers_only_its_own_node() {
    let schema = object([("a", int().catch(|_, _| json!(0)))]);
    assert_eq!(schema.parse(json!({"a": "x"})).unwrap(), json!({"a": 0}));
    assert!(schema.parse(json!("not an object")).is_err());
}

#[test]
fn catch_sees_the_error_and_the_input() {
    let schema = int().catch(|error, input| json!({"reason": error.reason(), "input": input}));
    assert_eq!(
        schema.parse(json!("x")).unwrap(),
        json!({"reason": "Expected Int, received \"x\"", "input": "x"})
    );
}

#[test]
fn custom_schemas_use_their_handlers() {
    let cents = custom(
        "Cents",
        Handlers::new()
            .parser(|v| match v.as_f64() {
                Some(amount) => Ok(json!((amount * 100.0).round() as i64)),
                None => anyhow::bail!("expected an amount"),
            })
            .serializer(|v| Ok(json!(v.as_i64().unwrap_or_default() as f64 / 100.0))),
    );
    assert_eq!(cents.parse(json!(1.25)).unwrap(), json!(125));
    assert_eq!(cents.serialize(json!(125)).unwrap(), json!(1.25));
    assert_eq!(cents.parse(json!("1")).unwrap_err().kind, ErrorKind::Custom("expected an amount".into()));
}

#[test]
fn missing_parser_is_a_configuration_error() {
    let schema = custom("WriteOnly", Handlers::new().serializer(Ok));
    assert!(matches!(schema.parse(json!(1)).unwrap_err().kind, ErrorKind::InvalidOperation(_)));
}

#[test]
fn parse_into_deserializes_rust_types() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: Option<i32>,
    }
    let schema = object([("name", string()), ("age", option(int()))]);
    let user: User = schema.parse_into(json!({"name": "a", "extra": 1})).unwrap();
    assert_eq!(user, User { name: "a".into(), age: None });
}

#[test]
fn parse_any_accepts_rust_values() {
    let schema = array(tuple([string(), int()]));
    assert_eq!(schema.parse_any(&vec![("a", 1)]).unwrap(), json!([["a", 1]]));
}

#[test]
fn absent_values_take_their_default() {
    let schema = object([
        ("retries", option(int()).get_or(json!(3))),
        ("tags", nullable(array(string())).get_or_with(|| json!([]))),
    ]);
    assert_eq!(schema.parse(json!({"tags": null})).unwrap(), json!({"retries": 3, "tags": []}));
    assert_eq!(schema.parse(json!({"retries": 1, "tags": ["a"]})).unwrap(), json!({"retries": 1, "tags": ["a"]}));

    let error = schema.parse(json!({"retries": "x"})).unwrap_err();
    assert_eq!(error.path, Path::from_segments(["retries"]));
    assert_eq!(schema.serialize(json!({"retries": 3, "tags": []})).unwrap(), json!({"retries": 3, "tags": []}));
}
