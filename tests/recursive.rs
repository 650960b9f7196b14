use pretty_assertions::assert_eq;
use serde_json::json;
use shape_schema::{
    ErrorKind, Handlers, Kind, Path, Segment, array, int, literal, object, option, recursive, string, union,
};

fn tree() -> shape_schema::Schema {
    recursive(|node| object([("id", string()), ("children", array(node))]))
}

#[test]
fn parses_nested_trees() {
    let input = json!({"id": "root", "children": [{"id": "a", "children": [{"id": "b", "children": []}]}]});
    assert_eq!(tree().parse(input.clone()).unwrap(), input);
}

#[test]
fn deep_failures_have_the_full_path() {
    let input = json!({"id": "root", "children": [{"id": "a", "children": [{"id": 2, "children": []}]}]});
    let error = tree().parse(input).unwrap_err();
    assert_eq!(
        error.path,
        Path::from_segments([
            Segment::from("children"),
            Segment::from(0usize),
            Segment::from("children"),
            Segment::from(0usize),
            Segment::from("id"),
        ])
    );
    assert!(matches!(error.kind, ErrorKind::InvalidType { .. }));
}

#[test]
fn recursive_calls_share_the_targets_operation() {
    let schema = tree();
    schema.parse(json!({"id": "x", "children": []})).unwrap();
    let Kind::Object(shape) = schema.classify() else { panic!("expected object") };
    let Some(children) = shape.field("children") else { panic!("expected children") };
    let Kind::Array(placeholder) = children.classify() else { panic!("expected array") };
    let Kind::Recursive(reference) = placeholder.classify() else { panic!("expected placeholder") };
    let target = reference.target().unwrap();
    assert!(target.ptr_eq(&schema));
    assert!(target.parse_operation().ptr_eq(&schema.parse_operation()));
}

#[test]
fn serialize_goes_through_transforms_at_every_depth() {
    let counter = recursive(|node| {
        object([
            ("n", int().transform(
                Handlers::new()
                    .parser(|v| Ok(json!(v.as_i64().unwrap_or_default() * 2)))
                    .serializer(|v| Ok(json!(v.as_i64().unwrap_or_default() / 2))),
            )),
            ("next", option(node)),
        ])
    });
    let wire = json!({"n": 1, "next": {"n": 2}});
    let typed = counter.parse(wire.clone()).unwrap();
    assert_eq!(typed, json!({"n": 2, "next": {"n": 4, "next": null}}));
    assert_eq!(counter.serialize(typed).unwrap(), wire);
}

#[test]
fn recursive_unions() {
    let expr = recursive(|expr| {
        union([
            object([("op", literal("num")), ("value", int())]),
            object([("op", literal("add")), ("left", expr.clone()), ("right", expr)]),
        ])
    });
    let input = json!({"op": "add", "left": {"op": "num", "value": 1}, "right": {"op": "num", "value": 2}});
    assert_eq!(expr.parse(input.clone()).unwrap(), input);

    let error = expr.parse(json!({"op": "add", "left": {"op": "num", "value": "1"}, "right": {"op": "num", "value": 2}})).unwrap_err();
    assert_eq!(error.union_errors().len(), 2);
}

#[test]
fn recursive_schemas_report_self_in_their_names() {
    assert_eq!(tree().structural_name(), "{id: String, children: Array(Self)}");
    assert!(tree().inline().is_err());
}

#[test]
fn described_recursive_schemas_keep_resolving() {
    let described = tree().describe("a tree").strict();
    let input = json!({"id": "root", "children": [{"id": "a", "children": []}]});
    assert_eq!(described.parse(input.clone()).unwrap(), input);
    assert_eq!(described.description(), Some("a tree"));
}

#[test]
fn a_union_member_pointing_back_at_the_union_is_skipped() {
    let looping = recursive(|this| union([this, int()]));
    assert_eq!(looping.parse(json!(3)).unwrap(), json!(3));
    let error = looping.parse(json!("x")).unwrap_err();
    assert_eq!(error.union_errors().len(), 2);
    assert!(matches!(error.union_errors()[0].kind, ErrorKind::InvalidOperation(_)));
    assert_eq!(looping.serialize(json!(3)).unwrap(), json!(3));
}
