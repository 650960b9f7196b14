use proptest::prelude::*;
use serde_json::{Value, json};
use shape_schema::{ErrorKind, Segment, array, int, literal, nullable, object, option, string, tuple, union};

fn record() -> impl Strategy<Value = Value> {
    (
        "[a-z]{0,8}",
        prop::collection::vec(any::<i32>(), 0..6),
        prop::option::of(any::<i32>()),
        prop::option::of("[ -~]{0,6}"),
    )
        .prop_map(|(id, scores, best, note)| {
            let mut value = json!({"id": id, "scores": scores, "pair": [id.clone(), best]});
            if let Some(note) = note {
                value["note"] = json!(note);
            }
            value
        })
}

proptest! {
    #[test]
    fn parse_of_serialize_round_trips(input in record()) {
        let schema = object([
            ("id", string()),
            ("scores", array(int())),
            ("pair", tuple([string(), nullable(int())])),
            ("note", option(string())),
        ]);
        let parsed = schema.parse(input.clone()).unwrap();
        let serialized = schema.serialize(parsed.clone()).unwrap();
        prop_assert_eq!(&serialized, &input);
        prop_assert_eq!(schema.parse(serialized).unwrap(), parsed);
    }

    #[test]
    fn array_item_failures_start_with_the_index(
        items in prop::collection::vec(any::<i32>(), 0..10),
        at in any::<prop::sample::Index>(),
    ) {
        let index = at.index(items.len() + 1);
        let mut values: Vec<Value> = items.into_iter().map(Value::from).collect();
        values.insert(index, json!("not a number"));
        let error = array(int()).parse(Value::Array(values)).unwrap_err();
        prop_assert_eq!(error.path.first(), Some(&Segment::Index(index)));
    }

    #[test]
    fn failing_unions_report_one_error_per_member(tags in prop::collection::hash_set("[a-z]{1,4}", 1..6)) {
        let schema = union(tags.iter().map(|tag| literal(tag.as_str())));
        let error = schema.parse(json!("NOT-A-TAG")).unwrap_err();
        prop_assert_eq!(error.union_errors().len(), tags.len());
        let all_literal = error.union_errors().iter().all(|e| matches!(e.kind, ErrorKind::InvalidLiteral { .. }));
        prop_assert!(all_literal);
    }
}
