//! Built-in array refinements.
use serde_json::Value;

use crate::schema::Schema;

fn items(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}

impl Schema {
    pub fn min_items(&self, count: usize) -> Schema {
        self.refine(format!("Array must be {count} or more items long"), move |v| items(v) >= count)
    }

    pub fn max_items(&self, count: usize) -> Schema {
        self.refine(format!("Array must be {count} or fewer items long"), move |v| items(v) <= count)
    }

    /// Exact length.
    pub fn items(&self, count: usize) -> Schema {
        self.refine(format!("Array must be exactly {count} items long"), move |v| items(v) == count)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::schema::{array, int};
    use serde_json::json;

    #[test]
    fn item_counts() {
        let schema = array(int()).min_items(1).max_items(2);
        assert!(schema.parse(json!([1])).is_ok());
        assert_eq!(
            schema.parse(json!([])).unwrap_err().kind,
            ErrorKind::Refinement("Array must be 1 or more items long".into())
        );
        assert!(schema.parse(json!([1, 2, 3])).is_err());
        assert!(array(int()).items(2).parse(json!([1, 2])).is_ok());
    }

    #[test]
    fn refinements_also_guard_serialize() {
        let error = array(int()).max_items(1).serialize(json!([1, 2])).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Refinement("Array must be 1 or fewer items long".into()));
    }
}
