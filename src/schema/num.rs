//! Built-in number refinements.
use serde_json::Value;

use crate::schema::Schema;

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

impl Schema {
    /// Inclusive lower bound.
    pub fn min(&self, bound: f64) -> Schema {
        self.refine(format!("Number must be greater than or equal to {bound}"), move |v| number(v) >= bound)
    }

    /// Inclusive upper bound.
    pub fn max(&self, bound: f64) -> Schema {
        self.refine(format!("Number must be lower than or equal to {bound}"), move |v| number(v) <= bound)
    }

    /// A TCP/UDP port number.
    pub fn port(&self) -> Schema {
        self.refine("Invalid port", |v| v.as_u64().is_some_and(|n| n <= u64::from(u16::MAX)))
    }
}
