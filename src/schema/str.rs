//! Built-in string refinements and normalizers.
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::effects::Handlers;
use crate::error::{Error, ErrorKind};
use crate::schema::Schema;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-]+(\.[A-Za-z0-9_'+\-]+)*@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$").unwrap()
});

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$|^0{8}-0{4}-0{4}-0{4}-0{12}$").unwrap()
});

static CUID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^c[^\s-]{8,}$").unwrap());

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s]+$").unwrap());

fn chars(value: &Value) -> usize {
    value.as_str().map_or(0, |s| s.chars().count())
}

fn text_matches(value: &Value, re: &Regex) -> bool {
    value.as_str().is_some_and(|s| re.is_match(s))
}

/// Scheme plus something after it; web schemes also need a host.
fn looks_like_url(s: &str) -> bool {
    if !URL_RE.is_match(s) {
        return false;
    }
    match s.split_once("://") {
        Some((_, rest)) => !rest.is_empty() && !rest.starts_with('/'),
        None => s.starts_with("mailto:") || s.starts_with("tel:") || s.starts_with("urn:"),
    }
}

impl Schema {
    pub fn min_length(&self, length: usize) -> Schema {
        self.refine(format!("String must be {length} or more characters long"), move |v| chars(v) >= length)
    }

    pub fn max_length(&self, length: usize) -> Schema {
        self.refine(format!("String must be {length} or fewer characters long"), move |v| chars(v) <= length)
    }

    pub fn length(&self, length: usize) -> Schema {
        self.refine(format!("String must be exactly {length} characters long"), move |v| chars(v) == length)
    }

    pub fn pattern(&self, re: Regex) -> Schema {
        self.refine("Invalid", move |v| text_matches(v, &re))
    }

    pub fn email(&self) -> Schema {
        self.refine("Invalid email address", |v| text_matches(v, &EMAIL_RE))
    }

    pub fn uuid(&self) -> Schema {
        self.refine("Invalid UUID", |v| text_matches(v, &UUID_RE))
    }

    pub fn cuid(&self) -> Schema {
        self.refine("Invalid CUID", |v| text_matches(v, &CUID_RE))
    }

    pub fn url(&self) -> Schema {
        self.refine("Invalid url", |v| v.as_str().is_some_and(looks_like_url))
    }

    /// Accept an RFC 3339 timestamp with any offset and normalize it to UTC
    /// with millisecond precision (`2024-05-01T10:00:00.000Z`). Serializes
    /// the normalized string unchanged.
    pub fn datetime(&self) -> Schema {
        self.transform(
            Handlers::new()
                .parser(|value| {
                    let text = value.as_str().unwrap_or_default();
                    let parsed = DateTime::parse_from_rfc3339(text).map_err(|_| {
                        Error::parsing(ErrorKind::Refinement("Invalid datetime string! Expected UTC".into()))
                    })?;
                    let utc = parsed.with_timezone(&Utc);
                    Ok(Value::String(utc.to_rfc3339_opts(SecondsFormat::Millis, true)))
                })
                .serializer(Ok),
        )
    }

    /// Strip surrounding whitespace in both directions.
    pub fn trim(&self) -> Schema {
        fn trimmed(value: Value) -> anyhow::Result<Value> {
            Ok(match value {
                Value::String(s) => Value::String(s.trim().to_string()),
                other => other,
            })
        }
        self.transform(Handlers::new().parser(trimmed).serializer(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::schema::string;
    use serde_json::json;

    #[test]
    fn length_bounds_count_characters() {
        let schema = string().min_length(2).max_length(3);
        assert!(schema.parse(json!("éé")).is_ok());
        let error = schema.parse(json!("a")).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Refinement("String must be 2 or more characters long".into()));
        assert!(schema.parse(json!("abcd")).is_err());
    }

    #[test]
    fn format_checks() {
        assert!(string().email().parse(json!("dev@example.com")).is_ok());
        assert!(string().email().parse(json!("dev@localhost")).is_err());
        assert!(string().uuid().parse(json!("123e4567-e89b-12d3-a456-426614174000")).is_ok());
        assert!(string().uuid().parse(json!("123e4567")).is_err());
        assert!(string().cuid().parse(json!("cjld2cjxh0000qzrmn831i7rn")).is_ok());
        assert!(string().url().parse(json!("https://example.com/a?b=1")).is_ok());
        assert!(string().url().parse(json!("example.com")).is_err());
    }

    #[test]
    fn datetime_normalizes_to_utc() {
        let schema = string().datetime();
        assert_eq!(schema.parse(json!("2024-05-01T12:00:00+02:00")).unwrap(), json!("2024-05-01T10:00:00.000Z"));
        let error = schema.parse(json!("yesterday")).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Refinement("Invalid datetime string! Expected UTC".into()));
    }

    #[test]
    fn trim_applies_both_ways() {
        let schema = string().trim();
        assert_eq!(schema.parse(json!("  hi ")).unwrap(), json!("hi"));
        assert_eq!(schema.serialize(json!(" hi")).unwrap(), json!("hi"));
    }
}
