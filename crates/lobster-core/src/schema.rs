//! Structural checks shared by the report loader and the interchange reader

use crate::error::{Error, Result};
use crate::location::{FileLocation, Location};
use serde_json::{Map, Value};
use std::num::NonZeroU32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    String,
    Integer,
    Array,
    Object,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Shape::String => value.is_string(),
            Shape::Integer => value.is_u64() || value.is_i64(),
            Shape::Array => value.is_array(),
            Shape::Object => value.is_object(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Shape::String => "a string",
            Shape::Integer => "an integer",
            Shape::Array => "an array",
            Shape::Object => "an object",
        }
    }
}

/// Parse `text` as a JSON object. Syntax errors are reported at the
/// position serde_json points at.
pub(crate) fn parse_document(file_name: &str, text: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(text).map_err(|err| {
        let location = match NonZeroU32::new(clamp(err.line())) {
            Some(line) => FileLocation::at(file_name, line, NonZeroU32::new(clamp(err.column()))),
            None => FileLocation::file(file_name),
        };
        Error::Schema {
            location: location.into(),
            message: err.to_string(),
        }
    })?;

    match value {
        Value::Object(obj) => Ok(obj),
        _ => Err(Error::schema(
            &FileLocation::file(file_name).into(),
            "parsed json is not an object",
        )),
    }
}

fn clamp(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Check that every key is present with the expected shape.
pub(crate) fn require_keys(
    obj: &Map<String, Value>,
    location: &Location,
    keys: &[(&str, Shape)],
) -> Result<()> {
    for (key, shape) in keys {
        let Some(value) = obj.get(*key) else {
            return Err(Error::schema(
                location,
                format!("required top-level key {key} not present"),
            ));
        };
        if !shape.matches(value) {
            return Err(Error::schema(
                location,
                format!("{key} is not {}", shape.describe()),
            ));
        }
    }
    Ok(())
}

/// Check `schema`/`version` of a document against the supported pairs.
/// Returns the schema name and version.
pub(crate) fn check_schema<'a>(
    obj: &'a Map<String, Value>,
    location: &Location,
    supported: &[(&str, &[u64])],
) -> Result<(&'a str, u64)> {
    let schema = obj.get("schema").and_then(Value::as_str).unwrap_or_default();
    let version = obj.get("version").and_then(Value::as_u64);

    let Some((_, versions)) = supported.iter().find(|(name, _)| *name == schema) else {
        return Err(Error::schema(location, format!("unknown schema kind {schema}")));
    };
    match version {
        Some(version) if versions.contains(&version) => Ok((schema, version)),
        _ => {
            let shown = obj.get("version").map(Value::to_string).unwrap_or_default();
            Err(Error::schema(
                location,
                format!("version {shown} for schema {schema} is not supported"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loc() -> Location {
        FileLocation::file("x.lobster").into()
    }

    #[test]
    fn syntax_error_has_position() {
        let err = parse_document("x.lobster", "{\n  \"a\": }").unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
        assert!(err.to_string().starts_with("x.lobster:2:"), "{err}");
    }

    #[test]
    fn not_an_object() {
        let err = parse_document("x.lobster", "[1, 2]").unwrap_err();
        assert_eq!(err.to_string(), "x.lobster: lobster error: parsed json is not an object");
    }

    #[test]
    fn key_shapes() {
        let obj = json!({"schema": "s", "version": "2"});
        let obj = obj.as_object().unwrap();
        let shapes = [("schema", Shape::String), ("version", Shape::Integer)];
        let err = require_keys(obj, &loc(), &shapes).unwrap_err();
        assert_eq!(err.message(), "version is not an integer");

        let err = require_keys(obj, &loc(), &[("levels", Shape::Array)]).unwrap_err();
        assert_eq!(err.message(), "required top-level key levels not present");
    }

    #[test]
    fn schema_and_version() {
        const SUPPORTED: &[(&str, &[u64])] = &[("lobster-report", &[2])];

        let obj = json!({"schema": "lobster-report", "version": 2});
        assert_eq!(
            check_schema(obj.as_object().unwrap(), &loc(), SUPPORTED).unwrap(),
            ("lobster-report", 2)
        );

        let obj = json!({"schema": "wrong-schema", "version": 2});
        let err = check_schema(obj.as_object().unwrap(), &loc(), SUPPORTED).unwrap_err();
        assert_eq!(err.message(), "unknown schema kind wrong-schema");

        let obj = json!({"schema": "lobster-report", "version": 1});
        let err = check_schema(obj.as_object().unwrap(), &loc(), SUPPORTED).unwrap_err();
        assert_eq!(err.message(), "version 1 for schema lobster-report is not supported");
    }
}
