//! Turning declared sources into items
//!
//! Per-language tools write their findings to interchange files (JSON with
//! a `lobster-*-trace` schema). [`InterchangeExtractor`] reads those;
//! [`MemoryExtractor`] hands out preset items and is what tests use.

use crate::config::{Level, SourceSpec};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::files::Files;
use crate::item::{Item, ItemClass, ItemError};
use crate::location::{FileLocation, Location};
use crate::schema::{self, Shape};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::io;
use tracing::debug;

pub const REQUIREMENT_SCHEMA: &str = "lobster-req-trace";
pub const IMPLEMENTATION_SCHEMA: &str = "lobster-imp-trace";
pub const ACTIVITY_SCHEMA: &str = "lobster-act-trace";

const SUPPORTED: &[(&str, &[u64])] = &[
    (REQUIREMENT_SCHEMA, &[3, 4]),
    (IMPLEMENTATION_SCHEMA, &[3]),
    (ACTIVITY_SCHEMA, &[3]),
];

/// Interchange schema name and the version written for `class`.
pub fn interchange_schema(class: ItemClass) -> (&'static str, u64) {
    match class {
        ItemClass::Requirement => (REQUIREMENT_SCHEMA, 4),
        ItemClass::Implementation => (IMPLEMENTATION_SCHEMA, 3),
        ItemClass::Activity => (ACTIVITY_SCHEMA, 3),
    }
}

fn schema_class(schema: &str) -> Option<ItemClass> {
    match schema {
        REQUIREMENT_SCHEMA => Some(ItemClass::Requirement),
        IMPLEMENTATION_SCHEMA => Some(ItemClass::Implementation),
        ACTIVITY_SCHEMA => Some(ItemClass::Activity),
        _ => None,
    }
}

/// Produces the items of one source declaration of a level.
///
/// Returned items have their level set and carry their declared targets in
/// `unresolved_references`. A fatal problem is recorded in `diagnostics`
/// and returned.
pub trait Extractor {
    fn extract(
        &mut self,
        level: &Level,
        source: &SourceSpec,
        files: &dyn Files,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Item>>;
}

/// Reads interchange files.
///
/// `prefix` and `kind` filters are applied by the tools producing the
/// files; this reader takes every datum as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterchangeExtractor;

impl InterchangeExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse interchange `text` read from `file_name` into items of `level`.
    pub fn parse(&self, level: &Level, file_name: &str, text: &str) -> Result<Vec<Item>> {
        let location: Location = FileLocation::file(file_name).into();
        let obj = schema::parse_document(file_name, text)?;
        schema::require_keys(
            &obj,
            &location,
            &[
                ("schema", Shape::String),
                ("version", Shape::Integer),
                ("generator", Shape::String),
                ("data", Shape::Array),
            ],
        )?;
        let (schema, version) = schema::check_schema(&obj, &location, SUPPORTED)?;

        let expected = level.kind.item_class();
        if schema_class(schema) != Some(expected) {
            return Err(Error::schema(
                &location,
                format!(
                    "{schema} does not hold {expected} items, as {} level '{}' requires",
                    level.kind, level.name
                ),
            ));
        }

        let data = obj.get("data").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
        debug!(file = file_name, %schema, version, items = data.len(), "read interchange file");

        data.iter()
            .map(|raw| {
                Item::from_interchange_json(&level.name, expected, raw).map_err(|source| {
                    Error::Malformed {
                        location: location.clone(),
                        source,
                    }
                })
            })
            .collect()
    }
}

impl Extractor for InterchangeExtractor {
    fn extract(
        &mut self,
        level: &Level,
        source: &SourceSpec,
        files: &dyn Files,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Item>> {
        if !source.filters.is_empty() {
            debug!(
                file = %source.file,
                filters = source.filters.len(),
                "filters left to the producing tool"
            );
        }
        let text = files.read(&source.file).map_err(|err| {
            diagnostics.fatal(Error::Io {
                location: FileLocation::file(&source.file).into(),
                source: err,
            })
        })?;
        self.parse(level, &source.file, &text)
            .map_err(|err| diagnostics.fatal(err))
    }
}

/// Preset items per source file.
#[derive(Debug, Clone, Default)]
pub struct MemoryExtractor {
    items: BTreeMap<String, Vec<Item>>,
}

impl MemoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items returned for the source declaration naming `file`
    pub fn add(mut self, file: impl Into<String>, items: Vec<Item>) -> Self {
        self.items.entry(file.into()).or_default().extend(items);
        self
    }
}

impl Extractor for MemoryExtractor {
    fn extract(
        &mut self,
        level: &Level,
        source: &SourceSpec,
        _files: &dyn Files,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Item>> {
        let Some(items) = self.items.get(&source.file) else {
            return Err(diagnostics.fatal(Error::Io {
                location: FileLocation::file(&source.file).into(),
                source: io::Error::new(io::ErrorKind::NotFound, "no items registered"),
            }));
        };
        Ok(items
            .iter()
            .cloned()
            .map(|mut item| {
                item.level = level.name.clone();
                item
            })
            .collect())
    }
}

/// Interchange document for `items`, all of which must be of `class`.
pub fn write_interchange(
    class: ItemClass,
    generator: &str,
    items: &[Item],
) -> std::result::Result<Value, ItemError> {
    if let Some(other) = items.iter().find(|item| item.class() != class) {
        return Err(ItemError::ClassMismatch {
            expected: class,
            found: other.class().to_string(),
        });
    }
    let (schema, version) = interchange_schema(class);
    Ok(json!({
        "data": items.iter().map(Item::to_interchange_json).collect::<Vec<_>>(),
        "generator": generator,
        "schema": schema,
        "version": version,
    }))
}
