//! The report aggregate
//!
//! A [`Report`] is built either from a policy file ([`Report::parse_config`]:
//! parse, extract, resolve, evaluate, count) or from a previously written
//! report ([`Report::load`]). Either way it owns the policy, every item and
//! the coverage per level.

use crate::config::{Config, LevelKind};
use crate::coverage::{Coverage, compute_coverage};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::files::Files;
use crate::item::{Item, ItemMap};
use crate::location::{FileLocation, Location};
use crate::parser::load_policy;
use crate::resolve::resolve_references;
use crate::schema::{self, Shape};
use crate::status::assign_statuses;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub const REPORT_SCHEMA: &str = "lobster-report";
pub const REPORT_VERSION: u64 = 2;
pub const GENERATOR: &str = "lobster_report";

/// Policy file read when none is given.
pub const DEFAULT_CONFIG: &str = "lobster.conf";
/// Report file written when none is given.
pub const DEFAULT_REPORT: &str = "report.lobster";

const SUPPORTED: &[(&str, &[u64])] = &[(REPORT_SCHEMA, &[REPORT_VERSION])];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub config: Config,
    pub items: ItemMap,
    pub coverage: BTreeMap<String, Coverage>,
    /// Free-form key/value pairs carried through the report.
    pub custom_data: Option<BTreeMap<String, String>>,
}

impl Report {
    /// Build a report from the policy file at `policy_file`.
    pub fn parse_config(
        policy_file: &str,
        files: &dyn Files,
        extractor: &mut dyn Extractor,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let config = load_policy(policy_file, files, diagnostics)?;
        info!(file = policy_file, levels = config.len(), "loaded tracing policy");
        Self::from_config(config, files, extractor, diagnostics)
    }

    /// Build a report for an already parsed policy.
    pub fn from_config(
        config: Config,
        files: &dyn Files,
        extractor: &mut dyn Extractor,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let mut items = ItemMap::new();
        for level in &config {
            for source in &level.source {
                let extracted = extractor.extract(level, source, files, diagnostics)?;
                info!(
                    level = %level.name,
                    file = %source.file,
                    items = extracted.len(),
                    "extracted items"
                );

                for mut item in extracted {
                    let key = item.key();
                    if let Some(previous) = items.get(&key) {
                        return Err(diagnostics.fatal(Error::semantic(
                            &item.location,
                            format!(
                                "duplicate definition, previously defined at {}",
                                previous.location
                            ),
                        )));
                    }
                    item.level = level.name.clone();
                    if let Some(message) = item.perform_source_checks(source) {
                        diagnostics.error(item.location.clone(), message);
                    }
                    items.insert(key, item);
                }
            }
        }

        resolve_references(&mut items, diagnostics);
        assign_statuses(&config, &mut items);
        let coverage = compute_coverage(&config, &items);

        Ok(Report {
            config,
            items,
            coverage,
            custom_data: None,
        })
    }

    /// Load a report written by [`Report::write`].
    pub fn load(path: &str, files: &dyn Files, diagnostics: &mut Diagnostics) -> Result<Self> {
        let text = files.read(path).map_err(|source| {
            diagnostics.fatal(Error::Io {
                location: FileLocation::file(path).into(),
                source,
            })
        })?;
        Self::from_json_str(path, &text).map_err(|err| diagnostics.fatal(err))
    }

    /// Load a report from its JSON text. `file_name` is used for errors.
    ///
    /// Coverage stored in the report is checked for type but not used;
    /// it is recomputed from the statuses of the loaded items.
    pub fn from_json_str(file_name: &str, text: &str) -> Result<Self> {
        let location: Location = FileLocation::file(file_name).into();
        let obj = schema::parse_document(file_name, text)?;
        schema::require_keys(
            &obj,
            &location,
            &[
                ("schema", Shape::String),
                ("version", Shape::Integer),
                ("generator", Shape::String),
                ("levels", Shape::Array),
                ("policy", Shape::Object),
                ("matrix", Shape::Array),
            ],
        )?;
        schema::check_schema(&obj, &location, SUPPORTED)?;

        let custom_data = match obj.get("custom_data") {
            None => None,
            Some(value) => Some(read_custom_data(value, &location)?),
        };

        let config = obj
            .get("policy")
            .map(|policy| Config::deserialize(policy))
            .transpose()
            .map_err(|err| Error::schema(&location, format!("policy is malformed: {err}")))?
            .unwrap_or_default();

        let mut items = ItemMap::new();
        let levels = obj
            .get("levels")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for raw in levels {
            let level = LevelEntry::read(raw, &location)?;
            let Some(declared) = config.get(level.name) else {
                return Err(Error::schema(
                    &location,
                    format!("level {} is not part of the policy", level.name),
                ));
            };
            if declared.kind != level.kind {
                return Err(Error::schema(
                    &location,
                    format!(
                        "level {} is {} in the report but {} in the policy",
                        level.name, level.kind, declared.kind
                    ),
                ));
            }

            for raw_item in level.items {
                let item = Item::from_report_json(level.name, level.kind.item_class(), raw_item)
                    .map_err(|source| Error::Malformed {
                        location: location.clone(),
                        source,
                    })?;
                let key = item.key();
                if let Some(previous) = items.get(&key) {
                    return Err(Error::semantic(
                        &item.location,
                        format!(
                            "duplicate definition, previously defined at {}",
                            previous.location
                        ),
                    ));
                }
                items.insert(key, item);
            }
            debug!(level = level.name, stored_coverage = ?level.coverage, "loaded level");
        }

        let coverage = compute_coverage(&config, &items);
        info!(file = file_name, items = items.len(), "loaded report");

        Ok(Report {
            config,
            items,
            coverage,
            custom_data,
        })
    }

    /// Items of one level, in key order.
    pub fn items_of_level<'a>(&'a self, level: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.values().filter(move |item| item.level == level)
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        let levels: Vec<Value> = self
            .config
            .iter()
            .map(|level| {
                let items: Vec<Value> = self
                    .items_of_level(&level.name)
                    .map(Item::to_report_json)
                    .collect();
                let coverage = self
                    .coverage
                    .get(&level.name)
                    .copied()
                    .unwrap_or_default();
                json!({
                    "name": level.name,
                    "kind": level.kind.as_str(),
                    "items": items,
                    "coverage": coverage.percentage(),
                })
            })
            .collect();

        let mut report = json!({
            "schema": REPORT_SCHEMA,
            "version": REPORT_VERSION,
            "generator": GENERATOR,
            "levels": levels,
            "policy": serde_json::to_value(&self.config)?,
            "matrix": [],
        });
        if let (Some(custom), Value::Object(obj)) = (&self.custom_data, &mut report) {
            obj.insert("custom_data".into(), serde_json::to_value(custom)?);
        }
        Ok(report)
    }

    /// Write the report as pretty-printed JSON.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let location: Location = FileLocation::file(path.display().to_string()).into();
        let text = self
            .to_json()
            .and_then(|value| serde_json::to_string_pretty(&value))
            .map_err(|err| Error::Io {
                location: location.clone(),
                source: err.into(),
            })?;
        std::fs::write(path, text).map_err(|source| Error::Io { location, source })?;
        info!(path = %path.display(), items = self.items.len(), "wrote report");
        Ok(())
    }
}

/// One entry of a report's `levels` array.
struct LevelEntry<'a> {
    name: &'a str,
    kind: LevelKind,
    items: &'a [Value],
    coverage: Option<f64>,
}

impl<'a> LevelEntry<'a> {
    fn read(value: &'a Value, location: &Location) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(Error::schema(location, "level entry is not an object"));
        };
        let field = |key: &str| {
            obj.get(key).ok_or_else(|| {
                Error::schema(location, format!("level entry has no key {key}"))
            })
        };

        let name = field("name")?
            .as_str()
            .ok_or_else(|| Error::schema(location, "level name is not a string"))?;
        let kind = field("kind")?
            .as_str()
            .and_then(LevelKind::parse)
            .ok_or_else(|| Error::schema(location, format!("level {name} has an unknown kind")))?;
        let items = field("items")?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| {
                Error::schema(location, format!("items of level {name} is not an array"))
            })?;
        let coverage = match field("coverage")? {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            _ => {
                return Err(Error::schema(
                    location,
                    format!("coverage of level {name} is not a number"),
                ));
            }
        };

        Ok(Self {
            name,
            kind,
            items,
            coverage,
        })
    }
}

fn read_custom_data(value: &Value, location: &Location) -> Result<BTreeMap<String, String>> {
    let not_flat = || Error::schema(location, "custom_data must be an object of strings");
    let obj: &Map<String, Value> = value.as_object().ok_or_else(not_flat)?;
    obj.iter()
        .map(|(key, value)| {
            value
                .as_str()
                .map(|s| (key.clone(), s.to_string()))
                .ok_or_else(not_flat)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const EMPTY: &str = indoc! {r#"
        {
          "schema": "lobster-report",
          "version": 2,
          "generator": "lobster_report",
          "levels": [
            {"name": "Req", "kind": "requirements", "items": [], "coverage": 0.0}
          ],
          "policy": {
            "Req": {"name": "Req", "kind": "requirements"}
          },
          "matrix": []
        }
    "#};

    #[test]
    fn loads_minimal_report() {
        let report = Report::from_json_str("report.lobster", EMPTY).unwrap();
        assert_eq!(report.config.len(), 1);
        assert!(report.items.is_empty());
        assert_eq!(report.coverage["Req"], Coverage::default());
        assert_eq!(report.custom_data, None);
    }

    #[test]
    fn wrong_schema_is_rejected() {
        let text = EMPTY.replace("\"lobster-report\"", "\"wrong-schema\"");
        let err = Report::from_json_str("report.lobster", &text).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
        assert_eq!(
            err.to_string(),
            "report.lobster: lobster error: unknown schema kind wrong-schema"
        );
    }

    #[test]
    fn missing_key_is_rejected() {
        let text = EMPTY.replace("\"matrix\": []", "\"matrics\": []");
        let err = Report::from_json_str("report.lobster", &text).unwrap_err();
        assert_eq!(err.message(), "required top-level key matrix not present");
    }

    #[test]
    fn custom_data_must_be_flat() {
        let text = EMPTY.replace(
            "\"matrix\": []",
            "\"matrix\": [], \"custom_data\": {\"build\": \"1234\"}",
        );
        let report = Report::from_json_str("report.lobster", &text).unwrap();
        assert_eq!(
            report.custom_data,
            Some(BTreeMap::from([("build".to_string(), "1234".to_string())]))
        );

        let text = EMPTY.replace(
            "\"matrix\": []",
            "\"matrix\": [], \"custom_data\": {\"build\": {\"id\": 1}}",
        );
        let err = Report::from_json_str("report.lobster", &text).unwrap_err();
        assert_eq!(err.message(), "custom_data must be an object of strings");
    }

    #[test]
    fn level_must_be_in_policy() {
        // only the levels entry, which comes before the policy
        let text = EMPTY.replacen(
            "{\"name\": \"Req\", \"kind\"",
            "{\"name\": \"Other\", \"kind\"",
            1,
        );
        let err = Report::from_json_str("report.lobster", &text).unwrap_err();
        assert_eq!(err.message(), "level Other is not part of the policy");
    }

    #[test]
    fn coverage_must_be_a_number() {
        let text = EMPTY.replace("\"coverage\": 0.0", "\"coverage\": \"full\"");
        let err = Report::from_json_str("report.lobster", &text).unwrap_err();
        assert_eq!(err.message(), "coverage of level Req is not a number");
    }

    #[test]
    fn written_json_has_reserved_fields() {
        let report = Report::from_json_str("report.lobster", EMPTY).unwrap();
        let value = report.to_json().unwrap();
        assert_eq!(value["schema"], REPORT_SCHEMA);
        assert_eq!(value["version"], REPORT_VERSION);
        assert_eq!(value["generator"], GENERATOR);
        assert_eq!(value["matrix"], json!([]));
        assert_eq!(value["levels"][0]["coverage"], 0.0);
        assert!(value.get("custom_data").is_none());
    }

    #[test]
    fn custom_data_survives_a_round_trip() {
        let mut report = Report::from_json_str("report.lobster", EMPTY).unwrap();
        let custom = BTreeMap::from([
            ("build".to_string(), "1234".to_string()),
            ("commit".to_string(), "8f1e2d".to_string()),
        ]);
        report.custom_data = Some(custom.clone());

        let text = serde_json::to_string(&report.to_json().unwrap()).unwrap();
        let reloaded = Report::from_json_str("report.lobster", &text).unwrap();
        assert_eq!(reloaded.custom_data, Some(custom));
        assert_eq!(reloaded.config, report.config);
    }
}
