//! Traced items
//!
//! An [`Item`] is one requirement, implementation unit or activity. It is
//! created by an extractor (or rebuilt from a report), gets its reference
//! lists filled by the resolver and its status assigned by the status
//! engine. Items are keyed by [`Tag::key`] in an [`ItemMap`].

use crate::config::SourceSpec;
use crate::location::{Location, LocationError};
use crate::tag::{Tag, TagError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// All items of a run, keyed by tag key.
pub type ItemMap = BTreeMap<String, Item>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TracingStatus {
    Ok,
    Partial,
    Missing,
    Justified,
    Error,
}

impl TracingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TracingStatus::Ok => "OK",
            TracingStatus::Partial => "PARTIAL",
            TracingStatus::Missing => "MISSING",
            TracingStatus::Justified => "JUSTIFIED",
            TracingStatus::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(TracingStatus::Ok),
            "PARTIAL" => Some(TracingStatus::Partial),
            "MISSING" => Some(TracingStatus::Missing),
            "JUSTIFIED" => Some(TracingStatus::Justified),
            "ERROR" => Some(TracingStatus::Error),
            _ => None,
        }
    }

    /// Whether an item with this status counts towards coverage.
    pub fn is_covered(&self) -> bool {
        matches!(self, TracingStatus::Ok | TracingStatus::Justified)
    }
}

impl fmt::Display for TracingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClass {
    Requirement,
    Implementation,
    Activity,
}

impl ItemClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemClass::Requirement => "requirement",
            ItemClass::Implementation => "implementation",
            ItemClass::Activity => "activity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requirement" => Some(ItemClass::Requirement),
            "implementation" => Some(ItemClass::Implementation),
            "activity" => Some(ItemClass::Activity),
            _ => None,
        }
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub framework: String,
    pub kind: String,
    pub text: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Implementation {
    pub language: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub framework: String,
    pub kind: String,
    pub status: Option<String>,
}

/// Class-specific data of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Requirement(Requirement),
    Implementation(Implementation),
    Activity(Activity),
}

impl Payload {
    pub fn class(&self) -> ItemClass {
        match self {
            Payload::Requirement(_) => ItemClass::Requirement,
            Payload::Implementation(_) => ItemClass::Implementation,
            Payload::Activity(_) => ItemClass::Activity,
        }
    }

    fn write_json(&self, obj: &mut Map<String, Value>) {
        match self {
            Payload::Requirement(req) => {
                obj.insert("framework".into(), json!(req.framework));
                obj.insert("kind".into(), json!(req.kind));
                obj.insert("text".into(), json!(req.text));
                obj.insert("status".into(), json!(req.status));
            }
            Payload::Implementation(imp) => {
                obj.insert("language".into(), json!(imp.language));
                obj.insert("kind".into(), json!(imp.kind));
            }
            Payload::Activity(act) => {
                obj.insert("framework".into(), json!(act.framework));
                obj.insert("kind".into(), json!(act.kind));
                obj.insert("status".into(), json!(act.status));
            }
        }
    }

    fn read_json(class: ItemClass, fields: &Fields<'_>) -> Result<Self, ItemError> {
        Ok(match class {
            ItemClass::Requirement => Payload::Requirement(Requirement {
                framework: fields.string("framework")?,
                kind: fields.string("kind")?,
                text: fields.opt_string("text")?,
                status: fields.opt_string("status")?,
            }),
            ItemClass::Implementation => Payload::Implementation(Implementation {
                language: fields.string("language")?,
                kind: fields.string("kind")?,
            }),
            ItemClass::Activity => Payload::Activity(Activity {
                framework: fields.string("framework")?,
                kind: fields.string("kind")?,
                status: fields.opt_string("status")?,
            }),
        })
    }
}

/// Why an item could not be rebuilt from JSON.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Tag(#[from] TagError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("item is not an object")]
    NotAnObject,

    #[error("item has no field '{0}'")]
    MissingField(&'static str),

    #[error("item field '{0}' has the wrong type")]
    InvalidField(&'static str),

    #[error("unknown tracing status '{0}'")]
    UnknownStatus(String),

    #[error("item of class {found} on a level holding {expected} items")]
    ClassMismatch { expected: ItemClass, found: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub tag: Tag,
    pub location: Location,
    /// Display name; defaults to the tag name.
    pub name: String,
    /// Name of the level this item was loaded into.
    pub level: String,
    pub ref_up: Vec<Tag>,
    pub ref_down: Vec<Tag>,
    /// Declared targets not yet linked; drained by the resolver.
    pub unresolved_references: Vec<Tag>,
    pub just_global: Vec<String>,
    pub just_up: Vec<String>,
    pub just_down: Vec<String>,
    pub messages: Vec<String>,
    pub tracing_status: Option<TracingStatus>,
    pub payload: Payload,
}

impl Item {
    pub fn new(tag: Tag, location: Location, payload: Payload) -> Self {
        Self {
            name: tag.name().to_string(),
            tag,
            location,
            level: String::new(),
            ref_up: Vec::new(),
            ref_down: Vec::new(),
            unresolved_references: Vec::new(),
            just_global: Vec::new(),
            just_up: Vec::new(),
            just_down: Vec::new(),
            messages: Vec::new(),
            tracing_status: None,
            payload,
        }
    }

    pub fn requirement(tag: Tag, location: Location, requirement: Requirement) -> Self {
        Self::new(tag, location, Payload::Requirement(requirement))
    }

    pub fn implementation(tag: Tag, location: Location, implementation: Implementation) -> Self {
        Self::new(tag, location, Payload::Implementation(implementation))
    }

    pub fn activity(tag: Tag, location: Location, activity: Activity) -> Self {
        Self::new(tag, location, Payload::Activity(activity))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn key(&self) -> String {
        self.tag.key()
    }

    pub fn class(&self) -> ItemClass {
        self.payload.class()
    }

    /// Declare a reference to another item, to be linked by the resolver.
    pub fn add_tracing_target(&mut self, target: Tag) {
        self.unresolved_references.push(target);
    }

    pub fn justify(&mut self, reason: impl Into<String>) {
        self.just_global.push(reason.into());
    }

    pub fn justify_up(&mut self, reason: impl Into<String>) {
        self.just_up.push(reason.into());
    }

    pub fn justify_down(&mut self, reason: impl Into<String>) {
        self.just_down.push(reason.into());
    }

    /// Check the item against the source declaration it was loaded from.
    /// Returns the message added to the item, if any.
    pub fn perform_source_checks(&mut self, source: &SourceSpec) -> Option<String> {
        let Payload::Requirement(req) = &self.payload else {
            return None;
        };
        let valid = source.valid_status.as_ref().filter(|v| !v.is_empty())?;
        if req.status.as_ref().is_some_and(|s| valid.contains(s)) {
            return None;
        }

        let mut expected: Vec<&str> = valid.iter().map(String::as_str).collect();
        expected.sort_unstable();
        let message = format!(
            "status is {}, expected {}",
            req.status.as_deref().unwrap_or("missing"),
            expected.join(" or ")
        );
        self.messages.push(message.clone());
        Some(message)
    }

    /// The item as stored in a report's `levels[].items`.
    pub fn to_report_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), json!(self.tag.to_string()));
        obj.insert("source".into(), self.location.to_json());
        obj.insert("ref_up".into(), tag_keys(&self.ref_up));
        obj.insert("ref_down".into(), tag_keys(&self.ref_down));
        obj.insert(
            "tracing_status".into(),
            json!(self.tracing_status.map(|s| s.as_str())),
        );
        obj.insert("tracing_messages".into(), json!(self.messages));
        obj.insert("just_global".into(), json!(self.just_global));
        obj.insert("just_up".into(), json!(self.just_up));
        obj.insert("just_down".into(), json!(self.just_down));
        obj.insert("class".into(), json!(self.class().as_str()));
        self.payload.write_json(&mut obj);
        Value::Object(obj)
    }

    /// Rebuild an item of a level whose items all have class `class`.
    pub fn from_report_json(
        level: &str,
        class: ItemClass,
        value: &Value,
    ) -> Result<Self, ItemError> {
        let fields = Fields::new(value)?;

        let found = fields.string("class")?;
        if found != class.as_str() {
            return Err(ItemError::ClassMismatch {
                expected: class,
                found,
            });
        }

        let tag = Tag::parse(&fields.string("name")?)?;
        let location = Location::from_json(fields.required("source")?)?;
        let payload = Payload::read_json(class, &fields)?;

        let mut item = Item::new(tag, location, payload);
        item.level = level.to_string();
        item.ref_up = fields.tags("ref_up")?;
        item.ref_down = fields.tags("ref_down")?;
        item.messages = fields.strings("tracing_messages")?;
        item.just_global = fields.strings("just_global")?;
        item.just_up = fields.strings("just_up")?;
        item.just_down = fields.strings("just_down")?;
        item.tracing_status = Some(fields.status("tracing_status")?.ok_or(
            ItemError::MissingField("tracing_status"),
        )?);
        Ok(item)
    }

    /// The item as one datum of an interchange file.
    pub fn to_interchange_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("tag".into(), json!(self.tag.to_string()));
        obj.insert("location".into(), self.location.to_json());
        obj.insert("name".into(), json!(self.name));
        obj.insert("messages".into(), json!(self.messages));
        obj.insert("just_up".into(), json!(self.just_up));
        obj.insert("just_down".into(), json!(self.just_down));
        obj.insert("just_global".into(), json!(self.just_global));
        if !self.unresolved_references.is_empty() {
            obj.insert("refs".into(), tag_texts(&self.unresolved_references));
        }
        if !self.ref_up.is_empty() || !self.ref_down.is_empty() {
            obj.insert("ref_up".into(), tag_texts(&self.ref_up));
            obj.insert("ref_down".into(), tag_texts(&self.ref_down));
        }
        if let Some(status) = self.tracing_status {
            obj.insert("tracing_status".into(), json!(status.as_str()));
        }
        self.payload.write_json(&mut obj);
        Value::Object(obj)
    }

    /// Rebuild an item from one datum of an interchange file.
    pub fn from_interchange_json(
        level: &str,
        class: ItemClass,
        value: &Value,
    ) -> Result<Self, ItemError> {
        let fields = Fields::new(value)?;

        let tag = Tag::parse(&fields.string("tag")?)?;
        let location = Location::from_json(fields.required("location")?)?;
        let payload = Payload::read_json(class, &fields)?;

        let mut item = Item::new(tag, location, payload).with_name(fields.string("name")?);
        item.level = level.to_string();
        item.unresolved_references = fields.tags("refs")?;
        item.ref_up = fields.tags("ref_up")?;
        item.ref_down = fields.tags("ref_down")?;
        item.messages = fields.strings("messages")?;
        item.just_up = fields.strings("just_up")?;
        item.just_down = fields.strings("just_down")?;
        item.just_global = fields.strings("just_global")?;
        item.tracing_status = fields.status("tracing_status")?;
        Ok(item)
    }
}

fn tag_keys(tags: &[Tag]) -> Value {
    tags.iter().map(Tag::key).collect()
}

fn tag_texts(tags: &[Tag]) -> Value {
    tags.iter().map(Tag::to_string).collect()
}

/// Typed access to the fields of a JSON item object.
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn new(value: &'a Value) -> Result<Self, ItemError> {
        value.as_object().map(Fields).ok_or(ItemError::NotAnObject)
    }

    fn required(&self, field: &'static str) -> Result<&'a Value, ItemError> {
        self.0.get(field).ok_or(ItemError::MissingField(field))
    }

    fn string(&self, field: &'static str) -> Result<String, ItemError> {
        match self.required(field)? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(ItemError::InvalidField(field)),
        }
    }

    fn opt_string(&self, field: &'static str) -> Result<Option<String>, ItemError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ItemError::InvalidField(field)),
        }
    }

    /// A list of strings; an absent field is an empty list.
    fn strings(&self, field: &'static str) -> Result<Vec<String>, ItemError> {
        match self.0.get(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or(ItemError::InvalidField(field))
                })
                .collect(),
            Some(_) => Err(ItemError::InvalidField(field)),
        }
    }

    fn tags(&self, field: &'static str) -> Result<Vec<Tag>, ItemError> {
        self.strings(field)?
            .iter()
            .map(|text| Tag::parse(text).map_err(ItemError::from))
            .collect()
    }

    fn status(&self, field: &'static str) -> Result<Option<TracingStatus>, ItemError> {
        self.opt_string(field)?
            .map(|s| TracingStatus::parse(&s).ok_or(ItemError::UnknownStatus(s)))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::FileLocation;
    use std::num::NonZeroU32;

    fn req_item() -> Item {
        let location = FileLocation::at("reqs.trlc", NonZeroU32::new(12).unwrap(), None);
        let mut item = Item::requirement(
            Tag::parse("req brakes.abs@2").unwrap(),
            location.into(),
            Requirement {
                framework: "TRLC".into(),
                kind: "Requirement".into(),
                text: Some("The ABS shall engage.".into()),
                status: Some("draft".into()),
            },
        );
        item.level = "Requirements".into();
        item
    }

    #[test]
    fn status_names() {
        for status in [
            TracingStatus::Ok,
            TracingStatus::Partial,
            TracingStatus::Missing,
            TracingStatus::Justified,
            TracingStatus::Error,
        ] {
            assert_eq!(TracingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TracingStatus::parse("ok"), None);
        assert!(TracingStatus::Justified.is_covered());
        assert!(!TracingStatus::Partial.is_covered());
    }

    #[test]
    fn report_json_shape() {
        let mut item = req_item();
        item.justify("legacy");
        item.ref_down.push(Tag::parse("python foo.bar").unwrap());
        item.tracing_status = Some(TracingStatus::Justified);

        let value = item.to_report_json();
        assert_eq!(value["name"], "req brakes.abs@2");
        assert_eq!(value["source"]["kind"], "file");
        assert_eq!(value["ref_down"], json!(["python foo.bar"]));
        assert_eq!(value["tracing_status"], "JUSTIFIED");
        assert_eq!(value["just_global"], json!(["legacy"]));
        assert_eq!(value["class"], "requirement");
        assert_eq!(value["framework"], "TRLC");
        assert_eq!(value["status"], "draft");

        let back = Item::from_report_json("Requirements", ItemClass::Requirement, &value).unwrap();
        assert_eq!(back.tag, item.tag);
        assert_eq!(back.tracing_status, item.tracing_status);
        assert_eq!(back.just_global, item.just_global);
        assert_eq!(back.payload, item.payload);
    }

    #[test]
    fn class_must_match_level() {
        let mut item = req_item();
        item.tracing_status = Some(TracingStatus::Ok);
        let err = Item::from_report_json("Code", ItemClass::Implementation, &item.to_report_json())
            .unwrap_err();
        let ItemError::ClassMismatch { expected, found } = err else {
            panic!("expected a class mismatch, got {err:?}");
        };
        assert_eq!(expected, ItemClass::Implementation);
        assert_eq!(found, "requirement");
    }

    #[test]
    fn malformed_report_items() {
        let err = Item::from_report_json("R", ItemClass::Requirement, &json!([])).unwrap_err();
        assert!(matches!(err, ItemError::NotAnObject));

        let err = Item::from_report_json(
            "R",
            ItemClass::Activity,
            &json!({"class": "activity", "name": "nonamespace"}),
        )
        .unwrap_err();
        assert!(matches!(err, ItemError::Tag(TagError::MissingNamespace(_))));

        let mut value = req_item().to_report_json();
        value["tracing_status"] = json!("GREAT");
        let err = Item::from_report_json("R", ItemClass::Requirement, &value).unwrap_err();
        assert!(matches!(err, ItemError::UnknownStatus(ref s) if s == "GREAT"));
    }

    #[test]
    fn interchange_keeps_unresolved_references() {
        let mut item = Item::implementation(
            Tag::parse("python foo.bar").unwrap(),
            FileLocation::file("foo.py").into(),
            Implementation {
                language: "Python".into(),
                kind: "Function".into(),
            },
        )
        .with_name("foo.bar");
        item.add_tracing_target(Tag::parse("req brakes.abs@2").unwrap());
        item.justify_down("leaf function");

        let value = item.to_interchange_json();
        assert_eq!(value["refs"], json!(["req brakes.abs@2"]));
        assert!(value.get("ref_up").is_none());
        assert!(value.get("tracing_status").is_none());

        let back = Item::from_interchange_json("Code", ItemClass::Implementation, &value).unwrap();
        assert_eq!(back.unresolved_references, item.unresolved_references);
        assert_eq!(back.just_down, item.just_down);
        assert_eq!(back.level, "Code");
    }

    #[test]
    fn valid_status_check() {
        let mut spec = SourceSpec::new("reqs.lobster");
        spec.valid_status = Some(vec!["draft".into(), "approved".into()]);

        let mut item = req_item();
        assert_eq!(item.perform_source_checks(&spec), None);

        if let Payload::Requirement(req) = &mut item.payload {
            req.status = Some("rejected".into());
        }
        let message = item.perform_source_checks(&spec);
        assert_eq!(
            message.as_deref(),
            Some("status is rejected, expected approved or draft")
        );
        assert_eq!(item.messages.len(), 1);

        spec.valid_status = None;
        assert_eq!(item.perform_source_checks(&spec), None);
    }
}
