//! Source locations of traced items
//!
//! Every item (and every diagnostic) points somewhere: a plain file, a file
//! inside a hosted repository at a fixed commit, or an entry in an issue
//! tracker. Locations render as plain text, as an HTML anchor, and round-trip
//! through JSON using an explicit `kind` discriminant.

use serde_json::{Map, Value, json};
use std::fmt;
use std::num::{NonZeroU32, NonZeroU64};
use thiserror::Error;

/// Why a location could not be built or reconstructed from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location data not an object")]
    NotAnObject,

    #[error("location data does not contain 'kind'")]
    MissingKind,

    #[error("unknown location kind {0}")]
    UnknownKind(String),

    #[error("malformed {kind} location data, missing {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("malformed {kind} location data, {field} has the wrong type")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("a column requires a line")]
    ColumnWithoutLine,

    #[error("line numbers start at 1")]
    ZeroLine,

    #[error("column numbers start at 1")]
    ZeroColumn,

    #[error("tracker ids start at 1")]
    ZeroTrackerId,

    #[error("item ids start at 1")]
    ZeroItemId,

    #[error("item versions start at 1")]
    ZeroVersion,

    #[error("'{0}' is not an http(s) url")]
    NotAUrl(String),
}

/// A location in a local file, optionally narrowed to a line and column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileLocation {
    filename: String,
    line: Option<NonZeroU32>,
    column: Option<NonZeroU32>,
}

impl FileLocation {
    /// Build a file location; `column` is only legal together with `line`.
    pub fn new(
        filename: impl Into<String>,
        line: Option<u32>,
        column: Option<u32>,
    ) -> Result<Self, LocationError> {
        if column.is_some() && line.is_none() {
            return Err(LocationError::ColumnWithoutLine);
        }
        let line = line
            .map(|l| NonZeroU32::new(l).ok_or(LocationError::ZeroLine))
            .transpose()?;
        let column = column
            .map(|c| NonZeroU32::new(c).ok_or(LocationError::ZeroColumn))
            .transpose()?;
        Ok(Self {
            filename: filename.into(),
            line,
            column,
        })
    }

    /// A location covering the whole file.
    pub fn file(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            line: None,
            column: None,
        }
    }

    /// A location at a known-valid line (and optional column).
    pub fn at(
        filename: impl Into<String>,
        line: NonZeroU32,
        column: Option<NonZeroU32>,
    ) -> Self {
        Self {
            filename: filename.into(),
            line: Some(line),
            column,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn line(&self) -> Option<u32> {
        self.line.map(NonZeroU32::get)
    }

    pub fn column(&self) -> Option<u32> {
        self.column.map(NonZeroU32::get)
    }
}

/// A file inside a hosted repository (e.g. GitHub) at a specific commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostedLocation {
    root: String,
    repo: String,
    commit: String,
    filename: String,
    line: Option<NonZeroU32>,
}

impl HostedLocation {
    /// `root` is the repository URL; its last path segment becomes the short
    /// repository name.
    pub fn new(
        root: impl Into<String>,
        commit: impl Into<String>,
        filename: impl Into<String>,
        line: Option<u32>,
    ) -> Result<Self, LocationError> {
        let root = root.into();
        if !root.starts_with("http") {
            return Err(LocationError::NotAUrl(root));
        }
        let root = root.trim_end_matches('/').to_string();
        let repo = root.rsplit('/').next().unwrap_or_default().to_string();
        let line = line
            .map(|l| NonZeroU32::new(l).ok_or(LocationError::ZeroLine))
            .transpose()?;
        Ok(Self {
            root,
            repo,
            commit: commit.into(),
            filename: filename.into(),
            line,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Short repository name, derived from the root URL.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn line(&self) -> Option<u32> {
        self.line.map(NonZeroU32::get)
    }
}

/// An item in an issue tracker (e.g. codebeamer).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerLocation {
    root: String,
    tracker: NonZeroU64,
    item: NonZeroU64,
    version: Option<NonZeroU64>,
    name: Option<String>,
}

impl TrackerLocation {
    pub fn new(
        root: impl Into<String>,
        tracker: u64,
        item: u64,
        version: Option<u64>,
        name: Option<String>,
    ) -> Result<Self, LocationError> {
        let root = root.into();
        if !root.starts_with("http") {
            return Err(LocationError::NotAUrl(root));
        }
        let tracker = NonZeroU64::new(tracker).ok_or(LocationError::ZeroTrackerId)?;
        let item = NonZeroU64::new(item).ok_or(LocationError::ZeroItemId)?;
        let version = version
            .map(|v| NonZeroU64::new(v).ok_or(LocationError::ZeroVersion))
            .transpose()?;
        Ok(Self {
            root,
            tracker,
            item,
            version,
            name,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn tracker(&self) -> u64 {
        self.tracker.get()
    }

    pub fn item(&self) -> u64 {
        self.item.get()
    }

    pub fn version(&self) -> Option<u64> {
        self.version.map(NonZeroU64::get)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Key used to group and order items by where they live.
///
/// Items in the same file share a `group` and are ordered by line, then column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub group: String,
    pub line: u64,
    pub column: u64,
}

/// Where a traced item (or a diagnostic) comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    File(FileLocation),
    Hosted(HostedLocation),
    Tracker(TrackerLocation),
}

impl Location {
    /// JSON discriminant for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Location::File(_) => "file",
            Location::Hosted(_) => "github",
            Location::Tracker(_) => "codebeamer",
        }
    }

    /// Plain-text rendering, as used in diagnostics.
    pub fn to_text(&self) -> String {
        match self {
            Location::File(loc) => {
                let mut rv = loc.filename.clone();
                if let Some(line) = loc.line {
                    rv.push_str(&format!(":{line}"));
                }
                if let Some(column) = loc.column {
                    rv.push_str(&format!(":{column}"));
                }
                rv
            }
            Location::Hosted(loc) => match loc.line {
                Some(line) => format!("{}:{line}", loc.filename),
                None => loc.filename.clone(),
            },
            Location::Tracker(loc) => match &loc.name {
                Some(name) => format!("cb item {} '{name}'", loc.item),
                None => format!("cb item {}", loc.item),
            },
        }
    }

    /// An `<a>` element pointing at the location.
    pub fn to_html(&self) -> String {
        let (href, text) = match self {
            Location::File(loc) => (loc.filename.clone(), loc.filename.clone()),
            Location::Hosted(loc) => {
                let mut file_ref = loc.filename.clone();
                if let Some(line) = loc.line {
                    file_ref.push_str(&format!("#L{line}"));
                }
                (
                    format!("{}/blob/{}/{file_ref}", loc.root, loc.commit),
                    self.to_text(),
                )
            }
            Location::Tracker(loc) => (
                format!("{}/cb/issue/{}", loc.root, loc.item),
                self.to_text(),
            ),
        };
        format!(
            "<a href=\"{}\" target=\"_blank\">{}</a>",
            escape_html(&href),
            escape_html(&text)
        )
    }

    pub fn to_json(&self) -> Value {
        match self {
            Location::File(loc) => json!({
                "kind": "file",
                "file": loc.filename,
                "line": loc.line(),
                "column": loc.column(),
            }),
            Location::Hosted(loc) => json!({
                "kind": "github",
                "gh_root": loc.root,
                "commit": loc.commit,
                "file": loc.filename,
                "line": loc.line(),
            }),
            Location::Tracker(loc) => json!({
                "kind": "codebeamer",
                "cb_root": loc.root,
                "tracker": loc.tracker(),
                "item": loc.item(),
                "version": loc.version(),
                "name": loc.name,
            }),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, LocationError> {
        let obj = value.as_object().ok_or(LocationError::NotAnObject)?;
        let kind = match obj.get("kind") {
            None => return Err(LocationError::MissingKind),
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => return Err(LocationError::UnknownKind(other.to_string())),
        };

        match kind {
            "file" => {
                let filename = string_field(obj, "file", "file")?;
                let line = opt_u64_field(obj, "file", "line")?;
                // a column without a line is dropped, not rejected
                let column = match line {
                    Some(_) => opt_u64_field(obj, "file", "column")?,
                    None => None,
                };
                FileLocation::new(
                    filename,
                    line.map(|l| narrow(l, "file", "line")).transpose()?,
                    column.map(|c| narrow(c, "file", "column")).transpose()?,
                )
                .map(Location::File)
            }
            "github" => {
                let root = string_field(obj, "github", "gh_root")?;
                let commit = string_field(obj, "github", "commit")?;
                let filename = string_field(obj, "github", "file")?;
                let line = opt_u64_field(obj, "github", "line")?
                    .map(|l| narrow(l, "github", "line"))
                    .transpose()?;
                HostedLocation::new(root, commit, filename, line).map(Location::Hosted)
            }
            "codebeamer" => {
                let root = string_field(obj, "codebeamer", "cb_root")?;
                let tracker = u64_field(obj, "codebeamer", "tracker")?;
                let item = u64_field(obj, "codebeamer", "item")?;
                let version = opt_u64_field(obj, "codebeamer", "version")?;
                let name = match obj.get("name") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(name)) => Some(name.clone()),
                    Some(_) => {
                        return Err(LocationError::InvalidField {
                            kind: "codebeamer",
                            field: "name",
                        });
                    }
                };
                TrackerLocation::new(root, tracker, item, version, name).map(Location::Tracker)
            }
            other => Err(LocationError::UnknownKind(other.to_string())),
        }
    }

    /// Grouping key for display: by file (or tracker), then by position.
    pub fn sort_key(&self) -> SortKey {
        match self {
            Location::File(loc) => SortKey {
                group: loc.filename.clone(),
                line: loc.line().map_or(0, u64::from),
                column: loc.column().map_or(0, u64::from),
            },
            Location::Hosted(loc) => SortKey {
                group: format!("{}/{}", loc.repo, loc.filename),
                line: loc.line().map_or(0, u64::from),
                column: 0,
            },
            Location::Tracker(loc) => SortKey {
                group: format!("{} {}", loc.root, loc.tracker),
                line: loc.item.get(),
                column: 0,
            },
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<FileLocation> for Location {
    fn from(loc: FileLocation) -> Self {
        Location::File(loc)
    }
}

impl From<HostedLocation> for Location {
    fn from(loc: HostedLocation) -> Self {
        Location::Hosted(loc)
    }
}

impl From<TrackerLocation> for Location {
    fn from(loc: TrackerLocation) -> Self {
        Location::Tracker(loc)
    }
}

fn string_field(
    obj: &Map<String, Value>,
    kind: &'static str,
    field: &'static str,
) -> Result<String, LocationError> {
    match obj.get(field) {
        None => Err(LocationError::MissingField { kind, field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(LocationError::InvalidField { kind, field }),
    }
}

fn u64_field(
    obj: &Map<String, Value>,
    kind: &'static str,
    field: &'static str,
) -> Result<u64, LocationError> {
    opt_u64_field(obj, kind, field)?.ok_or(LocationError::MissingField { kind, field })
}

/// Absent and `null` both mean "not given".
fn opt_u64_field(
    obj: &Map<String, Value>,
    kind: &'static str,
    field: &'static str,
) -> Result<Option<u64>, LocationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or(LocationError::InvalidField { kind, field }),
    }
}

fn narrow(value: u64, kind: &'static str, field: &'static str) -> Result<u32, LocationError> {
    u32::try_from(value).map_err(|_| LocationError::InvalidField { kind, field })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
