//! lobster-core - Core library for requirements traceability
//!
//! This crate provides the building blocks for:
//! - Parsing tracing policies that declare levels (requirements,
//!   implementation, activities) and how they must reference each other
//! - Reading traced items from interchange files
//! - Linking item references into an up/down graph
//! - Classifying every item's tracing status and computing coverage
//! - Writing and loading the versioned JSON report
//!
//! # Tracing policies
//!
//! ```text
//! requirements "System Requirements" {
//!   source: "reqs.lobster" with valid_status {"approved"};
//! }
//!
//! implementation "Code" {
//!   source: "code.lobster";
//!   trace to: "System Requirements";
//! }
//!
//! activity "Unit Tests" {
//!   source: "tests.lobster";
//!   trace to: "System Requirements" or "Code";
//! }
//! ```
//!
//! # Building a report
//!
//! ```ignore
//! use lobster_core::{Diagnostics, DiskFiles, InterchangeExtractor, Report};
//!
//! let files = DiskFiles::current_dir()?;
//! let mut diagnostics = Diagnostics::new();
//! let report = Report::parse_config(
//!     "lobster.conf",
//!     &files,
//!     &mut InterchangeExtractor::new(),
//!     &mut diagnostics,
//! )?;
//! for (level, coverage) in &report.coverage {
//!     println!("{level}: {:.1}%", coverage.percentage());
//! }
//! report.write("report.lobster")?;
//! ```
//!
//! Every step records what it finds in a [`Diagnostics`] sink; fatal
//! problems are also returned as [`Error`].

pub mod config;
pub mod coverage;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod files;
pub mod item;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod report;
pub mod resolve;
mod schema;
pub mod status;
pub mod tag;

pub use config::{Config, Filter, FilterKind, Level, LevelKind, SourceSpec, TraceGroup};
pub use coverage::{Coverage, compute_coverage};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, Result};
pub use extract::{Extractor, InterchangeExtractor, MemoryExtractor, write_interchange};
pub use files::{DiskFiles, Files, MemoryFiles};
pub use item::{
    Activity, Implementation, Item, ItemClass, ItemError, ItemMap, Payload, Requirement,
    TracingStatus,
};
pub use location::{FileLocation, HostedLocation, Location, LocationError, SortKey, TrackerLocation};
pub use parser::{load_policy, parse_policy};
pub use report::{DEFAULT_CONFIG, DEFAULT_REPORT, Report};
pub use resolve::resolve_references;
pub use status::{Evaluation, Facts, assign_statuses, determine_status, evaluate};
pub use tag::{Tag, TagError};
