//! smeargle-core: Core types for detector mask composition.
//!
//! This crate provides the shared vocabulary of the workspace: the data
//! grid and mask types, the fixed-precedence mask classes, provenance
//! records, advisory warnings, and the error taxonomy every other crate
//! reports through.
//!

pub mod class;
pub mod error;
pub mod grid;
pub mod path;
pub mod provenance;
pub mod warning;

pub use class::MaskClass;
pub use error::{Axis, BoundsError, ConfigurationError, Error, Result, SchemaError};
pub use grid::{blank_mask, count_masked, DataGrid, Mask};
pub use path::KeyPath;
pub use provenance::{ProvenanceEntry, ProvenanceRecord};
pub use warning::Warning;
