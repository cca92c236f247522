//! smeargle-masking: Mask composition for detector exposures.
//!
//! This crate provides the filter library and the engine that combines
//! filters into one per-pixel validity mask:
//! - **Geometric** filters - pixels, rectangles, subarrays, rows, columns
//! - **Statistical** filters - thresholds, sigma clip, rank truncation,
//!   exact and invalid values
//! - **Composition** - fixed class precedence, OR-only accumulation,
//!   provenance
//! - **Dispatch** - configuration tree in, composite mask and report out
//!
#![warn(missing_docs)]

mod compose;
pub mod config;
mod dispatch;
mod filter;
pub mod geometric;
pub mod statistical;

pub use compose::{compose, Composition, MaskComposer};
pub use config::{MaskingConfig, TrimMethod};
pub use dispatch::{DispatchReport, Dispatcher};
pub use filter::{Filter, FilterDescriptor, FilterKind, ResolvedFilters, ValueTrim};
pub use geometric::{InclusiveRange, Rect};
pub use statistical::SigmaClip;

// Re-export the types every caller of this crate needs
pub use smeargle_config::Settings;
pub use smeargle_core::{DataGrid, Mask, MaskClass, ProvenanceEntry, ProvenanceRecord, Warning};
