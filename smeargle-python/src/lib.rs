//! smeargle-python: PyO3 Python bindings for smeargle.
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args,
    clippy::type_complexity
)]
//!
//! Configuration documents cross the boundary as JSON strings; grids and
//! masks as numpy arrays.

use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;
use serde_json::Value;
use smeargle_config::{current_schema, load_tree, load_tree_from_file, upgrade, validate};
use smeargle_masking::{DataGrid, Dispatcher, Settings};

fn io_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyIOError::new_err(format!("{context}: {err}"))
}

fn value_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(format!("{context}: {err}"))
}

fn core_error(context: &str, err: smeargle_core::Error) -> PyErr {
    match err {
        smeargle_core::Error::Io(e) => io_error(context, e),
        other => value_error(context, other),
    }
}

fn parse_json(context: &str, json: &str) -> PyResult<Value> {
    serde_json::from_str(json).map_err(|e| value_error(context, e))
}

fn to_json_string(value: &Value) -> PyResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| value_error("Failed to serialize", e))
}

/// Validate a configuration document; returns it normalized with defaults.
#[pyfunction]
fn validate_config(config: &str) -> PyResult<String> {
    let raw = parse_json("Invalid configuration JSON", config)?;
    let tree = load_tree(&raw).map_err(|e| core_error("Invalid configuration", e))?;
    to_json_string(&tree.to_json())
}

/// Load and validate a configuration file; returns it normalized.
#[pyfunction]
fn load_config(path: &str) -> PyResult<String> {
    let tree = load_tree_from_file(path).map_err(|e| core_error("Failed to load config", e))?;
    to_json_string(&tree.to_json())
}

/// Upgrade a configuration document to the current schema.
///
/// Returns the migrated document and the migration warnings.
#[pyfunction]
fn migrate_config(config: &str) -> PyResult<(String, Vec<String>)> {
    let raw = parse_json("Invalid configuration JSON", config)?;
    let tree = upgrade(&raw).map_err(|e| core_error("Migration failed", e))?;
    let warnings = tree.warnings().iter().map(ToString::to_string).collect();
    Ok((to_json_string(&tree.to_json())?, warnings))
}

/// A configuration document of the current schema holding every default.
#[pyfunction]
fn default_config() -> PyResult<String> {
    let schema = current_schema().map_err(|e| core_error("Built-in schema", e))?;
    let tree = validate(&Value::Object(serde_json::Map::new()), &schema)
        .map_err(|e| value_error("Built-in schema", e))?;
    to_json_string(&tree.to_json())
}

/// Compute the composite mask of a 2-D grid.
///
/// Returns `(mask, provenance, warnings)`; provenance rows are
/// `(filter, class, newly_flagged, flagged)`.
#[pyfunction]
#[pyo3(signature = (data, config, prior_mask=None, bad_pixel_map=None, settings=None))]
fn compute_mask<'py>(
    py: Python<'py>,
    data: PyReadonlyArray2<f64>,
    config: &str,
    prior_mask: Option<PyReadonlyArray2<bool>>,
    bad_pixel_map: Option<PyReadonlyArray2<bool>>,
    settings: Option<&str>,
) -> PyResult<(
    Bound<'py, PyArray2<bool>>,
    Vec<(String, String, usize, usize)>,
    Vec<String>,
)> {
    let settings = match settings {
        Some(json) => Settings::from_json(json).map_err(|e| core_error("Invalid settings", e))?,
        None => Settings::default(),
    };
    let raw = parse_json("Invalid configuration JSON", config)?;
    let tree = load_tree(&raw).map_err(|e| core_error("Invalid configuration", e))?;

    let mut grid = DataGrid::new(data.as_array().to_owned());
    if let Some(prior) = prior_mask {
        grid = grid
            .with_prior_mask(prior.as_array().to_owned())
            .map_err(|e| value_error("Invalid prior mask", e))?;
    }
    let bad_pixel_map = bad_pixel_map.map(|map| map.as_array().to_owned());

    let dispatcher =
        Dispatcher::current(settings).map_err(|e| core_error("Built-in schema", e))?;
    let report = match &bad_pixel_map {
        Some(map) => dispatcher.run_with_bad_pixels(&tree, &grid, map),
        None => dispatcher.run(&tree, &grid),
    }
    .map_err(|e| core_error("Mask computation failed", e))?;

    let provenance = report
        .provenance
        .iter()
        .map(|entry| {
            (
                entry.filter.clone(),
                entry.class.to_string(),
                entry.newly_flagged,
                entry.flagged,
            )
        })
        .collect();
    let warnings = report.warnings.iter().map(ToString::to_string).collect();
    Ok((report.mask.into_pyarray(py), provenance, warnings))
}

/// Python module for smeargle.
#[pymodule]
fn smeargle(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("CURRENT_SCHEMA", smeargle_config::CURRENT_VERSION)?;
    m.add_function(wrap_pyfunction!(validate_config, m)?)?;
    m.add_function(wrap_pyfunction!(load_config, m)?)?;
    m.add_function(wrap_pyfunction!(migrate_config, m)?)?;
    m.add_function(wrap_pyfunction!(default_config, m)?)?;
    m.add_function(wrap_pyfunction!(compute_mask, m)?)?;
    Ok(())
}
