//! smeargle CLI
//!
//! Validates, migrates and applies mask composition configurations.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::redundant_closure_for_method_calls,
    clippy::manual_let_else,
    clippy::too_many_lines
)]

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use smeargle_config::{
    current_schema, known_versions, load_tree, schema_for, upgrade, validate, ValidatedTree,
};
use smeargle_core::ConfigurationError;
use smeargle_masking::{DataGrid, DispatchReport, Dispatcher, Mask, ProvenanceRecord, Settings};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Core(#[from] smeargle_core::Error),

    #[error("{}: {reason}", path.display())]
    Grid { path: PathBuf, reason: String },

    #[error("{} and {} would both write {name}", first.display(), second.display())]
    DuplicateOutput {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("{failed} of {total} grid(s) failed")]
    Failed { failed: usize, total: usize },
}

impl From<ConfigurationError> for CliError {
    fn from(err: ConfigurationError) -> Self {
        CliError::Core(err.into())
    }
}

/// Configuration-driven pixel mask composition.
#[derive(Parser)]
#[command(name = "smeargle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log every filter invocation (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration document against the schema it declares
    Validate {
        /// Configuration file (JSON)
        config: PathBuf,

        /// Also fail when the document is not written for the current schema
        #[arg(long)]
        current: bool,
    },

    /// Upgrade a configuration document to the current schema
    Migrate {
        /// Configuration file (JSON)
        config: PathBuf,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a configuration document holding every default
    Defaults {
        /// Schema revision (current when omitted)
        #[arg(long)]
        schema: Option<String>,
    },

    /// List schema revisions, or the keys of one revision
    Schema {
        /// Schema revision to describe
        version: Option<String>,
    },

    /// Compute masks for one or more grids
    Mask {
        /// Input grid file(s) (JSON, 2-D array of numbers; null is NaN)
        #[arg(required = true)]
        grids: Vec<PathBuf>,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output root directory
        #[arg(short, long)]
        output: PathBuf,

        /// Settings file (JSON)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Bad pixel map (JSON, 2-D array of booleans)
        #[arg(long)]
        bad_pixels: Option<PathBuf>,

        /// Prior mask applied to every grid (JSON, 2-D array of booleans)
        #[arg(long)]
        prior_mask: Option<PathBuf>,

        /// Migrate a stale configuration instead of refusing it
        #[arg(long)]
        migrate: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate { config, current } => {
            let raw = read_json(&config)?;
            let tree = load_tree(&raw)?;
            if current {
                let schema = current_schema()?;
                if !tree.is_current(&schema) {
                    return Err(ConfigurationError::StaleSchema {
                        found: tree.config_spec().to_string(),
                        expected: schema.version().to_string(),
                    }
                    .into());
                }
            }
            println!(
                "{}: valid {} configuration ({} keys, {} warnings)",
                config.display(),
                tree.schema_version(),
                tree.leaves().len(),
                tree.warnings().len()
            );
        }

        Commands::Migrate { config, output } => {
            let raw = read_json(&config)?;
            let tree = upgrade(&raw)?;
            for warning in tree.warnings() {
                eprintln!("warning: {}", warning);
            }
            write_json(output.as_deref(), &tree.to_json())?;
        }

        Commands::Defaults { schema } => {
            let schema = match schema {
                Some(version) => schema_for(&version)?,
                None => current_schema()?,
            };
            let tree = validate(&Value::Object(serde_json::Map::new()), &schema)
                .map_err(smeargle_core::Error::from)?;
            write_json(None, &tree.to_json())?;
        }

        Commands::Schema { version } => match version {
            None => {
                let current = current_schema()?;
                for version in known_versions() {
                    let marker = if version == current.version() { " (current)" } else { "" };
                    println!("{}{}", version, marker);
                }
            }
            Some(version) => {
                let schema = schema_for(&version)?;
                if let Some(description) = schema.description() {
                    println!("{}", description);
                }
                for (path, leaf) in schema.leaves() {
                    let default = leaf
                        .default
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |d| d.to_json().to_string());
                    println!("{}\t{}\t{}", path, leaf.value_type.name(), default);
                }
            }
        },

        Commands::Mask {
            grids,
            config,
            output,
            settings,
            bad_pixels,
            prior_mask,
            migrate,
        } => {
            check_unique_outputs(&grids)?;
            let settings = match settings {
                Some(path) => Settings::from_file(path)?,
                None => Settings::default(),
            };
            let raw = read_json(&config)?;
            let tree = if migrate { upgrade(&raw)? } else { load_tree(&raw)? };
            let bad_pixels = bad_pixels.as_deref().map(read_mask).transpose()?;
            let prior_mask = prior_mask.as_deref().map(read_mask).transpose()?;

            let target = output.join(&settings.mask_subdirectory);
            fs::create_dir_all(&target)?;
            let dispatcher = Dispatcher::current(settings)?;
            // Refuse a stale tree once, before touching any grid
            dispatcher.check_version(&tree)?;

            log::info!(
                "Masking {} grid(s) into {}",
                grids.len(),
                target.display()
            );
            let start = Instant::now();

            let outcomes: Vec<(PathBuf, Result<DispatchReport>)> = grids
                .par_iter()
                .map(|path| {
                    let outcome = mask_one(
                        &dispatcher,
                        &tree,
                        path,
                        &target,
                        bad_pixels.as_ref(),
                        prior_mask.as_ref(),
                    );
                    (path.clone(), outcome)
                })
                .collect();

            let mut failed = 0usize;
            for (path, outcome) in &outcomes {
                match outcome {
                    Ok(report) => println!(
                        "{}: masked {}/{} pixels ({:.2}%)",
                        path.display(),
                        report.masked_count,
                        report.total_pixels,
                        report.masked_fraction() * 100.0
                    ),
                    Err(err) => {
                        failed += 1;
                        eprintln!("{}: {}", path.display(), err);
                    }
                }
            }
            log::info!("Done in {:.2}s", start.elapsed().as_secs_f64());

            if failed > 0 {
                return Err(CliError::Failed {
                    failed,
                    total: outcomes.len(),
                });
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

/// Serialized result of one grid.
#[derive(Serialize)]
struct MaskFile<'a> {
    grid: String,
    config_spec: &'a str,
    masked_count: usize,
    total_pixels: usize,
    masked_fraction: f64,
    provenance: &'a ProvenanceRecord,
    warnings: Vec<String>,
    mask: Vec<Vec<bool>>,
}

/// File name a grid's report is written to.
fn output_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map_or_else(|| "grid".into(), |s| s.to_string_lossy());
    format!("{stem}.mask.json")
}

/// Fails when two grids would write the same report file.
fn check_unique_outputs(grids: &[PathBuf]) -> Result<()> {
    let mut seen: HashMap<String, &PathBuf> = HashMap::new();
    for path in grids {
        let name = output_name(path);
        if let Some(first) = seen.get(&name) {
            return Err(CliError::DuplicateOutput {
                name,
                first: first.to_path_buf(),
                second: path.clone(),
            });
        }
        seen.insert(name, path);
    }
    Ok(())
}

fn mask_one(
    dispatcher: &Dispatcher,
    tree: &ValidatedTree,
    path: &Path,
    target: &Path,
    bad_pixels: Option<&Mask>,
    prior_mask: Option<&Mask>,
) -> Result<DispatchReport> {
    let mut grid = read_grid(path)?;
    if let Some(prior) = prior_mask {
        grid = grid.with_prior_mask(prior.clone())?;
    }
    let report = match bad_pixels {
        Some(map) => dispatcher.run_with_bad_pixels(tree, &grid, map)?,
        None => dispatcher.run(tree, &grid)?,
    };

    let destination = target.join(output_name(path));
    let file = MaskFile {
        grid: path.display().to_string(),
        config_spec: tree.config_spec(),
        masked_count: report.masked_count,
        total_pixels: report.total_pixels,
        masked_fraction: report.masked_fraction(),
        provenance: &report.provenance,
        warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
        mask: report.mask.rows().into_iter().map(|row| row.to_vec()).collect(),
    };
    let writer = BufWriter::new(File::create(&destination)?);
    serde_json::to_writer_pretty(writer, &file)?;
    log::debug!("wrote {}", destination.display());
    Ok(report)
}

fn read_json(path: &Path) -> Result<Value> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json(output: Option<&Path>, value: &Value) -> Result<()> {
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
            writer.flush()?;
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Reads a grid: nested rows with `null` for NaN, or ndarray's own
/// serialized form.
fn read_grid(path: &Path) -> Result<DataGrid> {
    let raw = read_json(path)?;
    let values: Array2<f64> = if raw.is_array() {
        let rows: Vec<Vec<Option<f64>>> = serde_json::from_value(raw)?;
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        rows_to_array(path, rows)?
    } else {
        serde_json::from_value(raw)?
    };
    Ok(DataGrid::new(values))
}

/// Reads a boolean mask: nested rows or ndarray's serialized form.
fn read_mask(path: &Path) -> Result<Mask> {
    let raw = read_json(path)?;
    if raw.is_array() {
        let rows: Vec<Vec<bool>> = serde_json::from_value(raw)?;
        rows_to_array(path, rows)
    } else {
        Ok(serde_json::from_value(raw)?)
    }
}

fn rows_to_array<T: Clone>(path: &Path, rows: Vec<Vec<T>>) -> Result<Array2<T>> {
    let height = rows.len();
    let width = rows.first().map_or(0, |row| row.len());
    if let Some(index) = rows.iter().position(|row| row.len() != width) {
        return Err(CliError::Grid {
            path: path.to_path_buf(),
            reason: format!(
                "row {} has {} entries, expected {}",
                index,
                rows[index].len(),
                width
            ),
        });
    }
    let flat: Vec<T> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((height, width), flat).map_err(|e| CliError::Grid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, value: &Value) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_read_grid_nested_rows() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "g.json", &json!([[1.0, 2.0], [null, 4]]));
        let grid = read_grid(&path).unwrap();
        assert_eq!(grid.shape(), (2, 2));
        assert!(grid.values()[[1, 0]].is_nan());
        assert!((grid.values()[[1, 1]] - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "g.json", &json!([[1.0, 2.0], [3.0]]));
        assert!(matches!(read_grid(&path), Err(CliError::Grid { .. })));
    }

    #[test]
    fn test_read_mask_nested_rows() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "m.json", &json!([[true, false, false]]));
        let mask = read_mask(&path).unwrap();
        assert_eq!(mask.dim(), (1, 3));
        assert!(mask[[0, 0]]);
    }

    #[test]
    fn test_grids_sharing_a_stem_are_rejected() {
        let grids = vec![
            PathBuf::from("a/frame.json"),
            PathBuf::from("b/other.json"),
            PathBuf::from("b/frame.json"),
        ];
        match check_unique_outputs(&grids) {
            Err(CliError::DuplicateOutput {
                name,
                first,
                second,
            }) => {
                assert_eq!(name, "frame.mask.json");
                assert_eq!(first, PathBuf::from("a/frame.json"));
                assert_eq!(second, PathBuf::from("b/frame.json"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(check_unique_outputs(&grids[..2]).is_ok());
    }

    #[test]
    fn test_mask_one_writes_report() {
        let dir = tempdir().unwrap();
        let grid = write(dir.path(), "frame.json", &json!([[1.0, 2.0], [3.0, 4.0]]));
        let tree = upgrade(&json!({
            "meta": {"config_spec": "smeargle-masking-2"},
            "geometric": {"run_mask_rows": true, "row_list": [1]}
        }))
        .unwrap();
        let dispatcher = Dispatcher::current(Settings::default()).unwrap();

        let report = mask_one(&dispatcher, &tree, &grid, dir.path(), None, None).unwrap();
        assert_eq!(report.masked_count, 2);

        let written = read_json(&dir.path().join("frame.mask.json")).unwrap();
        assert_eq!(written["masked_count"], json!(2));
        assert_eq!(written["mask"], json!([[false, false], [true, true]]));
        assert_eq!(written["provenance"]["entries"][0]["filter"], json!("rows"));
    }
}
