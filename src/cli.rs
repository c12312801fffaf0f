//! Command-line interface implementation

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::catalog::{Catalog, CatalogError};
use crate::diagnostics::UnknownItems;
use crate::loader::{load_catalog, parse_requirements};
use crate::records::Warning;
use crate::required::RequiredItems;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// Partstock - resolve part inventories across id namespaces
#[derive(Parser)]
#[command(name = "pst")]
#[command(about = "Partstock - resolve part inventories across id namespaces")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate a catalog, printing summary statistics
    Check {
        /// Catalog file (JSON5 records, one object per chunk)
        catalog: PathBuf,
    },
    /// Resolve a requirement list against a catalog and export it
    Resolve {
        /// Catalog file (JSON5 records, one object per chunk)
        catalog: PathBuf,

        /// Requirement list file (JSON5 requirement records)
        requirements: PathBuf,

        /// Target namespace for the exported items
        #[arg(short, long)]
        namespace: String,

        /// Include the weight estimate in the output
        #[arg(long)]
        weight: bool,

        /// Include every potentially-matching item in the output
        #[arg(long)]
        interesting: bool,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { catalog } => run_check(&catalog),
        Commands::Resolve {
            catalog,
            requirements,
            namespace,
            weight,
            interesting,
        } => run_resolve(&catalog, &requirements, &namespace, weight, interesting),
    }
}

/// Execute the check command
fn run_check(catalog_path: &Path) -> ExitCode {
    let catalog = match open_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(code) => return code,
    };
    println!(
        "{} parts, {} colors",
        catalog.num_parts(),
        catalog.num_colors()
    );
    ExitCode::from(EXIT_SUCCESS)
}

/// Execute the resolve command
fn run_resolve(
    catalog_path: &Path,
    requirements_path: &Path,
    namespace: &str,
    weight: bool,
    interesting: bool,
) -> ExitCode {
    let catalog = match open_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(code) => return code,
    };

    let file = match File::open(requirements_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Error: Cannot open requirement file '{}': {}",
                requirements_path.display(),
                e
            );
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    let parse = parse_requirements(BufReader::new(file));
    print_warnings(&parse.warnings);

    let mut unknown = UnknownItems::new();
    let mut items = RequiredItems::new(&catalog);
    for record in &parse.records {
        if record.colors.is_empty() {
            eprintln!(
                "Warning: request for '{}:{}' has no colors, skipped",
                record.namespace, record.part
            );
            continue;
        }
        items.add_item(
            &record.namespace,
            &record.part,
            &record.colors,
            record.count,
            &mut unknown,
        );
    }

    let exported = items.export_to_namespace(namespace, &mut unknown);

    let mut output = serde_json::json!({
        "items": exported,
        "diagnostics": unknown,
    });
    if weight {
        output["weight_grams"] = serde_json::json!(items.weight_estimate_grams());
    }
    if interesting {
        let mut candidates: Vec<String> = items
            .interesting_items(namespace)
            .iter()
            .map(ToString::to_string)
            .collect();
        candidates.sort();
        output["interesting"] = serde_json::json!(candidates);
    }

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: Cannot serialize output: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    }
    ExitCode::from(EXIT_SUCCESS)
}

fn open_catalog(path: &Path) -> Result<Catalog, ExitCode> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Error: Cannot open catalog file '{}': {}",
                path.display(),
                e
            );
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
    };
    match load_catalog(BufReader::new(file)) {
        Ok((catalog, warnings)) => {
            print_warnings(&warnings);
            Ok(catalog)
        }
        Err(CatalogError::Invalid(errors)) => {
            for error in &errors {
                eprintln!("Error: {}", error);
            }
            Err(ExitCode::from(EXIT_ERROR))
        }
    }
}

fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("Warning: line {}: {}", warning.line, warning.message);
    }
}
