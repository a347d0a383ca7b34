//! Result export
//!
//! Writes resolved rows as a CSV document with the columns
//! `Node 1, Node 2, Distance (km), Time (min)`.

use std::io::Write;
use std::path::Path;

use crate::core::error::{Error, Result};
use crate::core::pairs::TravelTime;
use crate::core::sink::ExportRow;

/// File name used when no output path is given
pub const DEFAULT_EXPORT_FILE: &str = "Distances_Results.csv";

const HEADER: [&str; 4] = ["Node 1", "Node 2", "Distance (km)", "Time (min)"];

/// Overwrite behavior for existing files
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OverwriteBehavior {
    /// Prompt user for confirmation (default)
    #[default]
    Prompt,
    /// Force overwrite without prompting
    Force,
    /// Never overwrite, fail if file exists
    NeverOverwrite,
}

/// Check if destination file exists and handle overwrite behavior
pub fn check_overwrite_permission(path: &Path, behavior: &OverwriteBehavior) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let shown = path.display();

    match behavior {
        OverwriteBehavior::Force => {
            eprintln!("⚠️  Overwriting existing file: {shown}");
            Ok(())
        }
        OverwriteBehavior::NeverOverwrite => Err(Error::IoError(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("File already exists: {shown} (use --force to overwrite)"),
        ))),
        OverwriteBehavior::Prompt => {
            eprintln!("⚠️  File already exists: {shown}");
            eprint!("Overwrite? [y/N]: ");
            std::io::stderr().flush()?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            match input.trim().to_lowercase().as_str() {
                "y" | "yes" => {
                    eprintln!("✅ Overwriting file");
                    Ok(())
                }
                _ => {
                    eprintln!("❌ Export cancelled");
                    Err(Error::IoError(std::io::Error::new(
                        std::io::ErrorKind::Interrupted,
                        "Export cancelled by user",
                    )))
                }
            }
        }
    }
}

fn format_duration(duration: TravelTime) -> String {
    match duration {
        TravelTime::Minutes(minutes) => format!("{minutes:.1}"),
        TravelTime::Unknown => "unknown".to_string(),
        TravelTime::Unresolved => String::new(),
    }
}

/// Write rows to any destination
pub fn write_rows<W: Write>(rows: &[ExportRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADER)?;

    for row in rows {
        let distance = format!("{:.2}", row.distance_km);
        let duration = format_duration(row.duration);
        csv_writer.write_record([
            row.from_name.as_str(),
            row.to_name.as_str(),
            distance.as_str(),
            duration.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write rows to `path`, honouring the overwrite behavior
///
/// An empty row set is refused: there is nothing calculated to export.
pub fn write_csv(rows: &[ExportRow], path: impl AsRef<Path>, overwrite: &OverwriteBehavior) -> Result<()> {
    if rows.is_empty() {
        return Err(Error::InvalidInput("No calculated data".to_string()));
    }

    let path = path.as_ref();
    check_overwrite_permission(path, overwrite)?;

    let file = std::fs::File::create(path)?;
    write_rows(rows, std::io::BufWriter::new(file))
}
