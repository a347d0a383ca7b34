//! Node ingestion from spreadsheet exports
//!
//! Reads a CSV file with a header row. Each node needs a name and a pair of
//! coordinates; the recognised column names cover the Ukrainian, Russian and
//! English headers found in warehouse lists.

use std::io::Read;
use std::path::Path;

use log::{debug, warn};

use crate::core::error::{suggest_correction, Error, Result};
use crate::core::pairs::Node;

const NAME_COLUMNS: &[&str] = &["Склад", "Название", "Node", "Вузол", "Name", "ID"];
const LAT_COLUMNS: &[&str] = &["Широта", "Lat", "Latitude"];
const LNG_COLUMNS: &[&str] = &["Довгота", "Lng", "Longitude"];

/// Column indices for one field, in alias priority order
fn find_columns(headers: &[String], aliases: &[&str]) -> Vec<usize> {
    aliases
        .iter()
        .filter_map(|alias| {
            headers
                .iter()
                .position(|h| h.trim().to_lowercase() == alias.to_lowercase())
        })
        .collect()
}

fn missing_column(field: &str, headers: &[String], aliases: &[&str]) -> Error {
    let close = aliases
        .iter()
        .find_map(|alias| suggest_correction(alias, headers.iter().map(String::as_str)));

    let expected = aliases.join(", ");
    match close {
        Some(header) => Error::InvalidInput(format!(
            "No {field} column found (expected one of: {expected}). Did you mean to rename '{header}'?"
        )),
        None => Error::InvalidInput(format!(
            "No {field} column found (expected one of: {expected})"
        )),
    }
}

/// First non-empty value among `columns`
fn first_value<'r>(record: &'r csv::StringRecord, columns: &[usize]) -> Option<&'r str> {
    columns
        .iter()
        .filter_map(|&i| record.get(i))
        .map(str::trim)
        .find(|v| !v.is_empty())
}

fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    // Spreadsheets in comma-decimal locales export "50,85"
    let value = value?.replace(',', ".");
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read nodes from any CSV source
///
/// Rows with a missing or non-numeric coordinate are dropped.
pub fn read_nodes_from_reader<R: Read>(reader: R) -> Result<Vec<Node>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    let name_cols = find_columns(&headers, NAME_COLUMNS);
    let lat_cols = find_columns(&headers, LAT_COLUMNS);
    let lng_cols = find_columns(&headers, LNG_COLUMNS);

    if lat_cols.is_empty() {
        return Err(missing_column("latitude", &headers, LAT_COLUMNS));
    }
    if lng_cols.is_empty() {
        return Err(missing_column("longitude", &headers, LNG_COLUMNS));
    }

    let mut nodes = Vec::new();
    let mut dropped = 0usize;

    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let lat = parse_coordinate(first_value(&record, &lat_cols));
        let lng = parse_coordinate(first_value(&record, &lng_cols));

        let (Some(lat), Some(lng)) = (lat, lng) else {
            dropped += 1;
            debug!("Dropping row {}: no valid coordinates", row + 2);
            continue;
        };

        let name = first_value(&record, &name_cols)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Node {}", nodes.len() + 1));
        nodes.push(Node::new(name, lat, lng));
    }

    if dropped > 0 {
        warn!("⚠️  Skipped {dropped} rows without valid coordinates");
    }

    Ok(nodes)
}

/// Read nodes from a CSV file
pub fn read_nodes(path: impl AsRef<Path>) -> Result<Vec<Node>> {
    let file = std::fs::File::open(path.as_ref())?;
    read_nodes_from_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_english_headers() {
        let data = "Name,Latitude,Longitude\nBrussels,50.8503,4.3517\nAntwerp,51.2194,4.4025\n";
        let nodes = read_nodes_from_reader(data.as_bytes()).unwrap();

        assert_eq!(
            nodes,
            vec![
                Node::new("Brussels", 50.8503, 4.3517),
                Node::new("Antwerp", 51.2194, 4.4025),
            ]
        );
    }

    #[test]
    fn test_read_cyrillic_headers_and_alias_priority() {
        let data = "ID,Склад,Широта,Довгота\n17,Київ-1,50.45,30.52\n18,,49.84,24.03\n";
        let nodes = read_nodes_from_reader(data.as_bytes()).unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "Київ-1");
        // Empty preferred column falls through to the next alias
        assert_eq!(nodes[1].name, "18");
        assert_eq!(nodes[1].lng, 24.03);
    }

    #[test]
    fn test_rows_without_coordinates_are_dropped() {
        let data = "node,lat,lng\nA,50.1,4.2\nB,,4.3\nC,north,4.4\nD,inf,4.5\nE,\"50,5\",\"4,6\"\n";
        let nodes = read_nodes_from_reader(data.as_bytes()).unwrap();

        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["A", "E"]);
        assert_eq!(nodes[1].lat, 50.5);
        assert_eq!(nodes[1].lng, 4.6);
    }

    #[test]
    fn test_missing_name_column_generates_names() {
        let data = "Lat,Lng\n1.0,2.0\n3.0,4.0\n";
        let nodes = read_nodes_from_reader(data.as_bytes()).unwrap();
        assert_eq!(nodes[0].name, "Node 1");
        assert_eq!(nodes[1].name, "Node 2");
    }

    #[test]
    fn test_missing_coordinate_column_is_reported() {
        let data = "Name,Latitud,Longitude\nA,1.0,2.0\n";
        match read_nodes_from_reader(data.as_bytes()) {
            Err(Error::InvalidInput(msg)) => {
                assert!(msg.contains("No latitude column"), "{msg}");
                assert!(msg.contains("'Latitud'"), "{msg}");
            }
            other => panic!("Expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_read_nodes_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.csv");
        std::fs::write(&path, "Name,Lat,Lng\nDepot,50.0,4.0\n").unwrap();

        let nodes = read_nodes(&path).unwrap();
        assert_eq!(nodes, vec![Node::new("Depot", 50.0, 4.0)]);

        assert!(matches!(
            read_nodes(dir.path().join("missing.csv")),
            Err(Error::IoError(_))
        ));
    }
}
