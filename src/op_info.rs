//! Loads the op-info reference table: a static, externally-maintained
//! file describing each known `op_code`. This is a narrow utility kept
//! outside the core ingestion pipeline — `Database::finalize` never reads
//! or requires it.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One row of the op-info reference table, keyed by `op_code`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OpInfo {
    pub op_code: String,
    #[serde(default)]
    pub num_inputs: Option<u32>,
    pub group: String,
    pub cp_type: String,
}

/// Failure modes reading or parsing the op-info file.
#[derive(Debug, thiserror::Error)]
pub enum OpInfoError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed op-info row in {}: {source}", path.display())]
    Csv {
        path: std::path::PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Reads a semicolon-separated op-info file (header
/// `op_code;num_inputs;group;cp_type`) into a map keyed by `op_code`.
pub fn load(path: impl AsRef<Path>) -> Result<HashMap<String, OpInfo>, OpInfoError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .map_err(|source| to_op_info_error(path, source))?;

    let mut table = HashMap::new();
    for record in reader.deserialize() {
        let row: OpInfo = record.map_err(|source| to_op_info_error(path, source))?;
        table.insert(row.op_code.clone(), row);
    }
    Ok(table)
}

fn to_op_info_error(path: &Path, source: csv::Error) -> OpInfoError {
    match source.kind() {
        csv::ErrorKind::Io(_) => OpInfoError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, source.to_string()),
        },
        _ => OpInfoError::Csv {
            path: path.to_path_buf(),
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_semicolon_separated_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "op_code;num_inputs;group;cp_type").unwrap();
        writeln!(file, "plus;2;arithmetic;CP").unwrap();
        writeln!(file, "rightIndex;;indexing;CP").unwrap();
        file.flush().unwrap();

        let table = load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["plus"].num_inputs, Some(2));
        assert_eq!(table["rightIndex"].num_inputs, None);
        assert_eq!(table["plus"].group, "arithmetic");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load("/nonexistent/op_info.csv").unwrap_err();
        assert!(matches!(err, OpInfoError::Io { .. }));
    }
}
