//! Drives ingestion of whole files: stats each file, registers a trace,
//! streams lines through the grammar and item loader, and wraps failures
//! with file/line context.

use crate::error::LoadError;
use crate::grammar::parse_line;
use crate::item_loader::{load_parsed_line, ItemLoadError};
use crate::Database;
use rand::RngCore;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

fn item_error_to_load_error(err: ItemLoadError, file: &Path, line: usize) -> LoadError {
    match err {
        ItemLoadError::MissingReference(id) => LoadError::MissingReference {
            file: file.to_path_buf(),
            line,
            id,
        },
        ItemLoadError::InvalidBoolean(value) => LoadError::InvalidBoolean {
            file: file.to_path_buf(),
            line,
            value,
        },
        ItemLoadError::InvalidType(tag) => LoadError::InvalidType {
            file: file.to_path_buf(),
            line,
            tag,
        },
        ItemLoadError::EmptyRecord => LoadError::EmptyRecord {
            file: file.to_path_buf(),
            line,
        },
    }
}

/// Drives ingestion of one or more `.lineage` files into a shared
/// [`Database`].
///
/// A `TraceLoader` carries only the RNG used to sample `execution_time`
/// and `execution_type`; all accumulated data lives on the `Database`
/// passed to [`TraceLoader::load_file`]. Construct with
/// [`TraceLoader::new`] for `rand::thread_rng()`, or
/// [`TraceLoader::with_rng`] to inject a seeded RNG for deterministic
/// tests.
pub struct TraceLoader {
    rng: Box<dyn RngCore>,
}

impl TraceLoader {
    pub fn new() -> Self {
        Self {
            rng: Box::new(rand::thread_rng()),
        }
    }

    pub fn with_rng(rng: impl RngCore + 'static) -> Self {
        Self { rng: Box::new(rng) }
    }

    /// Loads one file into `db`: stats it for a UTC last-modified
    /// timestamp, registers a new Trace row, then streams and interprets
    /// each line in order. Aborts on the first parse or load failure,
    /// identifying the file, the 1-based line, and the error.
    pub fn load_file(&mut self, path: impl AsRef<Path>, db: &mut Database) -> Result<(), LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata = file.metadata().map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let date: chrono::DateTime<chrono::Utc> = metadata
            .modified()
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .into();

        let trace_id = db.register_trace(path.to_string_lossy().into_owned(), date);
        log::debug!("registered trace {} for {}", trace_id, path.display());

        let reader = BufReader::new(file);
        let mut line_count = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let parsed = parse_line(&line, line_number).map_err(|_| LoadError::Parse {
                file: path.to_path_buf(),
                line: line_number,
                text: line.clone(),
            })?;
            load_parsed_line(db, trace_id, parsed, self.rng.as_mut())
                .map_err(|err| item_error_to_load_error(err, path, line_number))?;
            line_count = line_number;
        }

        log::debug!(
            "finished trace {} for {}: {} lines",
            trace_id,
            path.display(),
            line_count
        );
        Ok(())
    }
}

impl Default for TraceLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::io::Write;

    fn fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".lineage")
            .tempfile()
            .unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn loads_a_small_trace() {
        let fixture = fixture(
            "(1)(L)1·SCALAR·INT64·true\n\
             (2)(L)2·SCALAR·INT64·true\n\
             (3)(I)plus (1) (2)\n",
        );
        let mut db = Database::new();
        let mut loader = TraceLoader::with_rng(rand::rngs::StdRng::seed_from_u64(1));
        loader.load_file(fixture.path(), &mut db).unwrap();

        let tables = db.finalize();
        assert_eq!(tables.trace.len(), 1);
        assert_eq!(tables.trace_item.len(), 3);
        assert_eq!(tables.literal.len(), 2);
        assert_eq!(tables.instruction.len(), 1);
        assert_eq!(tables.lineage.len(), 2);
    }

    #[test]
    fn reports_file_and_line_on_malformed_record() {
        let fixture = fixture("this is not a record\n");
        let mut db = Database::new();
        let mut loader = TraceLoader::with_rng(rand::rngs::StdRng::seed_from_u64(1));
        let err = loader.load_file(fixture.path(), &mut db).unwrap_err();
        match err {
            LoadError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn reports_missing_reference() {
        let fixture = fixture("(1)(I)plus (99)\n");
        let mut db = Database::new();
        let mut loader = TraceLoader::with_rng(rand::rngs::StdRng::seed_from_u64(1));
        let err = loader.load_file(fixture.path(), &mut db).unwrap_err();
        match err {
            LoadError::MissingReference { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
