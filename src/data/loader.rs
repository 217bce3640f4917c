//! FARS Data Loader Module
//! Resolves yearly filenames and loads accident files using Polars.

use bzip2::read::MultiBzDecoder;
use polars::prelude::*;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Leading bytes of every bzip2 stream.
const BZIP2_MAGIC: &[u8] = b"BZh";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("file '{filename}' does not exist")]
    MissingFile { filename: String },
    #[error("column '{column}' not found in '{filename}'")]
    MissingColumn { column: String, filename: String },
    #[error("Failed to read '{filename}': {source}")]
    Io {
        filename: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to load CSV: {0}")]
    Csv(#[from] PolarsError),
}

impl LoaderError {
    pub fn is_missing_file(&self) -> bool {
        matches!(self, LoaderError::MissingFile { .. })
    }
}

/// Numeric input coerced to a whole number by truncation.
pub trait WholeNumber: Copy {
    fn whole(self) -> i64;
}

macro_rules! whole_from_int {
    ($($t:ty),*) => {
        $(impl WholeNumber for $t {
            fn whole(self) -> i64 {
                self as i64
            }
        })*
    };
}

macro_rules! whole_from_float {
    ($($t:ty),*) => {
        $(impl WholeNumber for $t {
            fn whole(self) -> i64 {
                self.trunc() as i64
            }
        })*
    };
}

whole_from_int!(i16, i32, i64, u16, u32, u64, usize);
whole_from_float!(f32, f64);

/// Build the data filename for a year, e.g. `accident_2013.csv.bz2`.
pub fn make_filename<Y: WholeNumber>(year: Y) -> String {
    format!("accident_{}.csv.bz2", year.whole())
}

/// Load a comma-separated accident file, decompressing bzip2 content if present.
pub fn fars_read<P: AsRef<Path>>(path: P) -> Result<DataFrame, LoaderError> {
    let path = path.as_ref();
    let filename = path.display().to_string();

    let raw = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(LoaderError::MissingFile { filename });
        }
        Err(source) => return Err(LoaderError::Io { filename, source }),
    };

    let bytes = if raw.starts_with(BZIP2_MAGIC) {
        let mut decoded = Vec::new();
        MultiBzDecoder::new(raw.as_slice())
            .read_to_end(&mut decoded)
            .map_err(|source| LoaderError::Io {
                filename: filename.clone(),
                source,
            })?;
        decoded
    } else {
        raw
    };

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10000))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    debug!(file = %filename, rows = df.height(), "loaded accident table");
    Ok(df)
}

/// Fail with `MissingColumn` for the first required column the table lacks.
pub fn require_columns(
    df: &DataFrame,
    columns: &[&str],
    filename: &str,
) -> Result<(), LoaderError> {
    let present = df.get_column_names();
    for &column in columns {
        if !present.iter().any(|name| name.as_str() == column) {
            return Err(LoaderError::MissingColumn {
                column: column.to_string(),
                filename: filename.to_string(),
            });
        }
    }
    Ok(())
}

/// Loads yearly accident files from a fixed data directory.
#[derive(Debug, Clone)]
pub struct FarsLoader {
    data_dir: PathBuf,
}

impl Default for FarsLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FarsLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Full path of the file holding `year`'s accidents.
    pub fn path_for_year<Y: WholeNumber>(&self, year: Y) -> PathBuf {
        self.data_dir.join(make_filename(year))
    }

    /// Load the full table for a year. A missing file is an error here.
    pub fn read_year<Y: WholeNumber>(&self, year: Y) -> Result<DataFrame, LoaderError> {
        fars_read(self.path_for_year(year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{init_test_logging, write_bz2, write_plain, SAMPLE_2013};
    use tempfile::tempdir;

    #[test]
    fn test_make_filename_truncates() {
        assert_eq!(make_filename(2013), "accident_2013.csv.bz2");
        assert_eq!(make_filename(2013.9), "accident_2013.csv.bz2");
        assert_eq!(make_filename(2013.1_f32), "accident_2013.csv.bz2");
        assert_eq!(make_filename(2015_u16), "accident_2015.csv.bz2");
    }

    #[test]
    fn test_missing_file_names_the_file() {
        let err = fars_read("nonexistent.csv.bz2").unwrap_err();
        assert!(err.is_missing_file());
        assert!(err.to_string().contains("nonexistent.csv.bz2"));
    }

    #[test]
    fn test_reads_bzip2_file() {
        let dir = tempdir().unwrap();
        let path = write_bz2(dir.path(), "accident_2013.csv.bz2", SAMPLE_2013);

        let df = fars_read(&path).unwrap();
        assert_eq!(df.height(), 6);
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["STATE", "MONTH", "LATITUDE", "LONGITUD", "FATALS"]);
    }

    #[test]
    fn test_reads_plain_csv() {
        let dir = tempdir().unwrap();
        let path = write_plain(dir.path(), "plain.csv", SAMPLE_2013);

        let df = fars_read(&path).unwrap();
        assert_eq!(df.height(), 6);
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let dir = tempdir().unwrap();
        let path = write_bz2(dir.path(), "accident_2013.csv.bz2", SAMPLE_2013);

        let first = fars_read(&path).unwrap();
        let second = fars_read(&path).unwrap();
        assert!(first.equals_missing(&second));
    }

    #[test]
    fn test_loader_resolves_year_in_data_dir() {
        let dir = tempdir().unwrap();
        write_bz2(dir.path(), "accident_2013.csv.bz2", SAMPLE_2013);
        let loader = FarsLoader::new(dir.path());

        assert_eq!(
            loader.path_for_year(2013.4),
            dir.path().join("accident_2013.csv.bz2")
        );
        assert_eq!(loader.read_year(2013).unwrap().height(), 6);
        assert!(loader.read_year(2014).unwrap_err().is_missing_file());
    }

    #[test]
    fn test_require_columns() {
        let dir = tempdir().unwrap();
        let path = write_plain(dir.path(), "plain.csv", SAMPLE_2013);
        let df = fars_read(&path).unwrap();

        assert!(require_columns(&df, &["MONTH", "STATE"], "plain.csv").is_ok());
        let err = require_columns(&df, &["MONTH", "DAY"], "plain.csv").unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn { ref column, .. } if column == "DAY"));
    }

    #[test]
    fn test_reads_highly_compressed_file() {
        init_test_logging();
        let dir = tempdir().unwrap();
        // Repetitive rows compress far better than 8:1.
        let mut contents = String::from("STATE,MONTH,LATITUDE,LONGITUD,FATALS\n");
        for _ in 0..20_000 {
            contents.push_str("1,1,32.5,-86.2,1\n");
        }
        let path = write_bz2(dir.path(), "accident_2013.csv.bz2", &contents);
        assert!(std::fs::metadata(&path).unwrap().len() * 8 < contents.len() as u64);

        let df = fars_read(&path).unwrap();
        assert_eq!(df.height(), 20_000);
    }
}
