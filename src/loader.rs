//! Data providers' sources of input rows.
//!
//! A loader answers a query with `operation.nbr_input` rows of values; every
//! row has the same length within one answer.

use std::fs;
use std::path::{Path, PathBuf};

use ark_ec::pairing::Pairing;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::query::Query;

const LOG_TARGET: &str = "drynx_proofs::loader";

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Malformed query: {0}")]
    MalformedQuery(String),
    #[error("Not enough columns: need {needed}, file has {available}")]
    NotEnoughColumns { needed: usize, available: usize },
    #[error("Column '{0}' not found in header")]
    UnknownColumn(String),
    #[error("Cannot parse '{value}' on line {line}")]
    Parse { line: usize, value: String },
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait DataLoader<E: Pairing>: Send + Sync {
    fn provide(&self, query: &Query<E>) -> Result<Vec<Vec<f64>>, LoaderError>;
}

/// Uniform integers in `[generate_data_min, generate_data_max)`.
pub struct RandomLoader {
    rng: Mutex<StdRng>,
}

impl RandomLoader {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl<E: Pairing> DataLoader<E> for RandomLoader {
    fn provide(&self, query: &Query<E>) -> Result<Vec<Vec<f64>>, LoaderError> {
        let gen = &query.dp_data_gen;
        let (min, max) = (gen.generate_data_min, gen.generate_data_max);
        if max <= min {
            return Err(LoaderError::MalformedQuery(format!(
                "empty generation interval [{min}, {max})"
            )));
        }
        let rows = usize::try_from(gen.generate_rows).map_err(|_| {
            LoaderError::MalformedQuery(format!("negative row count {}", gen.generate_rows))
        })?;

        let mut rng = self.rng.lock();
        Ok((0..query.operation.nbr_input)
            .map(|_| (0..rows).map(|_| rng.gen_range(min..max) as f64).collect())
            .collect())
    }
}

/// Tab-separated file with a header line; the query's selector names the
/// column read for each input row.
pub struct FileLoader {
    path: PathBuf,
}

impl FileLoader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref().to_path_buf();
        fs::metadata(&path).map_err(|source| LoaderError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }
}

impl<E: Pairing> DataLoader<E> for FileLoader {
    fn provide(&self, query: &Query<E>) -> Result<Vec<Vec<f64>>, LoaderError> {
        let needed = query.operation.nbr_input;
        if query.selector.len() != needed {
            return Err(LoaderError::MalformedQuery(format!(
                "{} selected columns for {needed} inputs",
                query.selector.len()
            )));
        }

        let content = fs::read_to_string(&self.path).map_err(|source| LoaderError::Io {
            path: self.path.clone(),
            source,
        })?;
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());
        let header: Vec<&str> = lines.next().map(|h| h.split('\t').collect()).unwrap_or_default();
        if header.len() < needed {
            return Err(LoaderError::NotEnoughColumns {
                needed,
                available: header.len(),
            });
        }

        let indexes = query
            .selector
            .iter()
            .map(|name| {
                header
                    .iter()
                    .position(|column| column.trim() == name)
                    .ok_or_else(|| LoaderError::UnknownColumn(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns = vec![Vec::new(); needed];
        for (line_no, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != header.len() {
                return Err(LoaderError::NotEnoughColumns {
                    needed: header.len(),
                    available: fields.len(),
                });
            }
            for (column, index) in columns.iter_mut().zip(&indexes) {
                let raw = fields[*index].trim();
                let value = raw.parse::<f64>().map_err(|_| LoaderError::Parse {
                    line: line_no + 2,
                    value: raw.to_string(),
                })?;
                column.push(value);
            }
        }
        tracing::debug!(
            target: LOG_TARGET,
            path = %self.path.display(),
            rows = columns.first().map_or(0, Vec::len),
            "loaded provider data"
        );
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::choose_operation;
    use ark_bn254::Bn254;
    use std::io::Write;

    fn query(op: &str, selector: &[&str]) -> Query<Bn254> {
        let mut query = Query::new(choose_operation(op, 0, 10, 0, 0).unwrap());
        query.selector = selector.iter().map(|s| s.to_string()).collect();
        query
    }

    fn tsv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn random_loader_respects_bounds() {
        let mut q = query("cosim", &[]);
        q.dp_data_gen.generate_rows = 25;
        q.dp_data_gen.generate_data_min = 3;
        q.dp_data_gen.generate_data_max = 7;
        let rows = RandomLoader::new(1).provide(&q).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 25));
        assert!(rows.iter().flatten().all(|v| (3.0..7.0).contains(v)));

        q.dp_data_gen.generate_data_max = 3;
        assert!(RandomLoader::new(1).provide(&q).is_err());
    }

    #[test]
    fn file_loader_selects_columns_by_name() {
        let file = tsv("age\tweight\theight\n30\t70.5\t180\n41\t82\t175\n");
        let loader = FileLoader::new(file.path()).unwrap();
        let rows = loader.provide(&query("cosim", &["height", "age"])).unwrap();
        assert_eq!(rows, vec![vec![180.0, 175.0], vec![30.0, 41.0]]);
    }

    #[test]
    fn file_loader_errors() {
        let file = tsv("age\tweight\n30\tx\n");
        let loader = FileLoader::new(file.path()).unwrap();
        assert!(matches!(
            loader.provide(&query("sum", &["height"])),
            Err(LoaderError::UnknownColumn(_))
        ));
        assert!(matches!(
            loader.provide(&query("sum", &["weight"])),
            Err(LoaderError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            loader.provide(&query("sum", &["age", "weight"])),
            Err(LoaderError::MalformedQuery(_))
        ));

        let narrow = tsv("age\n1\n");
        let loader = FileLoader::new(narrow.path()).unwrap();
        assert!(matches!(
            loader.provide(&query("cosim", &["age", "age"])),
            Err(LoaderError::NotEnoughColumns { .. })
        ));
        assert!(FileLoader::new("/nonexistent/drynx.tsv").is_err());
    }
}
