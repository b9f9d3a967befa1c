use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use parquet::file::reader::{FileReader, SerializedFileReader};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::data::{ExampleKey, Sampler, TextExample};
use crate::errors::{DatasetError, Result};
use crate::types::{ImageName, Prompt};

/// Required columns of the consolidated table. Extra columns are ignored.
#[derive(Clone, Debug, Deserialize, PartialEq)]
struct TableRow {
    image_name: ImageName,
    prompt: Prompt,
    part_id: i64,
    seed: i64,
    step: i64,
    cfg: f32,
    sampler: i64,
}

impl TableRow {
    fn into_example(self) -> Result<(ExampleKey, TextExample)> {
        let sampler = Sampler::from_code(self.sampler)?;
        Ok((
            self.image_name.clone(),
            TextExample {
                image_name: self.image_name,
                prompt: self.prompt,
                part_id: self.part_id,
                seed: self.seed,
                step: self.step,
                cfg: self.cfg,
                sampler,
            },
        ))
    }
}

/// Reads the consolidated parameter table.
pub struct TabularLoader;

impl TabularLoader {
    /// Read every row into memory, preserving file order.
    pub fn load(path: &Path) -> Result<ConsolidatedTable> {
        let started = Instant::now();
        let file = File::open(path)
            .map_err(|err| DatasetError::corrupt(path, format!("failed opening table: {err}")))?;
        let reader = SerializedFileReader::new(file)
            .map_err(|err| DatasetError::corrupt(path, format!("failed reading parquet footer: {err}")))?;
        let iter = reader
            .get_row_iter(None)
            .map_err(|err| DatasetError::corrupt(path, format!("failed iterating rows: {err}")))?;

        let mut rows = Vec::new();
        for (position, row) in iter.enumerate() {
            let row = row.map_err(|err| {
                DatasetError::corrupt(path, format!("failed decoding row {position}: {err}"))
            })?;
            rows.push(row.to_json_value());
        }

        info!(
            "[diffusiondb:loader] loaded {} table rows from {} in {:.2}s",
            rows.len(),
            path.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(ConsolidatedTable {
            path: path.to_path_buf(),
            rows,
        })
    }
}

/// The consolidated table held fully in memory.
///
/// Rows are kept as decoded values; each is checked against the table schema
/// when it is pulled.
pub struct ConsolidatedTable {
    path: PathBuf,
    rows: Vec<Value>,
}

impl ConsolidatedTable {
    /// File the table was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consume the table into a row iterator.
    pub fn into_rows(self) -> TableRows {
        TableRows {
            path: self.path,
            position: 0,
            rows: self.rows.into_iter(),
        }
    }
}

/// Single-pass iterator over table rows. Schema checks and sampler
/// translation happen as each row is pulled.
pub struct TableRows {
    path: PathBuf,
    position: usize,
    rows: std::vec::IntoIter<Value>,
}

impl TableRows {
    /// Number of rows already consumed.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Iterator for TableRows {
    type Item = Result<(ExampleKey, TextExample)>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.rows.next()?;
        let index = self.position;
        self.position += 1;
        let row = serde_json::from_value::<TableRow>(value).map_err(|err| {
            DatasetError::corrupt(
                &self.path,
                format!("row {index} does not match the table schema: {err}"),
            )
        });
        Some(row.and_then(TableRow::into_example))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for TableRows {}
