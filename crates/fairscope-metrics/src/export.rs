use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use fairscope_core::{AuditError, Dataset, Result};

/// Name of the appended weight column, avoiding collisions with the input.
pub fn weight_column_name(dataset: &Dataset) -> String {
    let mut name = "weight".to_string();
    while dataset.column_names().any(|column| column == name) {
        name.insert(0, '_');
    }
    name
}

/// Write the dataset with its reweighing weights appended as a last column.
/// Cells are written as they appeared in the input. Returns the number of
/// bytes written.
pub fn write_weighted_csv(path: &Path, dataset: &Dataset, weights: &[f64]) -> Result<u64> {
    if weights.len() != dataset.len() {
        return Err(AuditError::Serialization(format!(
            "weight count {} does not match row count {}",
            weights.len(),
            dataset.len()
        )));
    }

    let file = File::create(path).map_err(csv::Error::from)?;
    let counting = CountingWriter::new(BufWriter::new(file));
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(counting);

    let mut header: Vec<String> = dataset.column_names().map(str::to_string).collect();
    header.push(weight_column_name(dataset));
    writer.write_record(&header)?;

    for (row, weight) in weights.iter().enumerate() {
        let weight = weight.to_string();
        let record = dataset
            .columns()
            .iter()
            .map(|column| column.raw_text(row))
            .chain(std::iter::once(weight.as_str()));
        writer.write_record(record)?;
    }

    writer.flush().map_err(csv::Error::from)?;
    let counting = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    Ok(counting.bytes_written())
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
