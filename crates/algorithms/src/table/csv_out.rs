//! CSV output of feature tables

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::info;

use super::FeatureTable;
use heatisle_core::{Error, Result};

fn csv_error(e: impl std::fmt::Display) -> Error {
    Error::Csv(e.to_string())
}

impl FeatureTable {
    /// Write the header and every row as CSV to `writer`
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = self.columns().iter().map(String::as_str).collect();
        if let Some(label) = self.label() {
            header.push(&label.name);
        }
        wtr.write_record(&header).map_err(csv_error)?;

        let mut record: Vec<String> = Vec::with_capacity(header.len());
        for (i, row) in self.rows().iter().enumerate() {
            record.clear();
            record.extend(row.iter().map(|v| v.to_string()));
            if let Some(label) = self.label() {
                record.push(label.values[i].clone());
            }
            wtr.write_record(&record).map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table to `path`.
    ///
    /// Rows go to a `.partial` sibling that is renamed into place only once
    /// everything is written, so a failed run never leaves a truncated table.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("csv.partial");
        let result = File::create(&tmp)
            .map_err(Error::from)
            .and_then(|file| self.write_csv_to(std::io::BufWriter::new(file)));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path)?;
        info!("wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }
}
