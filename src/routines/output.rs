use std::fs::{create_dir_all, File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use eyre::{Result, WrapErr};

use crate::routines::settings::Settings;
use crate::structs::metrics::RunningMetrics;

/// Contains all the necessary information of an output file
#[derive(Debug)]
pub struct OutputFile {
    file: File,
    relative_path: PathBuf,
}

impl OutputFile {
    /// Create (or truncate) `folder/file_name`, creating `folder` if needed.
    pub fn new(folder: &str, file_name: &str) -> Result<Self> {
        let relative_path = Path::new(folder).join(file_name);

        if let Some(parent) = relative_path.parent() {
            create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directories for {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&relative_path)
            .wrap_err_with(|| format!("Failed to open file: {:?}", relative_path))?;

        Ok(OutputFile {
            file,
            relative_path,
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_owned(self) -> File {
        self.file
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }
}

/// Writes the metric table, one row per iteration and one column per configuration.
///
/// Missing cells are left empty.
pub fn write_metrics(metrics: &RunningMetrics, folder: &str, file_name: &str) -> Result<PathBuf> {
    let outputfile = OutputFile::new(folder, file_name)?;
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_writer(outputfile.file());

    let mut header = vec!["iteration".to_string()];
    header.extend(metrics.labels().iter().cloned());
    writer.write_record(&header)?;

    for (iteration, row) in metrics.values().outer_iter().enumerate() {
        let mut record = vec![iteration.to_string()];
        record.extend(row.iter().map(|v| {
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    tracing::debug!("Metrics written to {:?}", outputfile.relative_path());
    Ok(outputfile.relative_path().to_path_buf())
}

/// Writes the settings used for a run as pretty-printed JSON.
pub fn write_settings(settings: &Settings, folder: &str) -> Result<PathBuf> {
    let outputfile = OutputFile::new(folder, "settings.json")?;
    serde_json::to_writer_pretty(outputfile.file(), settings)
        .wrap_err("Failed to serialize settings")?;
    Ok(outputfile.relative_path().to_path_buf())
}
