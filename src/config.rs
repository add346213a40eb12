use std::env;

use crate::error::ExporterError;
use crate::pipeline::Destination;
use crate::sql::Identifier;

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_PROBE_SIZE: usize = 1000;
const DEFAULT_EXPORT_FILE: &str = "/tmp/product-export.ndjson";

#[derive(Debug)]
pub struct Settings {
    pub warehouse_url: String,
    pub dataset_name: String,
    pub target_table: String,
    pub staging_table: String,
    pub batch_size: usize,
    /// Local path for the intermediate NDJSON artifact.
    pub export_file_path: String,
    /// Record count for the synthetic performance probe.
    pub probe_size: usize,
}

impl Settings {
    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<(), ExporterError> {
        if self.warehouse_url.trim().is_empty() {
            return Err(ExporterError::Config(
                "warehouse URL cannot be empty".to_string(),
            ));
        }
        Identifier::new(&self.dataset_name)?;
        Identifier::new(&self.target_table)?;
        Identifier::new(&self.staging_table)?;
        if self.batch_size == 0 {
            return Err(ExporterError::Config(
                "batch size must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    pub fn destination(&self) -> Result<Destination, ExporterError> {
        Destination::new(
            &self.dataset_name,
            &self.target_table,
            &self.staging_table,
            self.batch_size,
        )
    }
}

pub fn get_configuration() -> Result<Settings, Box<dyn std::error::Error>> {
    let warehouse_url = env::var("APP_WAREHOUSE_URL")?;
    let dataset_name = env::var("APP_DATASET_NAME")?;
    let target_table = env::var("APP_TARGET_TABLE")?;
    let staging_table = env::var("APP_STAGING_TABLE")?;

    let batch_size = env::var("APP_BATCH_SIZE")
        .unwrap_or_else(|_| DEFAULT_BATCH_SIZE.to_string())
        .parse::<usize>()?;
    let export_file_path =
        env::var("APP_EXPORT_FILE_PATH").unwrap_or_else(|_| DEFAULT_EXPORT_FILE.to_string());
    let probe_size = env::var("APP_PROBE_SIZE")
        .unwrap_or_else(|_| DEFAULT_PROBE_SIZE.to_string())
        .parse::<usize>()?;

    let settings = Settings {
        warehouse_url,
        dataset_name,
        target_table,
        staging_table,
        batch_size,
        export_file_path,
        probe_size,
    };

    settings.validate()?;

    Ok(settings)
}
