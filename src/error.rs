use thiserror::Error;

use crate::sql::InvalidIdentifier;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("failed to load configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Identifier(#[from] InvalidIdentifier),
}
