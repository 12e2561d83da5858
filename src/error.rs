use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("Cycle detected in catalogue '{catalogue}': {}", .cycle.join(" -> "))]
    Cycle {
        catalogue: String,
        cycle: Vec<String>,
    },

    #[error("Line '{referenced_by}' in catalogue '{catalogue}' references undefined line '{missing}'")]
    MissingRef {
        catalogue: String,
        referenced_by: String,
        missing: String,
    },

    #[error("Line reference '{line_ref}' is defined more than once in catalogue '{catalogue}'")]
    DuplicateRef { catalogue: String, line_ref: String },

    #[error("Line '{referenced_by}' in catalogue '{catalogue}' references heading '{heading}', which carries no value")]
    HeadingReference {
        catalogue: String,
        referenced_by: String,
        heading: String,
    },

    #[error("Invalid catalogue: {0}")]
    InvalidCatalogue(String),

    #[error("Invalid tolerance {0}: must be finite and non-negative")]
    InvalidTolerance(f64),

    #[error("Trial balance import error: {0}")]
    Import(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StatementError {
    /// Structural errors mean the catalogue itself is malformed.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            StatementError::Cycle { .. }
                | StatementError::MissingRef { .. }
                | StatementError::DuplicateRef { .. }
                | StatementError::HeadingReference { .. }
                | StatementError::InvalidCatalogue(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StatementError>;
