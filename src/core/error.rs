use std::io;
use thiserror::Error;

/// Failure taxonomy for roster reads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("the read was canceled")]
    Canceled,
    #[error("{category}: {message}")]
    Fault { category: String, message: String },
    #[error("{} errors occurred", .0.len())]
    Aggregate(Vec<ReadError>),
}

/// One leaf of a (possibly nested) failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultCause {
    pub category: String,
    pub message: String,
}

impl ReadError {
    pub fn fault(category: &str, message: &str) -> Self {
        ReadError::Fault {
            category: category.to_string(),
            message: message.to_string(),
        }
    }

    #[allow(dead_code)]
    pub fn is_canceled(&self) -> bool {
        matches!(self, ReadError::Canceled)
    }

    /// Flattens nested aggregates into their leaf causes, depth first.
    pub fn causes(&self) -> Vec<FaultCause> {
        let mut causes = Vec::new();
        self.collect_causes(&mut causes);
        causes
    }

    fn collect_causes(&self, out: &mut Vec<FaultCause>) {
        match self {
            ReadError::Canceled => out.push(FaultCause {
                category: "Canceled".to_string(),
                message: self.to_string(),
            }),
            ReadError::Fault { category, message } => out.push(FaultCause {
                category: category.clone(),
                message: message.clone(),
            }),
            ReadError::Aggregate(inner) => {
                for error in inner {
                    error.collect_causes(out);
                }
            }
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> Self {
        ReadError::fault("IO", &err.to_string())
    }
}

impl From<serde_json::Error> for ReadError {
    fn from(err: serde_json::Error) -> Self {
        ReadError::fault("Parse", &err.to_string())
    }
}
