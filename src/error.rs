use std::fmt;

use thiserror::Error;

use crate::hw::DriverStatus;

/// Capacity of the per-handle error field, in bytes.
pub const ERROR_MESSAGE_CAPACITY: usize = 256;

#[derive(Error, Debug)]
pub enum SnapError {
    /// Rejected before any hardware call was made.
    #[error("{0}")]
    InvalidInput(String),

    /// The codec path is not compiled in or not present.
    #[error("{0}")]
    Unavailable(String),

    /// A buffer pool had nothing to hand out.
    #[error("{0}")]
    ResourceExhausted(String),

    /// A driver call returned a non-success status.
    #[error("{operation}: {status}")]
    Driver {
        operation: String,
        status: DriverStatus,
    },

    /// The wait gate expired; the hardware may still complete later.
    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Conversion(String),

    /// A pipeline stage failed; used by the facade to prefix the inner message.
    #[error("{stage}: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<SnapError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapError {
    pub(crate) fn driver(operation: impl Into<String>, status: DriverStatus) -> Self {
        SnapError::Driver {
            operation: operation.into(),
            status,
        }
    }

    pub(crate) fn stage(stage: &'static str, source: SnapError) -> Self {
        SnapError::Stage {
            stage,
            source: Box::new(source),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            SnapError::Timeout(_) => true,
            SnapError::Stage { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        match self {
            SnapError::Unavailable(_) => true,
            SnapError::Stage { source, .. } => source.is_unavailable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;

/// Fixed-capacity error text owned by a pipeline handle.
///
/// Each write replaces the previous message entirely. Text longer than
/// [`ERROR_MESSAGE_CAPACITY`] bytes is cut at the last char boundary that fits.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ErrorMessage {
    text: String,
}

impl ErrorMessage {
    pub const fn new() -> Self {
        Self {
            text: String::new(),
        }
    }

    pub fn set(&mut self, message: impl fmt::Display) {
        let mut text = message.to_string();
        if text.len() > ERROR_MESSAGE_CAPACITY {
            let mut cut = ERROR_MESSAGE_CAPACITY;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        self.text = text;
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Debug for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.text, f)
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
