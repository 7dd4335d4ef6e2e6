//! Error types for the receipts program.
//!
//! Internally everything propagates `anyhow::Error` with context attached at each I/O boundary.
//! The failures that a user is expected to see in the error banner are described by
//! `ReceiptError`; their `Display` text is the human-readable message for that failure.

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The user-facing failure kinds. External-service failures are collapsed into one variant per
/// operation so that the banner never shows transport or parsing details (those are logged).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiptError {
    /// Batch generation was requested with an empty (or all-blank) student list.
    #[error("Please enter at least one student name for batch generation.")]
    NoStudentNames,

    /// The text-generation call failed or returned data that did not match the schema.
    #[error("Failed to generate student details from AI.")]
    StudentDetails,

    /// The image-generation call failed or returned no image.
    #[error("Failed to generate AI signature.")]
    Signature,

    /// Rasterization or archive creation failed. Nothing was written.
    #[error("Failed to export receipts: {0}")]
    Export(String),

    /// An export was requested while the receipt list is empty.
    #[error("There are no receipts to export.")]
    NothingToExport,

    /// The triggering control is disabled while the same kind of operation is in flight.
    #[error("{0} is already in progress.")]
    Busy(&'static str),
}
