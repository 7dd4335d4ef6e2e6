//! Types that represent the core data model, such as `ReceiptRecord` and `Amount`.
mod amount;
mod image;
mod receipt;

pub use amount::{Amount, AmountError};
pub use image::ImageRef;
pub use receipt::{
    academic_year, ReceiptField, ReceiptRecord, SchoolInfo, StudentDetails,
    MAX_GENERATED_AMOUNT, MIN_GENERATED_AMOUNT,
};
