pub mod config;
pub mod error;
pub mod navigation;
pub mod task;
pub mod types;

pub use error::AppError;
pub use types::{ErrorCategory, ErrorSeverity};
