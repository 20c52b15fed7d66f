#![forbid(unsafe_code)]

pub mod catalog_service;
pub mod error;
pub mod progress_tracker;

pub use course_core::Clock;

pub use catalog_service::CatalogService;
pub use error::{CatalogServiceError, ProgressServiceError};
pub use progress_tracker::{CourseProgressHandle, LessonCompletion, ProgressTracker};
