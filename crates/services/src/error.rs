//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{CatalogError, CourseId, CourseProgressId, LessonId, ModuleId};
use storage::repository::StorageError;

/// Errors emitted by `ProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("lesson {0} not found")]
    LessonNotFound(LessonId),
    #[error("course progress {0} not found")]
    ProgressNotFound(CourseProgressId),
    /// A duplicate progress row was reported but could not be re-read.
    #[error("course progress was created concurrently and could not be resolved")]
    Conflict,
    #[error("progress store unavailable")]
    StoreUnavailable(#[source] StorageError),
}

impl From<StorageError> for ProgressServiceError {
    fn from(err: StorageError) -> Self {
        ProgressServiceError::StoreUnavailable(err)
    }
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogServiceError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("module {0} not found")]
    ModuleNotFound(ModuleId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
