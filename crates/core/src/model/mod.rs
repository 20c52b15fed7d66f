mod catalog;
mod ids;
mod progress;

pub use ids::{CourseId, CourseProgressId, LessonId, ModuleId, ParseIdError, StudentId};

pub use catalog::{
    CatalogError, CatalogItem, CatalogItemKind, Course, Lesson, Module, Title, clean_description,
};
pub use progress::{
    CompletionRatio, CourseProgress, CourseStatus, DetailedProgress, LessonProgress,
    ProgressError, StatusParseError,
};
