use std::sync::Arc;

use course_core::model::{
    CourseId, CourseProgress, CourseProgressId, CourseStatus, DetailedProgress, LessonId,
    StudentId,
};
use serde::Serialize;
use storage::repository::{
    CatalogRepository, LessonCompletionRecord, NewCourseProgressRecord, ProgressRepository,
    Storage, StorageError,
};
use tracing::{debug, info};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Result of resolving a student's progress row for a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressHandle {
    pub progress_id: CourseProgressId,
    pub status: CourseStatus,
    pub was_created: bool,
}

impl CourseProgressHandle {
    fn existing(progress: &CourseProgress) -> Self {
        Self {
            progress_id: progress.id(),
            status: progress.status(),
            was_created: false,
        }
    }
}

/// Outcome of marking a lesson complete on behalf of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletion {
    pub course_id: CourseId,
    pub progress_id: CourseProgressId,
    pub status: CourseStatus,
}

/// Tracks per-student lesson completion and derives course completion.
///
/// Holds no progress state of its own; every call reads and writes the store.
#[derive(Clone)]
pub struct ProgressTracker {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            progress,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.progress),
        )
    }

    /// Return the student's progress row for a course, creating it on first access.
    ///
    /// A concurrent request that inserts the row first is not an error: the
    /// losing insert re-reads and returns the winner's row.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::CourseNotFound` if the course does not exist.
    /// Returns `ProgressServiceError::Conflict` if a duplicate was reported but cannot be
    /// read back.
    /// Returns `ProgressServiceError::StoreUnavailable` if the store fails.
    pub async fn find_or_create_course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<CourseProgressHandle, ProgressServiceError> {
        if let Some(existing) = self
            .progress
            .find_course_progress(student_id, course_id)
            .await?
        {
            return Ok(CourseProgressHandle::existing(&existing));
        }

        if self.catalog.get_course(course_id).await?.is_none() {
            return Err(ProgressServiceError::CourseNotFound(course_id));
        }

        let record = NewCourseProgressRecord {
            student_id,
            course_id,
            started_at: self.clock.now(),
        };
        match self.progress.insert_course_progress(record).await {
            Ok(progress_id) => {
                info!(%student_id, %course_id, %progress_id, "course progress started");
                Ok(CourseProgressHandle {
                    progress_id,
                    status: CourseStatus::InProgress,
                    was_created: true,
                })
            }
            Err(StorageError::Conflict) => {
                debug!(%student_id, %course_id, "course progress created concurrently, re-reading");
                self.progress
                    .find_course_progress(student_id, course_id)
                    .await?
                    .map(|existing| CourseProgressHandle::existing(&existing))
                    .ok_or(ProgressServiceError::Conflict)
            }
            Err(StorageError::NotFound) => Err(ProgressServiceError::CourseNotFound(course_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Mark a lesson complete for a progress row and return the course status that results.
    ///
    /// The lesson upsert, both counts and the status promotion commit together or not at all.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::LessonNotFound` if the lesson is not part of the course.
    /// Returns `ProgressServiceError::ProgressNotFound` if the progress row does not belong
    /// to the course.
    /// Returns `ProgressServiceError::StoreUnavailable` if the store fails.
    pub async fn record_lesson_completion(
        &self,
        progress_id: CourseProgressId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<CourseStatus, ProgressServiceError> {
        match self.catalog.lesson_course(lesson_id).await? {
            Some(owner) if owner == course_id => {}
            _ => return Err(ProgressServiceError::LessonNotFound(lesson_id)),
        }

        let completion = LessonCompletionRecord {
            progress_id,
            course_id,
            lesson_id,
            completed_at: self.clock.now(),
        };
        let status = match self.progress.record_lesson_completion(completion).await {
            Ok(status) => status,
            Err(StorageError::NotFound) => {
                return Err(ProgressServiceError::ProgressNotFound(progress_id));
            }
            Err(err) => return Err(err.into()),
        };

        debug!(%progress_id, %lesson_id, %status, "lesson completion recorded");
        if status.is_terminal() {
            info!(%progress_id, %course_id, "course completed");
        }
        Ok(status)
    }

    /// Mark a lesson complete for a student, starting course progress if needed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::LessonNotFound` if the lesson does not exist.
    /// Otherwise propagates the errors of `find_or_create_course_progress` and
    /// `record_lesson_completion`.
    pub async fn complete_lesson(
        &self,
        student_id: StudentId,
        lesson_id: LessonId,
    ) -> Result<LessonCompletion, ProgressServiceError> {
        let course_id = self
            .catalog
            .lesson_course(lesson_id)
            .await?
            .ok_or(ProgressServiceError::LessonNotFound(lesson_id))?;

        let handle = self
            .find_or_create_course_progress(student_id, course_id)
            .await?;
        let status = self
            .record_lesson_completion(handle.progress_id, course_id, lesson_id)
            .await?;

        Ok(LessonCompletion {
            course_id,
            progress_id: handle.progress_id,
            status,
        })
    }

    /// Status and completed lessons for a student in a course.
    ///
    /// A student without a progress row has simply not started.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::StoreUnavailable` if the store fails.
    pub async fn get_detailed_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<DetailedProgress, ProgressServiceError> {
        let Some(progress) = self
            .progress
            .find_course_progress(student_id, course_id)
            .await?
        else {
            return Ok(DetailedProgress::not_started());
        };

        let completed_lesson_ids = self.progress.completed_lessons(progress.id()).await?;
        Ok(DetailedProgress {
            status: progress.status(),
            completed_lesson_ids,
        })
    }
}
