use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{CourseId, CourseProgressId, LessonId, StudentId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("course status cannot move from {from} back to {to}")]
    Regression { from: CourseStatus, to: CourseStatus },

    #[error("a persisted course progress cannot be {0}")]
    NotPersistable(CourseStatus),

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("completed course progress is missing its completion date")]
    MissingCompletionDate,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid course status: {0}")]
pub struct StatusParseError(pub String);

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a student's progress through a course.
///
/// Ordering follows the lifecycle, so `NotStarted < InProgress < Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    /// No progress row exists yet.
    NotStarted,
    InProgress,
    Completed,
}

impl CourseStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::NotStarted => "NOT_STARTED",
            CourseStatus::InProgress => "IN_PROGRESS",
            CourseStatus::Completed => "COMPLETED",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, CourseStatus::Completed)
    }

    /// Move forward to `next`, staying put when `next` equals the current status.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Regression` if `next` is earlier in the lifecycle.
    pub fn advance_to(self, next: CourseStatus) -> Result<CourseStatus, ProgressError> {
        if next < self {
            return Err(ProgressError::Regression {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_STARTED" => Ok(CourseStatus::NotStarted),
            "IN_PROGRESS" => Ok(CourseStatus::InProgress),
            "COMPLETED" => Ok(CourseStatus::Completed),
            other => Err(StatusParseError(other.to_owned())),
        }
    }
}

//
// ─── COMPLETION RATIO ──────────────────────────────────────────────────────────
//

/// Completed lessons over total lessons for one progress row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRatio {
    completed: u32,
    total: u32,
}

impl CompletionRatio {
    #[must_use]
    pub fn new(completed: u32, total: u32) -> Self {
        Self { completed, total }
    }

    #[must_use]
    pub fn completed(&self) -> u32 {
        self.completed
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// True once every lesson is done. A course without lessons is never complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }

    /// Status a progress row should hold after this ratio was observed.
    #[must_use]
    pub fn status_after(&self, current: CourseStatus) -> CourseStatus {
        if self.is_complete() {
            CourseStatus::Completed
        } else {
            current
        }
    }
}

//
// ─── COURSE PROGRESS ───────────────────────────────────────────────────────────
//

/// One student's progress through one course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    id: CourseProgressId,
    student_id: StudentId,
    course_id: CourseId,
    started_at: DateTime<Utc>,
    status: CourseStatus,
    completed_at: Option<DateTime<Utc>>,
}

impl CourseProgress {
    /// A freshly started progress row.
    #[must_use]
    pub fn started(
        id: CourseProgressId,
        student_id: StudentId,
        course_id: CourseId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_id,
            course_id,
            started_at,
            status: CourseStatus::InProgress,
            completed_at: None,
        }
    }

    /// Rehydrate a progress row from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotPersistable` for `NotStarted`, which only exists implicitly.
    /// Returns `ProgressError::MissingCompletionDate` if a completed row has no completion date.
    /// Returns `ProgressError::InvalidTimeRange` if completion precedes the start.
    pub fn from_persisted(
        id: CourseProgressId,
        student_id: StudentId,
        course_id: CourseId,
        started_at: DateTime<Utc>,
        status: CourseStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProgressError> {
        if status == CourseStatus::NotStarted {
            return Err(ProgressError::NotPersistable(status));
        }
        if status == CourseStatus::Completed && completed_at.is_none() {
            return Err(ProgressError::MissingCompletionDate);
        }
        if completed_at.is_some_and(|at| at < started_at) {
            return Err(ProgressError::InvalidTimeRange);
        }

        Ok(Self {
            id,
            student_id,
            course_id,
            started_at,
            status,
            completed_at,
        })
    }

    /// Apply an observed completion ratio. Completion is stamped once and never undone.
    ///
    /// The stamp is clamped to `started_at`, so a lagging clock cannot produce a
    /// row that `from_persisted` would reject.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Regression` if the ratio would move the status backwards.
    pub fn apply_ratio(
        &mut self,
        ratio: CompletionRatio,
        at: DateTime<Utc>,
    ) -> Result<CourseStatus, ProgressError> {
        let next = self.status.advance_to(ratio.status_after(self.status))?;
        if next != self.status {
            self.status = next;
            if next.is_terminal() {
                self.completed_at = Some(at.max(self.started_at));
            }
        }
        Ok(self.status)
    }

    #[must_use]
    pub fn id(&self) -> CourseProgressId {
        self.id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn status(&self) -> CourseStatus {
        self.status
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

//
// ─── LESSON PROGRESS ───────────────────────────────────────────────────────────
//

/// Completion marker for a lesson, owned by a `CourseProgress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonProgress {
    progress_id: CourseProgressId,
    lesson_id: LessonId,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    #[must_use]
    pub fn completed(
        progress_id: CourseProgressId,
        lesson_id: LessonId,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            progress_id,
            lesson_id,
            completed: true,
            completed_at: Some(completed_at),
        }
    }

    /// Mark complete again; only the timestamp moves.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(at);
    }

    #[must_use]
    pub fn progress_id(&self) -> CourseProgressId {
        self.progress_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

//
// ─── DETAILED VIEW ─────────────────────────────────────────────────────────────
//

/// Read model returned to callers asking how far a student got in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedProgress {
    pub status: CourseStatus,
    pub completed_lesson_ids: Vec<LessonId>,
}

impl DetailedProgress {
    #[must_use]
    pub fn not_started() -> Self {
        Self {
            status: CourseStatus::NotStarted,
            completed_lesson_ids: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn started() -> CourseProgress {
        CourseProgress::started(
            CourseProgressId::new(1),
            StudentId::new(2),
            CourseId::new(3),
            fixed_now(),
        )
    }

    #[test]
    fn status_round_trips_through_wire_form() {
        for status in [
            CourseStatus::NotStarted,
            CourseStatus::InProgress,
            CourseStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<CourseStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<CourseStatus>().is_err());
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&CourseStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn advance_refuses_to_go_backwards() {
        assert_eq!(
            CourseStatus::InProgress.advance_to(CourseStatus::Completed),
            Ok(CourseStatus::Completed)
        );
        assert_eq!(
            CourseStatus::Completed.advance_to(CourseStatus::Completed),
            Ok(CourseStatus::Completed)
        );
        assert_eq!(
            CourseStatus::Completed.advance_to(CourseStatus::InProgress),
            Err(ProgressError::Regression {
                from: CourseStatus::Completed,
                to: CourseStatus::InProgress,
            })
        );
    }

    #[test]
    fn empty_course_is_never_complete() {
        let ratio = CompletionRatio::new(0, 0);
        assert!(!ratio.is_complete());
        assert_eq!(
            ratio.status_after(CourseStatus::InProgress),
            CourseStatus::InProgress
        );
    }

    #[test]
    fn ratio_completes_exactly_at_total() {
        assert!(!CompletionRatio::new(2, 3).is_complete());
        assert!(CompletionRatio::new(3, 3).is_complete());
        assert!(CompletionRatio::new(4, 3).is_complete());
    }

    #[test]
    fn apply_ratio_stamps_completion_once() {
        let mut progress = started();
        let first = fixed_now() + Duration::hours(1);
        assert_eq!(
            progress.apply_ratio(CompletionRatio::new(1, 2), first),
            Ok(CourseStatus::InProgress)
        );
        assert_eq!(progress.completed_at(), None);

        assert_eq!(
            progress.apply_ratio(CompletionRatio::new(2, 2), first),
            Ok(CourseStatus::Completed)
        );
        assert_eq!(progress.completed_at(), Some(first));

        // A later observation with more lessons must not reopen or restamp it.
        let later = first + Duration::hours(1);
        assert_eq!(
            progress.apply_ratio(CompletionRatio::new(2, 5), later),
            Ok(CourseStatus::Completed)
        );
        assert_eq!(progress.completed_at(), Some(first));
    }

    #[test]
    fn completion_stamp_never_precedes_start() {
        let mut progress = started();
        let lagging = fixed_now() - Duration::seconds(2);
        assert_eq!(
            progress.apply_ratio(CompletionRatio::new(1, 1), lagging),
            Ok(CourseStatus::Completed)
        );
        assert_eq!(progress.completed_at(), Some(fixed_now()));

        let reloaded = CourseProgress::from_persisted(
            progress.id(),
            progress.student_id(),
            progress.course_id(),
            fixed_now(),
            progress.status(),
            progress.completed_at(),
        );
        assert_eq!(reloaded, Ok(progress));
    }

    #[test]
    fn from_persisted_rejects_inconsistent_rows() {
        let now = fixed_now();
        let load = |status, completed_at| {
            CourseProgress::from_persisted(
                CourseProgressId::new(1),
                StudentId::new(1),
                CourseId::new(1),
                now,
                status,
                completed_at,
            )
        };

        assert_eq!(
            load(CourseStatus::NotStarted, None),
            Err(ProgressError::NotPersistable(CourseStatus::NotStarted))
        );
        assert_eq!(
            load(CourseStatus::Completed, None),
            Err(ProgressError::MissingCompletionDate)
        );
        assert_eq!(
            load(CourseStatus::Completed, Some(now - Duration::seconds(1))),
            Err(ProgressError::InvalidTimeRange)
        );
    }

    #[test]
    fn lesson_progress_refresh_keeps_completed() {
        let mut lesson =
            LessonProgress::completed(CourseProgressId::new(1), LessonId::new(4), fixed_now());
        let later = fixed_now() + Duration::minutes(5);
        lesson.mark_completed(later);
        assert!(lesson.is_completed());
        assert_eq!(
            lesson,
            LessonProgress::completed(CourseProgressId::new(1), LessonId::new(4), later)
        );
    }

    #[test]
    fn detailed_progress_serializes_camel_case() {
        let view = DetailedProgress {
            status: CourseStatus::InProgress,
            completed_lesson_ids: vec![LessonId::new(1), LessonId::new(2)],
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "IN_PROGRESS", "completedLessonIds": [1, 2] })
        );
    }
}
