use course_core::model::{
    CompletionRatio, CourseId, CourseProgress, CourseProgressId, CourseStatus, LessonId,
    StudentId,
};
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{
    count_from_i64, db_err, id_i64, lesson_id_from_i64, map_course_progress_row,
    progress_id_from_i64, ser,
};
use crate::repository::{
    LessonCompletionRecord, NewCourseProgressRecord, ProgressRepository, StorageError,
};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn find_course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, student_id, course_id, started_at, status, completed_at
            FROM course_progress
            WHERE student_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("student_id", student_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_course_progress_row).transpose()
    }

    async fn insert_course_progress(
        &self,
        record: NewCourseProgressRecord,
    ) -> Result<CourseProgressId, StorageError> {
        // UNIQUE(student_id, course_id) turns a racing duplicate into `Conflict`.
        let res = sqlx::query(
            r"
            INSERT INTO course_progress (student_id, course_id, started_at, status)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("student_id", record.student_id.value())?)
        .bind(id_i64("course_id", record.course_id.value())?)
        .bind(record.started_at)
        .bind(CourseStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        progress_id_from_i64(res.last_insert_rowid())
    }

    async fn record_lesson_completion(
        &self,
        completion: LessonCompletionRecord,
    ) -> Result<CourseStatus, StorageError> {
        let progress_id = id_i64("progress_id", completion.progress_id.value())?;
        let course_id = id_i64("course_id", completion.course_id.value())?;
        let lesson_id = id_i64("lesson_id", completion.lesson_id.value())?;
        let completed_at = completion.completed_at;

        // Dropping `tx` on any early return rolls the whole unit back.
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Take the write lock on the progress row first so concurrent completions
        // for the same student serialize their count-then-promote sequence.
        let locked = sqlx::query(
            r"
            UPDATE course_progress SET status = status
            WHERE id = ?1 AND course_id = ?2
            ",
        )
        .bind(progress_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if locked.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let row = sqlx::query(
            r"
            SELECT id, student_id, course_id, started_at, status, completed_at
            FROM course_progress
            WHERE id = ?1
            ",
        )
        .bind(progress_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        let mut progress = map_course_progress_row(&row)?;

        let lesson_in_course = sqlx::query(
            r"
            SELECT 1
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            WHERE l.id = ?1 AND m.course_id = ?2
            ",
        )
        .bind(lesson_id)
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        if lesson_in_course.is_none() {
            return Err(StorageError::NotFound);
        }

        let updated = sqlx::query(
            r"
            UPDATE lesson_progress SET completed = 1, completed_at = ?3
            WHERE progress_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(progress_id)
        .bind(lesson_id)
        .bind(completed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            sqlx::query(
                r"
                INSERT INTO lesson_progress (progress_id, lesson_id, completed, completed_at)
                VALUES (?1, ?2, 1, ?3)
                ",
            )
            .bind(progress_id)
            .bind(lesson_id)
            .bind(completed_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            WHERE m.course_id = ?1
            ",
        )
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let completed: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM lesson_progress lp
            JOIN lessons l ON l.id = lp.lesson_id
            JOIN modules m ON m.id = l.module_id
            WHERE lp.progress_id = ?1 AND lp.completed = 1 AND m.course_id = ?2
            ",
        )
        .bind(progress_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let ratio = CompletionRatio::new(count_from_i64(completed)?, count_from_i64(total)?);
        debug!(
            progress_id,
            completed = ratio.completed(),
            total = ratio.total(),
            "lesson completion counted"
        );

        let before = progress.status();
        let status = progress.apply_ratio(ratio, completed_at).map_err(ser)?;
        if status != before {
            sqlx::query(
                r"
                UPDATE course_progress SET status = ?2, completed_at = ?3
                WHERE id = ?1 AND status <> ?2
                ",
            )
            .bind(progress_id)
            .bind(status.as_str())
            .bind(progress.completed_at())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        Ok(status)
    }

    async fn completed_lessons(
        &self,
        progress_id: CourseProgressId,
    ) -> Result<Vec<LessonId>, StorageError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r"
            SELECT lesson_id
            FROM lesson_progress
            WHERE progress_id = ?1 AND completed = 1
            ORDER BY lesson_id ASC
            ",
        )
        .bind(id_i64("progress_id", progress_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        ids.into_iter().map(lesson_id_from_i64).collect()
    }
}
