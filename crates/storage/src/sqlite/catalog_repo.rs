use course_core::model::{Course, CourseId, Lesson, LessonId, Module, ModuleId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    count_from_i64, course_id_from_i64, db_err, id_i64, lesson_id_from_i64, map_course_row,
    map_lesson_row, map_module_row, module_id_from_i64, ser,
};
use crate::repository::{
    CatalogRepository, NewCourseRecord, NewLessonRecord, NewModuleRecord, StorageError,
};

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO courses (title, description, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(course.title)
        .bind(course.description)
        .bind(course.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        course_id_from_i64(res.last_insert_rowid())
    }

    async fn insert_module(&self, module: NewModuleRecord) -> Result<ModuleId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO modules (course_id, title, position)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_i64("course_id", module.course_id.value())?)
        .bind(module.title)
        .bind(i64::from(module.position))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        module_id_from_i64(res.last_insert_rowid())
    }

    async fn insert_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO lessons (module_id, title, position)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_i64("module_id", lesson.module_id.value())?)
        .bind(lesson.title)
        .bind(i64::from(lesson.position))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        lesson_id_from_i64(res.last_insert_rowid())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, created_at
            FROM courses WHERE id = ?1
            ",
        )
        .bind(id_i64("course_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_modules(&self, course_id: CourseId) -> Result<Vec<Module>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, course_id, title, position
            FROM modules
            WHERE course_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_module_row).collect()
    }

    async fn list_lessons(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, module_id, title, position
            FROM lessons
            WHERE module_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_i64("module_id", module_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_lesson_row).collect()
    }

    async fn lesson_course(&self, lesson_id: LessonId) -> Result<Option<CourseId>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT m.course_id
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            WHERE l.id = ?1
            ",
        )
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => Ok(Some(course_id_from_i64(
                row.try_get::<i64, _>("course_id").map_err(ser)?,
            )?)),
            None => Ok(None),
        }
    }

    async fn count_lessons(&self, course_id: CourseId) -> Result<u32, StorageError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            WHERE m.course_id = ?1
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        count_from_i64(total)
    }
}
