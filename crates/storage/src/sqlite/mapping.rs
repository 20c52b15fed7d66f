use course_core::model::{
    Course, CourseId, CourseProgress, CourseProgressId, CourseStatus, Lesson, LessonId, Module,
    ModuleId, StudentId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Translate driver errors, surfacing constraint violations as domain outcomes.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn count_from_i64(v: i64) -> Result<u32, StorageError> {
    i64_to_u32("count", v)
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn module_id_from_i64(v: i64) -> Result<ModuleId, StorageError> {
    Ok(ModuleId::new(i64_to_u64("module_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn progress_id_from_i64(v: i64) -> Result<CourseProgressId, StorageError> {
    Ok(CourseProgressId::new(i64_to_u64("progress_id", v)?))
}

pub(crate) fn parse_status(s: &str) -> Result<CourseStatus, StorageError> {
    s.parse::<CourseStatus>().map_err(ser)
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Course::new(
        course_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_module_row(row: &SqliteRow) -> Result<Module, StorageError> {
    Module::new(
        module_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        i64_to_u32("position", row.try_get::<i64, _>("position").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    Lesson::new(
        lesson_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        module_id_from_i64(row.try_get::<i64, _>("module_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        i64_to_u32("position", row.try_get::<i64, _>("position").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_course_progress_row(row: &SqliteRow) -> Result<CourseProgress, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;

    CourseProgress::from_persisted(
        progress_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        StudentId::new(i64_to_u64(
            "student_id",
            row.try_get::<i64, _>("student_id").map_err(ser)?,
        )?),
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        row.try_get("started_at").map_err(ser)?,
        parse_status(&status_str)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}
