use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    CatalogError, CatalogItemKind, CompletionRatio, Course, CourseId, CourseProgress,
    CourseProgressId, CourseStatus, Lesson, LessonId, LessonProgress, Module, ModuleId, StudentId,
    Title, clean_description,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert shape for a course; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewCourseRecord {
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewCourseRecord {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            title: Title::new(CatalogItemKind::Course, title)?.into_inner(),
            description: clean_description(description),
            created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewModuleRecord {
    pub course_id: CourseId,
    pub title: String,
    pub position: u32,
}

impl NewModuleRecord {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        course_id: CourseId,
        title: impl Into<String>,
        position: u32,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            course_id,
            title: Title::new(CatalogItemKind::Module, title)?.into_inner(),
            position,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewLessonRecord {
    pub module_id: ModuleId,
    pub title: String,
    pub position: u32,
}

impl NewLessonRecord {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        module_id: ModuleId,
        title: impl Into<String>,
        position: u32,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            module_id,
            title: Title::new(CatalogItemKind::Lesson, title)?.into_inner(),
            position,
        })
    }
}

/// Insert shape for a progress row; always starts `IN_PROGRESS`.
#[derive(Debug, Clone, Copy)]
pub struct NewCourseProgressRecord {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub started_at: DateTime<Utc>,
}

/// One lesson-completion event to apply atomically.
#[derive(Debug, Clone, Copy)]
pub struct LessonCompletionRecord {
    pub progress_id: CourseProgressId,
    pub course_id: CourseId,
    pub lesson_id: LessonId,
    pub completed_at: DateTime<Utc>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for the course → module → lesson catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the owning course does not exist.
    async fn insert_module(&self, module: NewModuleRecord) -> Result<ModuleId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the owning module does not exist.
    async fn insert_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; a missing course is `Ok(None)`.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Modules of a course ordered by position, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_modules(&self, course_id: CourseId) -> Result<Vec<Module>, StorageError>;

    /// Lessons of a module ordered by position, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_lessons(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError>;

    /// Course that owns a lesson through its module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; an unknown lesson is `Ok(None)`.
    async fn lesson_course(&self, lesson_id: LessonId) -> Result<Option<CourseId>, StorageError>;

    /// Number of lessons across all modules of a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_lessons(&self, course_id: CourseId) -> Result<u32, StorageError>;
}

/// Repository contract for course and lesson progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures; no row is `Ok(None)`.
    async fn find_course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError>;

    /// Insert a progress row for a (student, course) pair that has none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a row for the pair already exists.
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn insert_course_progress(
        &self,
        record: NewCourseProgressRecord,
    ) -> Result<CourseProgressId, StorageError>;

    /// Atomically mark a lesson complete and promote the course to `COMPLETED`
    /// once every lesson is done. Nothing is persisted if any step fails.
    ///
    /// Returns the status held by the progress row after the update.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the progress row does not belong to the
    /// course, or the lesson is not part of the course.
    async fn record_lesson_completion(
        &self,
        completion: LessonCompletionRecord,
    ) -> Result<CourseStatus, StorageError>;

    /// Completed lesson ids for a progress row, ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn completed_lessons(
        &self,
        progress_id: CourseProgressId,
    ) -> Result<Vec<LessonId>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct InMemoryState {
    next_id: u64,
    courses: HashMap<CourseId, Course>,
    modules: HashMap<ModuleId, Module>,
    lessons: HashMap<LessonId, Lesson>,
    progress: HashMap<CourseProgressId, CourseProgress>,
    lesson_progress: HashMap<(CourseProgressId, LessonId), LessonProgress>,
}

impl InMemoryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn lesson_course(&self, lesson_id: LessonId) -> Option<CourseId> {
        let lesson = self.lessons.get(&lesson_id)?;
        self.modules.get(&lesson.module_id()).map(Module::course_id)
    }

    fn count_lessons(&self, course_id: CourseId) -> u32 {
        let count = self
            .lessons
            .values()
            .filter(|l| {
                self.modules
                    .get(&l.module_id())
                    .is_some_and(|m| m.course_id() == course_id)
            })
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn count_completed(&self, progress_id: CourseProgressId, course_id: CourseId) -> u32 {
        let count = self
            .lesson_progress
            .values()
            .filter(|lp| lp.progress_id() == progress_id && lp.is_completed())
            .filter(|lp| self.lesson_course(lp.lesson_id()) == Some(course_id))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// A single lock guards all tables, so every operation is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn invalid<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn insert_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError> {
        let mut guard = self.lock()?;
        let id = CourseId::new(guard.allocate_id());
        let course = Course::new(id, course.title, course.description, course.created_at)
            .map_err(invalid)?;
        guard.courses.insert(id, course);
        Ok(id)
    }

    async fn insert_module(&self, module: NewModuleRecord) -> Result<ModuleId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&module.course_id) {
            return Err(StorageError::NotFound);
        }
        let id = ModuleId::new(guard.allocate_id());
        let module =
            Module::new(id, module.course_id, module.title, module.position).map_err(invalid)?;
        guard.modules.insert(id, module);
        Ok(id)
    }

    async fn insert_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.modules.contains_key(&lesson.module_id) {
            return Err(StorageError::NotFound);
        }
        let id = LessonId::new(guard.allocate_id());
        let lesson =
            Lesson::new(id, lesson.module_id, lesson.title, lesson.position).map_err(invalid)?;
        guard.lessons.insert(id, lesson);
        Ok(id)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn list_modules(&self, course_id: CourseId) -> Result<Vec<Module>, StorageError> {
        let guard = self.lock()?;
        let mut modules: Vec<Module> = guard
            .modules
            .values()
            .filter(|m| m.course_id() == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| (m.position(), m.id()));
        Ok(modules)
    }

    async fn list_lessons(&self, module_id: ModuleId) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lock()?;
        let mut lessons: Vec<Lesson> = guard
            .lessons
            .values()
            .filter(|l| l.module_id() == module_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| (l.position(), l.id()));
        Ok(lessons)
    }

    async fn lesson_course(&self, lesson_id: LessonId) -> Result<Option<CourseId>, StorageError> {
        Ok(self.lock()?.lesson_course(lesson_id))
    }

    async fn count_lessons(&self, course_id: CourseId) -> Result<u32, StorageError> {
        Ok(self.lock()?.count_lessons(course_id))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn find_course_progress(
        &self,
        student_id: StudentId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .values()
            .find(|p| p.student_id() == student_id && p.course_id() == course_id)
            .cloned())
    }

    async fn insert_course_progress(
        &self,
        record: NewCourseProgressRecord,
    ) -> Result<CourseProgressId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(&record.course_id) {
            return Err(StorageError::NotFound);
        }
        let taken = guard
            .progress
            .values()
            .any(|p| p.student_id() == record.student_id && p.course_id() == record.course_id);
        if taken {
            return Err(StorageError::Conflict);
        }
        let id = CourseProgressId::new(guard.allocate_id());
        guard.progress.insert(
            id,
            CourseProgress::started(id, record.student_id, record.course_id, record.started_at),
        );
        Ok(id)
    }

    async fn record_lesson_completion(
        &self,
        completion: LessonCompletionRecord,
    ) -> Result<CourseStatus, StorageError> {
        let LessonCompletionRecord {
            progress_id,
            course_id,
            lesson_id,
            completed_at,
        } = completion;

        let mut guard = self.lock()?;
        let owned_by_course = guard
            .progress
            .get(&progress_id)
            .is_some_and(|p| p.course_id() == course_id);
        if !owned_by_course || guard.lesson_course(lesson_id) != Some(course_id) {
            return Err(StorageError::NotFound);
        }

        // Evaluate against a copy first so a rejected transition leaves no trace.
        let already_done = guard
            .lesson_progress
            .get(&(progress_id, lesson_id))
            .is_some_and(LessonProgress::is_completed);
        let ratio = CompletionRatio::new(
            guard.count_completed(progress_id, course_id) + u32::from(!already_done),
            guard.count_lessons(course_id),
        );
        let mut progress = guard
            .progress
            .get(&progress_id)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        let status = progress.apply_ratio(ratio, completed_at).map_err(invalid)?;

        guard
            .lesson_progress
            .entry((progress_id, lesson_id))
            .and_modify(|lp| lp.mark_completed(completed_at))
            .or_insert_with(|| LessonProgress::completed(progress_id, lesson_id, completed_at));
        guard.progress.insert(progress_id, progress);
        Ok(status)
    }

    async fn completed_lessons(
        &self,
        progress_id: CourseProgressId,
    ) -> Result<Vec<LessonId>, StorageError> {
        let guard = self.lock()?;
        let mut ids: Vec<LessonId> = guard
            .lesson_progress
            .values()
            .filter(|lp| lp.progress_id() == progress_id && lp.is_completed())
            .map(LessonProgress::lesson_id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Aggregates catalog and progress repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { catalog, progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::time::fixed_now;

    async fn seed(repo: &InMemoryRepository, lessons: u32) -> (CourseId, Vec<LessonId>) {
        let course_id = repo
            .insert_course(NewCourseRecord {
                title: "Course".into(),
                description: None,
                created_at: fixed_now(),
            })
            .await
            .unwrap();
        let module_id = repo
            .insert_module(NewModuleRecord {
                course_id,
                title: "Module".into(),
                position: 0,
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for position in 0..lessons {
            ids.push(
                repo.insert_lesson(NewLessonRecord {
                    module_id,
                    title: format!("Lesson {position}"),
                    position,
                })
                .await
                .unwrap(),
            );
        }
        (course_id, ids)
    }

    async fn start(repo: &InMemoryRepository, course_id: CourseId) -> CourseProgressId {
        repo.insert_course_progress(NewCourseProgressRecord {
            student_id: StudentId::new(1),
            course_id,
            started_at: fixed_now(),
        })
        .await
        .unwrap()
    }

    fn completion(
        progress_id: CourseProgressId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> LessonCompletionRecord {
        LessonCompletionRecord {
            progress_id,
            course_id,
            lesson_id,
            completed_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn second_progress_row_for_pair_conflicts() {
        let repo = InMemoryRepository::new();
        let (course_id, _) = seed(&repo, 1).await;
        start(&repo, course_id).await;

        let again = repo
            .insert_course_progress(NewCourseProgressRecord {
                student_id: StudentId::new(1),
                course_id,
                started_at: fixed_now(),
            })
            .await;
        assert!(matches!(again, Err(StorageError::Conflict)));
    }

    #[tokio::test]
    async fn completing_last_lesson_completes_course() {
        let repo = InMemoryRepository::new();
        let (course_id, lessons) = seed(&repo, 2).await;
        let progress_id = start(&repo, course_id).await;

        let status = repo
            .record_lesson_completion(completion(progress_id, course_id, lessons[0]))
            .await
            .unwrap();
        assert_eq!(status, CourseStatus::InProgress);

        let status = repo
            .record_lesson_completion(completion(progress_id, course_id, lessons[1]))
            .await
            .unwrap();
        assert_eq!(status, CourseStatus::Completed);
        assert_eq!(repo.completed_lessons(progress_id).await.unwrap(), lessons);
    }

    #[tokio::test]
    async fn lesson_from_other_course_is_rejected_without_side_effects() {
        let repo = InMemoryRepository::new();
        let (course_id, _) = seed(&repo, 1).await;
        let (_, foreign_lessons) = seed(&repo, 1).await;
        let progress_id = start(&repo, course_id).await;

        let result = repo
            .record_lesson_completion(completion(progress_id, course_id, foreign_lessons[0]))
            .await;
        assert!(matches!(result, Err(StorageError::NotFound)));
        assert!(repo.completed_lessons(progress_id).await.unwrap().is_empty());
    }
}
