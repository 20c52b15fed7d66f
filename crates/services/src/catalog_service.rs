use std::sync::Arc;

use course_core::model::{CatalogItem, Course, CourseId, LessonId, ModuleId};
use storage::repository::{
    CatalogRepository, NewCourseRecord, NewLessonRecord, NewModuleRecord, StorageError,
};

use crate::Clock;
use crate::error::CatalogServiceError;

/// Creates and reads the course → module → lesson catalog the tracker counts against.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(clock: Clock, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { clock, catalog }
    }

    /// Validate and persist a new course.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Catalog` for validation failures.
    /// Returns `CatalogServiceError::Storage` if persistence fails.
    pub async fn create_course(
        &self,
        title: String,
        description: Option<String>,
    ) -> Result<CourseId, CatalogServiceError> {
        let record = NewCourseRecord::new(title, description, self.clock.now())?;
        Ok(self.catalog.insert_course(record).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::CourseNotFound` if the course does not exist.
    /// Returns `CatalogServiceError::Catalog` for validation failures.
    pub async fn add_module(
        &self,
        course_id: CourseId,
        title: String,
        position: u32,
    ) -> Result<ModuleId, CatalogServiceError> {
        let record = NewModuleRecord::new(course_id, title, position)?;
        match self.catalog.insert_module(record).await {
            Ok(id) => Ok(id),
            Err(StorageError::NotFound) => Err(CatalogServiceError::CourseNotFound(course_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::ModuleNotFound` if the module does not exist.
    /// Returns `CatalogServiceError::Catalog` for validation failures.
    pub async fn add_lesson(
        &self,
        module_id: ModuleId,
        title: String,
        position: u32,
    ) -> Result<LessonId, CatalogServiceError> {
        let record = NewLessonRecord::new(module_id, title, position)?;
        match self.catalog.insert_lesson(record).await {
            Ok(id) => Ok(id),
            Err(StorageError::NotFound) => Err(CatalogServiceError::ModuleNotFound(module_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch a course by ID.
    ///
    /// Returns `Ok(None)` when the course does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn get_course(
        &self,
        course_id: CourseId,
    ) -> Result<Option<Course>, CatalogServiceError> {
        Ok(self.catalog.get_course(course_id).await?)
    }

    /// The course followed by each module and its lessons, in position order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::CourseNotFound` if the course does not exist.
    pub async fn course_outline(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<CatalogItem>, CatalogServiceError> {
        let course = self
            .catalog
            .get_course(course_id)
            .await?
            .ok_or(CatalogServiceError::CourseNotFound(course_id))?;

        let mut items = vec![CatalogItem::Course(course)];
        for module in self.catalog.list_modules(course_id).await? {
            let lessons = self.catalog.list_lessons(module.id()).await?;
            items.push(CatalogItem::Module(module));
            items.extend(lessons.into_iter().map(CatalogItem::Lesson));
        }
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn lesson_count(&self, course_id: CourseId) -> Result<u32, CatalogServiceError> {
        Ok(self.catalog.count_lessons(course_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::model::{CatalogError, CatalogItemKind};
    use course_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn service() -> CatalogService {
        CatalogService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryRepository::new()),
        )
    }

    #[tokio::test]
    async fn outline_lists_modules_then_their_lessons() {
        let service = service();
        let course_id = service
            .create_course("Rust".to_string(), None)
            .await
            .unwrap();
        let second = service
            .add_module(course_id, "Traits".to_string(), 1)
            .await
            .unwrap();
        let first = service
            .add_module(course_id, "Ownership".to_string(), 0)
            .await
            .unwrap();
        service
            .add_lesson(second, "Generics".to_string(), 0)
            .await
            .unwrap();
        service
            .add_lesson(first, "Borrowing".to_string(), 1)
            .await
            .unwrap();
        service
            .add_lesson(first, "Moves".to_string(), 0)
            .await
            .unwrap();

        let outline = service.course_outline(course_id).await.unwrap();
        let titles: Vec<(CatalogItemKind, &str)> =
            outline.iter().map(|i| (i.kind(), i.title())).collect();
        assert_eq!(
            titles,
            vec![
                (CatalogItemKind::Course, "Rust"),
                (CatalogItemKind::Module, "Ownership"),
                (CatalogItemKind::Lesson, "Moves"),
                (CatalogItemKind::Lesson, "Borrowing"),
                (CatalogItemKind::Module, "Traits"),
                (CatalogItemKind::Lesson, "Generics"),
            ]
        );
        assert_eq!(service.lesson_count(course_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn rejects_blank_titles_and_missing_parents() {
        let service = service();

        let err = service
            .create_course("  ".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogServiceError::Catalog(CatalogError::EmptyTitle(CatalogItemKind::Course))
        ));

        let err = service
            .add_module(CourseId::new(42), "Intro".to_string(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogServiceError::CourseNotFound(_)));

        let err = service
            .add_lesson(ModuleId::new(42), "Intro".to_string(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogServiceError::ModuleNotFound(_)));
    }
}
