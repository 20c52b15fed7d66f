use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{CourseId, LessonId, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("{0} title cannot be empty")]
    EmptyTitle(CatalogItemKind),
}

/// Validated catalog title (trimmed, non-empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Title(String);

impl Title {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is empty after trimming.
    pub fn new(kind: CatalogItemKind, value: impl Into<String>) -> Result<Self, CatalogError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::EmptyTitle(kind));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Blank descriptions are stored as absent.
#[must_use]
pub fn clean_description(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}

/// A course owns modules, which own lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    id: CourseId,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl Course {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            title: Title::new(CatalogItemKind::Course, title)?.into_inner(),
            description: clean_description(description),
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    id: ModuleId,
    course_id: CourseId,
    title: String,
    position: u32,
}

impl Module {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        id: ModuleId,
        course_id: CourseId,
        title: impl Into<String>,
        position: u32,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            course_id,
            title: Title::new(CatalogItemKind::Module, title)?.into_inner(),
            position,
        })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    id: LessonId,
    module_id: ModuleId,
    title: String,
    position: u32,
}

impl Lesson {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(
        id: LessonId,
        module_id: ModuleId,
        title: impl Into<String>,
        position: u32,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            module_id,
            title: Title::new(CatalogItemKind::Lesson, title)?.into_inner(),
            position,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogItemKind {
    Course,
    Module,
    Lesson,
}

impl std::fmt::Display for CatalogItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CatalogItemKind::Course => "course",
            CatalogItemKind::Module => "module",
            CatalogItemKind::Lesson => "lesson",
        })
    }
}

/// Heterogeneous catalog entry, one variant per entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogItem {
    Course(Course),
    Module(Module),
    Lesson(Lesson),
}

impl CatalogItem {
    #[must_use]
    pub fn kind(&self) -> CatalogItemKind {
        match self {
            CatalogItem::Course(_) => CatalogItemKind::Course,
            CatalogItem::Module(_) => CatalogItemKind::Module,
            CatalogItem::Lesson(_) => CatalogItemKind::Lesson,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            CatalogItem::Course(c) => c.title(),
            CatalogItem::Module(m) => m.title(),
            CatalogItem::Lesson(l) => l.title(),
        }
    }
}
