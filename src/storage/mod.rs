//! Profiles, course content and learner progress.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_PREFERRED_LANGUAGE: &str = "python";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub learning_goals: Option<String>,
    pub preferred_language: Option<String>,
    pub bio: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Profile {
    /// Profile shown while no row exists for the user.
    #[must_use]
    pub fn fallback(
        id: Uuid,
        email: Option<String>,
        created_at: Option<String>,
        updated_at: Option<String>,
    ) -> Self {
        Self {
            id,
            email,
            full_name: None,
            experience_level: None,
            learning_goals: None,
            preferred_language: Some(DEFAULT_PREFERRED_LANGUAGE.to_string()),
            bio: None,
            created_at,
            updated_at,
        }
    }
}

/// Row inserted by [`Store::ensure_profile`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

/// Partial profile update. `None` leaves a column alone; an empty string clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub learning_goals: Option<String>,
    pub preferred_language: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.experience_level.is_none()
            && self.learning_goals.is_none()
            && self.preferred_language.is_none()
            && self.bio.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Language {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Course {
    pub id: i64,
    pub language_id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub difficulty_level: Option<String>,
    pub duration_hours: Option<i32>,
    pub order_index: i32,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub slug: String,
    pub content: Option<String>,
    pub order_index: i32,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Task {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub starter_code: Option<String>,
    pub expected_output: Option<String>,
    pub difficulty: Option<String>,
    pub order_index: i32,
    pub created_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct LessonWithTasks {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub tasks: Vec<Task>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Progress {
    pub id: i64,
    pub user_id: Uuid,
    pub lesson_id: i64,
    pub task_id: Option<i64>,
    pub code_solution: Option<String>,
    pub completed: bool,
    pub score: Option<i32>,
    pub attempts: i32,
    pub completed_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Values written for one `(user, lesson, task)` triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressUpsert {
    pub user_id: Uuid,
    pub lesson_id: i64,
    pub task_id: Option<i64>,
    pub code_solution: Option<String>,
    pub completed: bool,
    pub score: Option<i32>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Insert the profile unless one exists. Returns whether a row was created.
    async fn ensure_profile(&self, profile: NewProfile) -> Result<bool>;

    async fn profile(&self, id: Uuid) -> Result<Option<Profile>>;

    /// Apply a partial update. `None` when the profile does not exist.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<Profile>>;

    /// All languages ordered by name.
    async fn languages(&self) -> Result<Vec<Language>>;

    async fn language_by_slug(&self, slug: &str) -> Result<Option<Language>>;

    async fn courses_for_language(&self, language_id: i64) -> Result<Vec<Course>>;

    /// Lessons of a course with their tasks, both in `order_index` order.
    async fn lessons_for_course(&self, course_id: i64) -> Result<Vec<LessonWithTasks>>;

    async fn task(&self, id: i64) -> Result<Option<Task>>;

    async fn progress_for_user(&self, user_id: Uuid) -> Result<Vec<Progress>>;

    /// Insert or update the single row for the triple; attempts count every write.
    async fn upsert_progress(&self, progress: &ProgressUpsert) -> Result<Progress>;
}
