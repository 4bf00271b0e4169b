//! In-process store for tests and demos.

use super::{
    Course, Language, Lesson, LessonWithTasks, NewProfile, Profile, ProfileUpdate, Progress,
    ProgressUpsert, Store, Task,
};
use crate::provider::memory::FIXED_TIMESTAMP;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    profiles: Vec<Profile>,
    languages: Vec<Language>,
    courses: Vec<Course>,
    lessons: Vec<Lesson>,
    tasks: Vec<Task>,
    progress: Vec<Progress>,
    next_id: i64,
    unavailable: bool,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn clear_on_empty(value: Option<&String>, current: &mut Option<String>) {
    if let Some(value) = value {
        *current = (!value.is_empty()).then(|| value.clone());
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_language(&self, name: &str, slug: &str) -> Language {
        let mut tables = self.tables();
        let language = Language {
            id: tables.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            created_at: Some(FIXED_TIMESTAMP.to_string()),
        };
        tables.languages.push(language.clone());
        language
    }

    pub fn add_course(&self, language_id: i64, title: &str, slug: &str, order_index: i32) -> Course {
        let mut tables = self.tables();
        let course = Course {
            id: tables.next_id(),
            language_id,
            title: title.to_string(),
            slug: slug.to_string(),
            description: None,
            difficulty_level: None,
            duration_hours: None,
            order_index,
            created_at: Some(FIXED_TIMESTAMP.to_string()),
        };
        tables.courses.push(course.clone());
        course
    }

    pub fn add_lesson(&self, course_id: i64, title: &str, slug: &str, order_index: i32) -> Lesson {
        let mut tables = self.tables();
        let lesson = Lesson {
            id: tables.next_id(),
            course_id,
            title: title.to_string(),
            slug: slug.to_string(),
            content: None,
            order_index,
            created_at: Some(FIXED_TIMESTAMP.to_string()),
        };
        tables.lessons.push(lesson.clone());
        lesson
    }

    pub fn add_task(
        &self,
        lesson_id: i64,
        title: &str,
        expected_output: Option<&str>,
        order_index: i32,
    ) -> Task {
        let mut tables = self.tables();
        let task = Task {
            id: tables.next_id(),
            lesson_id,
            title: title.to_string(),
            description: None,
            starter_code: None,
            expected_output: expected_output.map(ToString::to_string),
            difficulty: Some("easy".to_string()),
            order_index,
            created_at: Some(FIXED_TIMESTAMP.to_string()),
        };
        tables.tasks.push(task.clone());
        task
    }

    /// Fail every `Store` call, as if the database went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.tables().unavailable = unavailable;
    }

    fn available(&self) -> Result<MutexGuard<'_, Tables>> {
        let tables = self.tables();
        if tables.unavailable {
            bail!("database unavailable");
        }
        Ok(tables)
    }

    #[must_use]
    pub fn profile_count(&self, id: Uuid) -> usize {
        self.tables()
            .profiles
            .iter()
            .filter(|profile| profile.id == id)
            .count()
    }

    #[must_use]
    pub fn progress_rows(&self) -> Vec<Progress> {
        self.tables().progress.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.available().map(|_| ())
    }

    async fn ensure_profile(&self, profile: NewProfile) -> Result<bool> {
        let mut tables = self.available()?;
        if tables.profiles.iter().any(|existing| existing.id == profile.id) {
            return Ok(false);
        }

        let mut row = Profile::fallback(
            profile.id,
            profile.email,
            Some(FIXED_TIMESTAMP.to_string()),
            Some(FIXED_TIMESTAMP.to_string()),
        );
        row.full_name = profile.full_name;
        tables.profiles.push(row);
        Ok(true)
    }

    async fn profile(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self
            .available()?
            .profiles
            .iter()
            .find(|profile| profile.id == id)
            .cloned())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<Profile>> {
        let mut tables = self.available()?;
        let Some(profile) = tables.profiles.iter_mut().find(|profile| profile.id == id) else {
            return Ok(None);
        };

        clear_on_empty(update.full_name.as_ref(), &mut profile.full_name);
        if let Some(level) = update.experience_level {
            profile.experience_level = Some(level);
        }
        clear_on_empty(update.learning_goals.as_ref(), &mut profile.learning_goals);
        clear_on_empty(
            update.preferred_language.as_ref(),
            &mut profile.preferred_language,
        );
        clear_on_empty(update.bio.as_ref(), &mut profile.bio);
        profile.updated_at = Some(FIXED_TIMESTAMP.to_string());

        Ok(Some(profile.clone()))
    }

    async fn languages(&self) -> Result<Vec<Language>> {
        let mut languages = self.available()?.languages.clone();
        languages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(languages)
    }

    async fn language_by_slug(&self, slug: &str) -> Result<Option<Language>> {
        Ok(self
            .available()?
            .languages
            .iter()
            .find(|language| language.slug == slug)
            .cloned())
    }

    async fn courses_for_language(&self, language_id: i64) -> Result<Vec<Course>> {
        let mut courses: Vec<Course> = self
            .available()?
            .courses
            .iter()
            .filter(|course| course.language_id == language_id)
            .cloned()
            .collect();
        courses.sort_by_key(|course| (course.order_index, course.id));
        Ok(courses)
    }

    async fn lessons_for_course(&self, course_id: i64) -> Result<Vec<LessonWithTasks>> {
        let tables = self.available()?;
        let mut lessons: Vec<Lesson> = tables
            .lessons
            .iter()
            .filter(|lesson| lesson.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|lesson| (lesson.order_index, lesson.id));

        Ok(lessons
            .into_iter()
            .map(|lesson| {
                let mut tasks: Vec<Task> = tables
                    .tasks
                    .iter()
                    .filter(|task| task.lesson_id == lesson.id)
                    .cloned()
                    .collect();
                tasks.sort_by_key(|task| (task.order_index, task.id));
                LessonWithTasks { lesson, tasks }
            })
            .collect())
    }

    async fn task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.available()?.tasks.iter().find(|task| task.id == id).cloned())
    }

    async fn progress_for_user(&self, user_id: Uuid) -> Result<Vec<Progress>> {
        Ok(self
            .available()?
            .progress
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_progress(&self, progress: &ProgressUpsert) -> Result<Progress> {
        let mut tables = self.available()?;
        let completed_at = progress
            .completed
            .then(|| FIXED_TIMESTAMP.to_string());

        if let Some(row) = tables.progress.iter_mut().find(|row| {
            row.user_id == progress.user_id
                && row.lesson_id == progress.lesson_id
                && row.task_id == progress.task_id
        }) {
            row.code_solution.clone_from(&progress.code_solution);
            row.completed = progress.completed;
            row.score = progress.score;
            row.attempts += 1;
            row.completed_at = completed_at;
            row.updated_at = Some(FIXED_TIMESTAMP.to_string());
            return Ok(row.clone());
        }

        let row = Progress {
            id: tables.next_id(),
            user_id: progress.user_id,
            lesson_id: progress.lesson_id,
            task_id: progress.task_id,
            code_solution: progress.code_solution.clone(),
            completed: progress.completed,
            score: progress.score,
            attempts: 1,
            completed_at,
            created_at: Some(FIXED_TIMESTAMP.to_string()),
            updated_at: Some(FIXED_TIMESTAMP.to_string()),
        };
        tables.progress.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ExperienceLevel;

    fn upsert(user_id: Uuid, completed: bool, code: &str) -> ProgressUpsert {
        ProgressUpsert {
            user_id,
            lesson_id: 1,
            task_id: Some(2),
            code_solution: Some(code.to_string()),
            completed,
            score: Some(if completed { 100 } else { 0 }),
        }
    }

    #[tokio::test]
    async fn ensure_profile_is_idempotent() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let new = NewProfile {
            id,
            email: Some("a@x.com".to_string()),
            full_name: None,
        };

        assert!(store.ensure_profile(new.clone()).await.unwrap());
        assert!(!store.ensure_profile(new).await.unwrap());
        assert_eq!(store.profile_count(id), 1);
    }

    #[tokio::test]
    async fn update_profile_distinguishes_absent_and_empty() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .ensure_profile(NewProfile {
                id,
                email: None,
                full_name: Some("Ada".to_string()),
            })
            .await
            .unwrap();

        let update = ProfileUpdate {
            experience_level: Some(ExperienceLevel::Advanced),
            bio: Some(String::new()),
            learning_goals: Some("systems".to_string()),
            ..ProfileUpdate::default()
        };
        let profile = store.update_profile(id, &update).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ada"));
        assert_eq!(profile.experience_level, Some(ExperienceLevel::Advanced));
        assert_eq!(profile.learning_goals.as_deref(), Some("systems"));
        assert_eq!(profile.bio, None);

        let missing = store
            .update_profile(Uuid::new_v4(), &update)
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_triple() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        store.upsert_progress(&upsert(user, false, "print(1)")).await.unwrap();
        let row = store.upsert_progress(&upsert(user, true, "print(2)")).await.unwrap();

        assert_eq!(store.progress_rows().len(), 1);
        assert_eq!(row.attempts, 2);
        assert!(row.completed);
        assert!(row.completed_at.is_some());
        assert_eq!(row.code_solution.as_deref(), Some("print(2)"));

        let row = store.upsert_progress(&upsert(user, false, "oops")).await.unwrap();
        assert_eq!(row.completed_at, None);
        assert_eq!(row.attempts, 3);
    }

    #[tokio::test]
    async fn content_is_ordered() {
        let store = MemoryStore::new();
        let python = store.add_language("Python", "python");
        store.add_language("C", "c");
        let second = store.add_course(python.id, "Advanced", "advanced", 2);
        let first = store.add_course(python.id, "Basics", "basics", 1);
        let lesson = store.add_lesson(first.id, "Variables", "variables", 0);
        store.add_task(lesson.id, "Second", None, 1);
        store.add_task(lesson.id, "First", Some("42"), 0);

        let names: Vec<String> = store
            .languages()
            .await
            .unwrap()
            .into_iter()
            .map(|language| language.name)
            .collect();
        assert_eq!(names, ["C", "Python"]);

        let courses = store.courses_for_language(python.id).await.unwrap();
        assert_eq!(courses.iter().map(|c| c.id).collect::<Vec<_>>(), [first.id, second.id]);

        let lessons = store.lessons_for_course(first.id).await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].tasks[0].title, "First");
        assert!(store.lessons_for_course(second.id).await.unwrap().is_empty());
    }
}
