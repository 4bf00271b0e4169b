use super::{
    Course, ExperienceLevel, Language, Lesson, LessonWithTasks, NewProfile, Profile, ProfileUpdate,
    Progress, ProgressUpsert, Store, Task,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    FromRow, PgPool, Row,
};
use std::{collections::HashMap, time::Duration};
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl<'r> FromRow<'r, PgRow> for Profile {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let experience_level: Option<String> = row.try_get("experience_level")?;

        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            experience_level: experience_level.as_deref().and_then(ExperienceLevel::parse),
            learning_goals: row.try_get("learning_goals")?,
            preferred_language: row.try_get("preferred_language")?,
            bio: row.try_get("bio")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Language {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Course {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            language_id: row.try_get("language_id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            description: row.try_get("description")?,
            difficulty_level: row.try_get("difficulty_level")?,
            duration_hours: row.try_get("duration_hours")?,
            order_index: row.try_get("order_index")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Lesson {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            course_id: row.try_get("course_id")?,
            title: row.try_get("title")?,
            slug: row.try_get("slug")?,
            content: row.try_get("content")?,
            order_index: row.try_get("order_index")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Task {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            lesson_id: row.try_get("lesson_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            starter_code: row.try_get("starter_code")?,
            expected_output: row.try_get("expected_output")?,
            difficulty: row.try_get("difficulty")?,
            order_index: row.try_get("order_index")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Progress {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            lesson_id: row.try_get("lesson_id")?,
            task_id: row.try_get("task_id")?,
            code_solution: row.try_get("code_solution")?,
            completed: row.try_get("completed")?,
            score: row.try_get("score")?,
            attempts: row.try_get("attempts")?,
            completed_at: row.try_get("completed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Failed to ping database")?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn ensure_profile(&self, profile: NewProfile) -> Result<bool> {
        let query = r"
            INSERT INTO user_profiles (id, email, full_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
        ";

        let result = sqlx::query(query)
            .bind(profile.id)
            .bind(profile.email)
            .bind(profile.full_name)
            .execute(&self.pool)
            .await
            .context("Failed to insert profile")?;

        let created = result.rows_affected() == 1;
        debug!("profile ensured, created: {created}");

        Ok(created)
    }

    async fn profile(&self, id: Uuid) -> Result<Option<Profile>> {
        let query = r#"
            SELECT
                id,
                email,
                full_name,
                experience_level,
                learning_goals,
                preferred_language,
                bio,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
                to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
            FROM user_profiles
            WHERE id = $1
            LIMIT 1
        "#;

        sqlx::query_as::<_, Profile>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch profile")
    }

    #[instrument(skip(self, update))]
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<Profile>> {
        // NULL parameter keeps the column, '' clears it.
        let query = r#"
            UPDATE user_profiles SET
                full_name = CASE WHEN $2::text IS NULL THEN full_name ELSE NULLIF($2::text, '') END,
                experience_level = COALESCE($3::text, experience_level),
                learning_goals = CASE WHEN $4::text IS NULL THEN learning_goals ELSE NULLIF($4::text, '') END,
                preferred_language = CASE WHEN $5::text IS NULL THEN preferred_language ELSE NULLIF($5::text, '') END,
                bio = CASE WHEN $6::text IS NULL THEN bio ELSE NULLIF($6::text, '') END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id,
                email,
                full_name,
                experience_level,
                learning_goals,
                preferred_language,
                bio,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
                to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
        "#;

        sqlx::query_as::<_, Profile>(query)
            .bind(id)
            .bind(update.full_name.as_deref())
            .bind(update.experience_level.map(ExperienceLevel::as_str))
            .bind(update.learning_goals.as_deref())
            .bind(update.preferred_language.as_deref())
            .bind(update.bio.as_deref())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update profile")
    }

    async fn languages(&self) -> Result<Vec<Language>> {
        let query = r#"
            SELECT
                id,
                name,
                slug,
                description,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM languages
            ORDER BY name
        "#;

        sqlx::query_as::<_, Language>(query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch languages")
    }

    async fn language_by_slug(&self, slug: &str) -> Result<Option<Language>> {
        let query = r#"
            SELECT
                id,
                name,
                slug,
                description,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM languages
            WHERE slug = $1
            LIMIT 1
        "#;

        sqlx::query_as::<_, Language>(query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch language")
    }

    async fn courses_for_language(&self, language_id: i64) -> Result<Vec<Course>> {
        let query = r#"
            SELECT
                id,
                language_id,
                title,
                slug,
                description,
                difficulty_level,
                duration_hours,
                order_index,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM courses
            WHERE language_id = $1
            ORDER BY order_index, id
        "#;

        sqlx::query_as::<_, Course>(query)
            .bind(language_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch courses")
    }

    async fn lessons_for_course(&self, course_id: i64) -> Result<Vec<LessonWithTasks>> {
        let query = r#"
            SELECT
                id,
                course_id,
                title,
                slug,
                content,
                order_index,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM lessons
            WHERE course_id = $1
            ORDER BY order_index, id
        "#;

        let lessons = sqlx::query_as::<_, Lesson>(query)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch lessons")?;

        let lesson_ids: Vec<i64> = lessons.iter().map(|lesson| lesson.id).collect();

        let query = r#"
            SELECT
                id,
                lesson_id,
                title,
                description,
                starter_code,
                expected_output,
                difficulty,
                order_index,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM tasks
            WHERE lesson_id = ANY($1)
            ORDER BY order_index, id
        "#;

        let tasks = sqlx::query_as::<_, Task>(query)
            .bind(&lesson_ids)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch tasks")?;

        let mut by_lesson: HashMap<i64, Vec<Task>> = HashMap::new();
        for task in tasks {
            by_lesson.entry(task.lesson_id).or_default().push(task);
        }

        Ok(lessons
            .into_iter()
            .map(|lesson| LessonWithTasks {
                tasks: by_lesson.remove(&lesson.id).unwrap_or_default(),
                lesson,
            })
            .collect())
    }

    async fn task(&self, id: i64) -> Result<Option<Task>> {
        let query = r#"
            SELECT
                id,
                lesson_id,
                title,
                description,
                starter_code,
                expected_output,
                difficulty,
                order_index,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM tasks
            WHERE id = $1
            LIMIT 1
        "#;

        sqlx::query_as::<_, Task>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch task")
    }

    async fn progress_for_user(&self, user_id: Uuid) -> Result<Vec<Progress>> {
        let query = r#"
            SELECT
                id,
                user_id,
                lesson_id,
                task_id,
                code_solution,
                completed,
                score,
                attempts,
                CASE
                    WHEN completed_at IS NULL THEN NULL
                    ELSE to_char(completed_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
                END AS completed_at,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
                to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
            FROM user_progress
            WHERE user_id = $1
            ORDER BY lesson_id, task_id NULLS FIRST
        "#;

        sqlx::query_as::<_, Progress>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch progress")
    }

    #[instrument(skip(self, progress), fields(lesson_id = progress.lesson_id, task_id = ?progress.task_id))]
    async fn upsert_progress(&self, progress: &ProgressUpsert) -> Result<Progress> {
        // A single statement, so concurrent writers for one triple serialize on the constraint.
        let query = r#"
            INSERT INTO user_progress
                (user_id, lesson_id, task_id, code_solution, completed, score, attempts, completed_at, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, 1, CASE WHEN $5 THEN NOW() ELSE NULL END, NOW())
            ON CONFLICT ON CONSTRAINT user_progress_triple DO UPDATE SET
                code_solution = EXCLUDED.code_solution,
                completed = EXCLUDED.completed,
                score = EXCLUDED.score,
                attempts = user_progress.attempts + 1,
                completed_at = EXCLUDED.completed_at,
                updated_at = NOW()
            RETURNING
                id,
                user_id,
                lesson_id,
                task_id,
                code_solution,
                completed,
                score,
                attempts,
                CASE
                    WHEN completed_at IS NULL THEN NULL
                    ELSE to_char(completed_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"')
                END AS completed_at,
                to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
                to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
        "#;

        sqlx::query_as::<_, Progress>(query)
            .bind(progress.user_id)
            .bind(progress.lesson_id)
            .bind(progress.task_id)
            .bind(progress.code_solution.as_deref())
            .bind(progress.completed)
            .bind(progress.score)
            .fetch_one(&self.pool)
            .await
            .context("Failed to save progress")
    }
}
