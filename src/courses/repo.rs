use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::repo_types::{Course, CourseFilter, CourseRow, CourseSummary, CourseSummaryRow, Lecture, NewCourse};

/// Persistence for courses and their embedded lectures.
///
/// Lecture mutations recompute `num_of_videos` in the same write.
#[async_trait]
pub trait CourseRepo: Send + Sync {
    async fn list(&self, filter: &CourseFilter) -> anyhow::Result<Vec<CourseSummary>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Course>>;
    async fn insert(&self, course: NewCourse) -> anyhow::Result<Course>;
    async fn append_lecture(&self, course_id: Uuid, lecture: &Lecture) -> anyhow::Result<Option<Course>>;
    async fn remove_lecture(&self, course_id: Uuid, lecture_id: Uuid) -> anyhow::Result<Option<Course>>;
    /// Adds one view and returns the lectures, or `None` if the course is gone.
    async fn record_view(&self, course_id: Uuid) -> anyhow::Result<Option<Vec<Lecture>>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const COURSE_COLUMNS: &str = r#"
    id, title, description, category, created_by, poster_id, poster_url,
    lectures, views, num_of_videos, created_at
"#;

/// Escapes LIKE metacharacters so filters match literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[derive(Clone)]
pub struct PgCourseRepo {
    db: PgPool,
}

impl PgCourseRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CourseRepo for PgCourseRepo {
    async fn list(&self, filter: &CourseFilter) -> anyhow::Result<Vec<CourseSummary>> {
        let rows = sqlx::query_as::<_, CourseSummaryRow>(
            r#"
            SELECT id, title, description, category, created_by, poster_id, poster_url,
                   views, num_of_videos, created_at
              FROM courses
             WHERE title ILIKE $1 AND category ILIKE $2
             ORDER BY created_at DESC
            "#,
        )
        .bind(like_pattern(&filter.keyword))
        .bind(like_pattern(&filter.category))
        .fetch_all(&self.db)
        .await
        .context("list courses")?;
        Ok(rows.into_iter().map(CourseSummary::from).collect())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1");
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find course")?;
        Ok(row.map(Course::from))
    }

    async fn insert(&self, course: NewCourse) -> anyhow::Result<Course> {
        let sql = format!(
            r#"
            INSERT INTO courses (id, title, description, category, created_by, poster_id, poster_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COURSE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&course.title)
            .bind(&course.description)
            .bind(&course.category)
            .bind(&course.created_by)
            .bind(&course.poster.id)
            .bind(&course.poster.url)
            .fetch_one(&self.db)
            .await
            .context("insert course")?;
        Ok(row.into())
    }

    async fn append_lecture(&self, course_id: Uuid, lecture: &Lecture) -> anyhow::Result<Option<Course>> {
        let sql = format!(
            r#"
            UPDATE courses
               SET lectures = lectures || jsonb_build_array($2::jsonb),
                   num_of_videos = jsonb_array_length(lectures) + 1
             WHERE id = $1
            RETURNING {COURSE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(course_id)
            .bind(Json(lecture))
            .fetch_optional(&self.db)
            .await
            .context("append lecture")?;
        Ok(row.map(Course::from))
    }

    async fn remove_lecture(&self, course_id: Uuid, lecture_id: Uuid) -> anyhow::Result<Option<Course>> {
        let sql = format!(
            r#"
            WITH kept AS (
                SELECT COALESCE(jsonb_agg(l), '[]'::jsonb) AS remaining
                  FROM courses c, jsonb_array_elements(c.lectures) l
                 WHERE c.id = $1 AND l->>'id' <> $2::text
            )
            UPDATE courses
               SET lectures = kept.remaining,
                   num_of_videos = jsonb_array_length(kept.remaining)
              FROM kept
             WHERE id = $1
            RETURNING {COURSE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, CourseRow>(&sql)
            .bind(course_id)
            .bind(lecture_id.to_string())
            .fetch_optional(&self.db)
            .await
            .context("remove lecture")?;
        Ok(row.map(Course::from))
    }

    async fn record_view(&self, course_id: Uuid) -> anyhow::Result<Option<Vec<Lecture>>> {
        let row: Option<(Json<Vec<Lecture>>,)> = sqlx::query_as(
            "UPDATE courses SET views = views + 1 WHERE id = $1 RETURNING lectures",
        )
        .bind(course_id)
        .fetch_optional(&self.db)
        .await
        .context("record course view")?;
        Ok(row.map(|(lectures,)| lectures.0))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete course")?;
        Ok(res.rows_affected() > 0)
    }
}
