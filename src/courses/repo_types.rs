use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::media::Asset;

/// Lectures have no lifecycle outside their course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video: Asset,
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub created_by: String,
    pub poster: Asset,
    pub lectures: Vec<Lecture>,
    pub views: i64,
    /// Always equal to `lectures.len()`.
    pub num_of_videos: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Course {
    pub fn lecture(&self, lecture_id: Uuid) -> Option<&Lecture> {
        self.lectures.iter().find(|l| l.id == lecture_id)
    }
}

/// Listing projection: a course without its lecture bodies.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub created_by: String,
    pub poster: Asset,
    pub views: i64,
    pub num_of_videos: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Course> for CourseSummary {
    fn from(c: &Course) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
            description: c.description.clone(),
            category: c.category.clone(),
            created_by: c.created_by.clone(),
            poster: c.poster.clone(),
            views: c.views,
            num_of_videos: c.num_of_videos,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    pub category: String,
    pub created_by: String,
    pub poster: Asset,
}

/// Case-insensitive substring filters; empty matches everything.
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub keyword: String,
    pub category: String,
}

impl CourseFilter {
    pub fn matches(&self, title: &str, category: &str) -> bool {
        title.to_lowercase().contains(&self.keyword.to_lowercase())
            && category.to_lowercase().contains(&self.category.to_lowercase())
    }
}

#[derive(Debug, FromRow)]
pub struct CourseRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub created_by: String,
    pub poster_id: String,
    pub poster_url: String,
    pub lectures: Json<Vec<Lecture>>,
    pub views: i64,
    pub num_of_videos: i32,
    pub created_at: OffsetDateTime,
}

impl From<CourseRow> for Course {
    fn from(r: CourseRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            category: r.category,
            created_by: r.created_by,
            poster: Asset::new(r.poster_id, r.poster_url),
            lectures: r.lectures.0,
            views: r.views,
            num_of_videos: r.num_of_videos,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct CourseSummaryRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub created_by: String,
    pub poster_id: String,
    pub poster_url: String,
    pub views: i64,
    pub num_of_videos: i32,
    pub created_at: OffsetDateTime,
}

impl From<CourseSummaryRow> for CourseSummary {
    fn from(r: CourseSummaryRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            category: r.category,
            created_by: r.created_by,
            poster: Asset::new(r.poster_id, r.poster_url),
            views: r.views,
            num_of_videos: r.num_of_videos,
            created_at: r.created_at,
        }
    }
}
