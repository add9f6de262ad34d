use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{Course, CourseSummary, Lecture};

#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureQuery {
    pub course_id: Uuid,
    pub lecture_id: Uuid,
}

/// Text fields of the course creation form.
#[derive(Debug, Default, Clone)]
pub struct CreateCourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct AddLectureInput {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CoursesResponse {
    pub success: bool,
    pub courses: Vec<CourseSummary>,
}

#[derive(Debug, Serialize)]
pub struct CourseResponse {
    pub success: bool,
    pub message: String,
    pub course: Course,
}

#[derive(Debug, Serialize)]
pub struct LecturesResponse {
    pub success: bool,
    pub lectures: Vec<Lecture>,
}
