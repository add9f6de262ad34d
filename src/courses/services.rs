use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{AddLectureInput, CreateCourseInput},
    repo_types::{Course, CourseFilter, CourseSummary, Lecture, NewCourse},
};
use crate::{
    error::{AppError, AppResult},
    media::{AssetSlot, Upload},
    state::AppState,
};

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn load_course(st: &AppState, id: Uuid) -> AppResult<Course> {
    st.courses
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))
}

pub async fn list_courses(st: &AppState, keyword: &str, category: &str) -> AppResult<Vec<CourseSummary>> {
    let filter = CourseFilter {
        keyword: keyword.trim().to_string(),
        category: category.trim().to_string(),
    };
    Ok(st.courses.list(&filter).await?)
}

pub async fn create_course(st: &AppState, input: CreateCourseInput, poster: Option<Upload>) -> AppResult<Course> {
    let (Some(title), Some(description), Some(category), Some(created_by)) = (
        required(input.title),
        required(input.description),
        required(input.category),
        required(input.created_by),
    ) else {
        return Err(AppError::validation("Please add all fields"));
    };

    let poster = st.media.store(poster, AssetSlot::Poster).await;
    let course = st
        .courses
        .insert(NewCourse {
            title,
            description,
            category,
            created_by,
            poster,
        })
        .await?;
    info!(course_id = %course.id, title = %course.title, "course created");
    Ok(course)
}

pub async fn add_lecture(
    st: &AppState,
    course_id: Uuid,
    input: AddLectureInput,
    video: Option<Upload>,
) -> AppResult<Course> {
    load_course(st, course_id).await?;
    let video = video.ok_or_else(|| AppError::validation("No video file provided"))?;
    let (Some(title), Some(description)) = (required(input.title), required(input.description)) else {
        return Err(AppError::validation("Please add all fields"));
    };

    let lecture = Lecture {
        id: Uuid::new_v4(),
        title,
        description,
        video: st.media.store(Some(video), AssetSlot::Video).await,
    };

    match st.courses.append_lecture(course_id, &lecture).await? {
        Some(course) => {
            info!(course_id = %course.id, lecture_id = %lecture.id, lectures = course.num_of_videos, "lecture added");
            Ok(course)
        }
        None => {
            warn!(course_id = %course_id, "course vanished during lecture upload");
            st.media.discard(&lecture.video, AssetSlot::Video).await;
            Err(AppError::not_found("Course not found"))
        }
    }
}

/// Returns the lectures and counts one view. Every call counts, including the creator's.
pub async fn get_lectures(st: &AppState, course_id: Uuid) -> AppResult<Vec<Lecture>> {
    st.courses
        .record_view(course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))
}

pub async fn remove_lecture(st: &AppState, course_id: Uuid, lecture_id: Uuid) -> AppResult<Course> {
    let course = load_course(st, course_id).await?;
    let lecture = course
        .lecture(lecture_id)
        .ok_or_else(|| AppError::not_found("Lecture not found"))?;

    st.media.discard(&lecture.video, AssetSlot::Video).await;

    let course = st
        .courses
        .remove_lecture(course_id, lecture_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course not found"))?;
    info!(course_id = %course.id, lecture_id = %lecture_id, lectures = course.num_of_videos, "lecture removed");
    Ok(course)
}

pub async fn delete_course(st: &AppState, course_id: Uuid) -> AppResult<()> {
    let course = load_course(st, course_id).await?;

    st.media.discard(&course.poster, AssetSlot::Poster).await;
    for lecture in &course.lectures {
        st.media.discard(&lecture.video, AssetSlot::Video).await;
    }

    if !st.courses.delete(course.id).await? {
        return Err(AppError::not_found("Course not found"));
    }
    info!(course_id = %course.id, "course deleted");
    Ok(())
}
