//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Handlers only translate between HTTP and the core services. Broadcasting
//! happens inside the services once a mutation has been committed.

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::{JsonBody, PathParam, QueryParams};
use crate::web::protocol::{LectureDto, QuestionDto};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use classroom_core::domain::{parse_lecture_date, parse_lecture_time};
use classroom_core::{
    Caller, LectureChanges, LectureStatus, NewLecture, NewQuestion, QuestionFilter, QuestionPatch,
    QuestionStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_lecture_handler,
        list_lectures_handler,
        change_lecture_status_handler,
        update_lecture_handler,
        delete_lecture_handler,
        create_question_handler,
        list_questions_handler,
        set_question_status_handler,
        invalidate_question_handler,
        patch_question_handler,
    ),
    components(
        schemas(
            ErrorBody, LectureDto, QuestionDto,
            CreateLectureRequest, UpdateLectureRequest, ChangeStatusRequest,
            LectureResponse, LectureListResponse, DeleteLectureResponse,
            CreateQuestionRequest, SetQuestionStatusRequest, PatchQuestionRequest,
            QuestionResponse, QuestionListResponse,
        )
    ),
    tags(
        (name = "Live Classroom API", description = "Lecture scheduling and live question moderation.")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// The document served at `/api-docs/openapi.json`, rendered as pretty JSON.
    pub fn to_pretty_json() -> Result<String, ApiError> {
        ApiDoc::openapi()
            .to_pretty_json()
            .map_err(|e| ApiError::Internal(format!("failed to render OpenAPI document: {}", e)))
    }
}

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateLectureRequest {
    pub topic: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// `HH:MM`
    pub time: Option<String>,
    #[serde(alias = "duration")]
    pub duration_minutes: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLectureRequest {
    pub topic: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    #[serde(alias = "duration")]
    pub duration_minutes: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangeStatusRequest {
    pub status: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListLecturesQuery {
    /// Students only: narrow the listing to one teacher.
    pub teacher_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct LectureResponse {
    pub message: String,
    pub lecture: LectureDto,
}

#[derive(Serialize, ToSchema)]
pub struct LectureListResponse {
    pub count: usize,
    pub lectures: Vec<LectureDto>,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteLectureResponse {
    pub message: String,
    pub id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateQuestionRequest {
    #[serde(alias = "question")]
    pub text: Option<String>,
    pub lecture_id: Option<Uuid>,
    #[serde(default)]
    pub is_important: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct SetQuestionStatusRequest {
    pub status: Option<String>,
    pub answer: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PatchQuestionRequest {
    pub text: Option<String>,
    pub answer: Option<String>,
    pub is_important: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuestionsQuery {
    pub author_id: Option<Uuid>,
    pub lecture_id: Option<Uuid>,
    /// Include soft-removed questions.
    #[serde(default)]
    pub include_invalid: bool,
}

#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub message: String,
    pub question: QuestionDto,
}

#[derive(Serialize, ToSchema)]
pub struct QuestionListResponse {
    pub count: usize,
    pub questions: Vec<QuestionDto>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn lecture_date(raw: &str) -> Result<chrono::NaiveDate, ApiError> {
    parse_lecture_date(raw).ok_or_else(|| ApiError::validation("date must be formatted YYYY-MM-DD"))
}

fn lecture_time(raw: &str) -> Result<chrono::NaiveTime, ApiError> {
    parse_lecture_time(raw).ok_or_else(|| ApiError::validation("time must be formatted HH:MM"))
}

//=========================================================================================
// Lecture Handlers
//=========================================================================================

/// Schedule a new lecture. Teachers only.
#[utoipa::path(
    post,
    path = "/lectures",
    request_body = CreateLectureRequest,
    responses(
        (status = 201, description = "Class created successfully", body = LectureResponse),
        (status = 400, description = "Missing or malformed fields", body = ErrorBody),
        (status = 403, description = "Caller is not a teacher", body = ErrorBody),
        (status = 409, description = "A pending class already occupies this slot", body = ErrorBody)
    )
)]
pub async fn create_lecture_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    JsonBody(req): JsonBody<CreateLectureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(topic), Some(subject), Some(date), Some(time), Some(duration_minutes)) = (
        non_blank(req.topic),
        non_blank(req.subject),
        non_blank(req.date),
        non_blank(req.time),
        req.duration_minutes,
    ) else {
        return Err(ApiError::validation(
            "All fields (topic, subject, date, time, duration) are required",
        ));
    };

    let new = NewLecture {
        topic,
        subject,
        description: req.description,
        date: lecture_date(&date)?,
        time: lecture_time(&time)?,
        duration_minutes,
    };
    let lecture = app_state.lectures.create(&caller, new).await?;

    Ok((
        StatusCode::CREATED,
        Json(LectureResponse {
            message: "Class created successfully".to_string(),
            lecture: lecture.into(),
        }),
    ))
}

/// List lectures. Teachers see their own; students see all, optionally by teacher.
#[utoipa::path(
    get,
    path = "/lectures",
    params(ListLecturesQuery),
    responses(
        (status = 200, description = "Lectures, newest first", body = LectureListResponse)
    )
)]
pub async fn list_lectures_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    QueryParams(query): QueryParams<ListLecturesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let lectures = app_state.lectures.list(&caller, query.teacher_id).await?;
    let lectures: Vec<LectureDto> = lectures.into_iter().map(Into::into).collect();
    Ok(Json(LectureListResponse {
        count: lectures.len(),
        lectures,
    }))
}

/// Move a lecture along its lifecycle. Completing it ends the class for everyone in the room.
#[utoipa::path(
    patch,
    path = "/lectures/{id}/status",
    request_body = ChangeStatusRequest,
    params(("id" = Uuid, Path, description = "Lecture id")),
    responses(
        (status = 200, description = "Class status updated", body = LectureResponse),
        (status = 400, description = "Bad status or illegal transition", body = ErrorBody),
        (status = 403, description = "Not the owning teacher", body = ErrorBody),
        (status = 404, description = "Lecture not found", body = ErrorBody)
    )
)]
pub async fn change_lecture_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    PathParam(lecture_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<ChangeStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target: LectureStatus = req
        .status
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(ApiError::validation)?;

    let lecture = app_state
        .lectures
        .change_status(&caller, lecture_id, target)
        .await?;
    Ok(Json(LectureResponse {
        message: "Class status updated".to_string(),
        lecture: lecture.into(),
    }))
}

/// Edit a pending lecture that has not started yet.
#[utoipa::path(
    patch,
    path = "/lectures/{id}",
    request_body = UpdateLectureRequest,
    params(("id" = Uuid, Path, description = "Lecture id")),
    responses(
        (status = 200, description = "Lecture updated", body = LectureResponse),
        (status = 400, description = "Not editable or malformed fields", body = ErrorBody),
        (status = 403, description = "Not the owning teacher", body = ErrorBody),
        (status = 404, description = "Lecture not found", body = ErrorBody)
    )
)]
pub async fn update_lecture_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    PathParam(lecture_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<UpdateLectureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let changes = LectureChanges {
        topic: req.topic,
        subject: req.subject,
        description: req.description,
        date: req.date.as_deref().map(lecture_date).transpose()?,
        time: req.time.as_deref().map(lecture_time).transpose()?,
        duration_minutes: req.duration_minutes,
    };
    let lecture = app_state.lectures.update(&caller, lecture_id, changes).await?;
    Ok(Json(LectureResponse {
        message: "Lecture updated.".to_string(),
        lecture: lecture.into(),
    }))
}

/// Delete a lecture regardless of its status.
#[utoipa::path(
    delete,
    path = "/lectures/{id}",
    params(("id" = Uuid, Path, description = "Lecture id")),
    responses(
        (status = 200, description = "Lecture deleted successfully", body = DeleteLectureResponse),
        (status = 403, description = "Not the owning teacher", body = ErrorBody),
        (status = 404, description = "Lecture not found", body = ErrorBody)
    )
)]
pub async fn delete_lecture_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    PathParam(lecture_id): PathParam<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lecture = app_state.lectures.delete(&caller, lecture_id).await?;
    Ok(Json(DeleteLectureResponse {
        message: "Lecture deleted successfully".to_string(),
        id: lecture.id,
    }))
}

//=========================================================================================
// Question Handlers
//=========================================================================================

/// Ask a question in a lecture. Students only.
#[utoipa::path(
    post,
    path = "/questions",
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question created successfully", body = QuestionResponse),
        (status = 400, description = "Missing fields or lecture closed", body = ErrorBody),
        (status = 403, description = "Caller is not a student", body = ErrorBody),
        (status = 404, description = "Lecture not found", body = ErrorBody),
        (status = 409, description = "Question already exists in this lecture", body = ErrorBody)
    )
)]
pub async fn create_question_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    JsonBody(req): JsonBody<CreateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(text), Some(lecture_id)) = (non_blank(req.text), req.lecture_id) else {
        return Err(ApiError::validation("question and lecture_id are required"));
    };

    let question = app_state
        .questions
        .create(
            &caller,
            NewQuestion {
                lecture_id,
                text,
                is_important: req.is_important,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse {
            message: "Question created successfully".to_string(),
            question: question.into(),
        }),
    ))
}

/// List questions by author and/or lecture. Soft-removed questions are hidden by default.
#[utoipa::path(
    get,
    path = "/questions",
    params(ListQuestionsQuery),
    responses(
        (status = 200, description = "Questions, newest first", body = QuestionListResponse),
        (status = 400, description = "Neither author_id nor lecture_id given", body = ErrorBody)
    )
)]
pub async fn list_questions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    QueryParams(query): QueryParams<ListQuestionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = QuestionFilter {
        author_id: query.author_id,
        lecture_id: query.lecture_id,
        include_invalid: query.include_invalid,
    };
    let questions = app_state.questions.list(&caller, &filter).await?;
    let questions: Vec<QuestionDto> = questions.into_iter().map(Into::into).collect();
    Ok(Json(QuestionListResponse {
        count: questions.len(),
        questions,
    }))
}

/// Mark a question answered (optionally with answer text) or unanswered.
#[utoipa::path(
    patch,
    path = "/questions/{id}/status",
    request_body = SetQuestionStatusRequest,
    params(("id" = Uuid, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question status updated successfully", body = QuestionResponse),
        (status = 400, description = "Bad status", body = ErrorBody),
        (status = 403, description = "Not the lecture's teacher", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn set_question_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    PathParam(question_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<SetQuestionStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(status) = req.status else {
        return Err(ApiError::validation("status is required"));
    };
    let status: QuestionStatus = status.parse().map_err(ApiError::validation)?;

    let question = app_state
        .questions
        .set_status(&caller, question_id, status, req.answer)
        .await?;
    Ok(Json(QuestionResponse {
        message: "Question status updated successfully".to_string(),
        question: question.into(),
    }))
}

/// Soft-remove a question from the lecture's listings.
#[utoipa::path(
    patch,
    path = "/questions/{id}/invalidate",
    params(("id" = Uuid, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question cleared successfully", body = QuestionResponse),
        (status = 403, description = "Not the lecture's teacher", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn invalidate_question_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    PathParam(question_id): PathParam<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let question = app_state.questions.invalidate(&caller, question_id).await?;
    Ok(Json(QuestionResponse {
        message: "Question cleared successfully".to_string(),
        question: question.into(),
    }))
}

/// Merge editable fields (text, answer, importance) into a question.
#[utoipa::path(
    patch,
    path = "/questions/{id}",
    request_body = PatchQuestionRequest,
    params(("id" = Uuid, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question updated successfully", body = QuestionResponse),
        (status = 400, description = "Nothing to update or empty text", body = ErrorBody),
        (status = 403, description = "Not the lecture's teacher", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody)
    )
)]
pub async fn patch_question_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    PathParam(question_id): PathParam<Uuid>,
    JsonBody(req): JsonBody<PatchQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = QuestionPatch {
        text: req.text,
        answer: req.answer,
        is_important: req.is_important,
    };
    let question = app_state.questions.patch(&caller, question_id, patch).await?;
    Ok(Json(QuestionResponse {
        message: "Question updated successfully".to_string(),
        question: question.into(),
    }))
}
