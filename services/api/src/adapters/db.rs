//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the persistence ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use classroom_core::domain::{Caller, Lecture, LectureStatus, Question, QuestionFilter, Role};
use classroom_core::ports::{
    IdentityService, LectureRepository, PortError, PortResult, QuestionRepository,
};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps a driver error, turning unique-index violations into `Conflict`.
/// The driver's own message only reaches the logs.
fn map_write_error(e: sqlx::Error, conflict: &str) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            debug!("Unique violation: {}", db.message());
            PortError::Conflict(conflict.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn map_read_error(e: sqlx::Error, what: &str, id: Uuid) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const LECTURE_COLUMNS: &str = "id, teacher_id, topic, subject, description, lecture_date, \
     lecture_time, duration_minutes, status, created_at, updated_at";

#[derive(FromRow)]
struct LectureRecord {
    id: Uuid,
    teacher_id: Uuid,
    topic: String,
    subject: String,
    description: Option<String>,
    lecture_date: NaiveDate,
    lecture_time: NaiveTime,
    duration_minutes: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl LectureRecord {
    fn to_domain(self) -> PortResult<Lecture> {
        Ok(Lecture {
            id: self.id,
            teacher_id: self.teacher_id,
            topic: self.topic,
            subject: self.subject,
            description: self.description,
            date: self.lecture_date,
            time: self.lecture_time,
            duration_minutes: u32::try_from(self.duration_minutes)
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const QUESTION_COLUMNS: &str = "id, lecture_id, author_id, question_text, answer, status, \
     answered_at, is_important, is_valid, created_at";

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    lecture_id: Uuid,
    author_id: Uuid,
    question_text: String,
    answer: Option<String>,
    status: String,
    answered_at: Option<DateTime<Utc>>,
    is_important: bool,
    is_valid: bool,
    created_at: DateTime<Utc>,
}
impl QuestionRecord {
    fn to_domain(self) -> PortResult<Question> {
        Ok(Question {
            id: self.id,
            lecture_id: self.lecture_id,
            author_id: self.author_id,
            text: self.question_text,
            answer: self.answer,
            status: self.status.parse().map_err(PortError::Unexpected)?,
            answered_at: self.answered_at,
            is_important: self.is_important,
            is_valid: self.is_valid,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CallerRecord {
    user_id: Uuid,
    role: String,
}
impl CallerRecord {
    fn to_domain(self) -> PortResult<Caller> {
        let role: Role = self.role.parse().map_err(PortError::Unexpected)?;
        Ok(Caller {
            user_id: self.user_id,
            role,
        })
    }
}

fn duration_column(minutes: u32) -> PortResult<i32> {
    i32::try_from(minutes).map_err(|e| PortError::Unexpected(e.to_string()))
}

//=========================================================================================
// `LectureRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl LectureRepository for DbAdapter {
    async fn insert_lecture(&self, lecture: &Lecture) -> PortResult<()> {
        // The partial unique index `lectures_pending_slot` rejects a second pending
        // lecture in the same slot.
        sqlx::query(
            "INSERT INTO lectures (id, teacher_id, topic, subject, description, lecture_date, \
             lecture_time, duration_minutes, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(lecture.id)
        .bind(lecture.teacher_id)
        .bind(&lecture.topic)
        .bind(&lecture.subject)
        .bind(&lecture.description)
        .bind(lecture.date)
        .bind(lecture.time)
        .bind(duration_column(lecture.duration_minutes)?)
        .bind(lecture.status.as_str())
        .bind(lecture.created_at)
        .bind(lecture.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "pending lecture already scheduled for this slot"))?;
        Ok(())
    }

    async fn get_lecture(&self, lecture_id: Uuid) -> PortResult<Lecture> {
        let record = sqlx::query_as::<_, LectureRecord>(&format!(
            "SELECT {} FROM lectures WHERE id = $1",
            LECTURE_COLUMNS
        ))
        .bind(lecture_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_error(e, "Lecture", lecture_id))?;
        record.to_domain()
    }

    async fn save_lecture(&self, lecture: &Lecture, expected: LectureStatus) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE lectures SET topic = $2, subject = $3, description = $4, lecture_date = $5, \
             lecture_time = $6, duration_minutes = $7, status = $8, updated_at = $9 \
             WHERE id = $1 AND status = $10",
        )
        .bind(lecture.id)
        .bind(&lecture.topic)
        .bind(&lecture.subject)
        .bind(&lecture.description)
        .bind(lecture.date)
        .bind(lecture.time)
        .bind(duration_column(lecture.duration_minutes)?)
        .bind(lecture.status.as_str())
        .bind(lecture.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "pending lecture already scheduled for this slot"))?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM lectures WHERE id = $1)")
                .bind(lecture.id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            return Err(if exists {
                PortError::Stale(format!("lecture {} is no longer {}", lecture.id, expected))
            } else {
                PortError::NotFound(format!("Lecture {} not found", lecture.id))
            });
        }
        Ok(())
    }

    async fn delete_lecture(&self, lecture_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM lectures WHERE id = $1")
            .bind(lecture_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Lecture {} not found", lecture_id)));
        }
        Ok(())
    }

    async fn list_lectures(&self, teacher_id: Option<Uuid>) -> PortResult<Vec<Lecture>> {
        let records = sqlx::query_as::<_, LectureRecord>(&format!(
            "SELECT {} FROM lectures WHERE ($1::uuid IS NULL OR teacher_id = $1) \
             ORDER BY created_at DESC",
            LECTURE_COLUMNS
        ))
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(LectureRecord::to_domain).collect()
    }
}

//=========================================================================================
// `QuestionRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuestionRepository for DbAdapter {
    async fn insert_question(&self, question: &Question, text_pattern: &str) -> PortResult<()> {
        // `~*` is PostgreSQL's case-insensitive regex match; the pattern arrives
        // anchored and escaped.
        let result = sqlx::query(
            "INSERT INTO questions (id, lecture_id, author_id, question_text, answer, status, \
             answered_at, is_important, is_valid, created_at) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM questions WHERE lecture_id = $2 AND question_text ~* $11 \
             )",
        )
        .bind(question.id)
        .bind(question.lecture_id)
        .bind(question.author_id)
        .bind(&question.text)
        .bind(&question.answer)
        .bind(question.status.as_str())
        .bind(question.answered_at)
        .bind(question.is_important)
        .bind(question.is_valid)
        .bind(question.created_at)
        .bind(text_pattern)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "question text already asked in this lecture"))?;

        if result.rows_affected() == 0 {
            return Err(PortError::Conflict(format!(
                "question text already asked in lecture {}",
                question.lecture_id
            )));
        }
        Ok(())
    }

    async fn get_question(&self, question_id: Uuid) -> PortResult<Question> {
        let record = sqlx::query_as::<_, QuestionRecord>(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_error(e, "Question", question_id))?;
        record.to_domain()
    }

    async fn save_question(&self, question: &Question) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE questions SET question_text = $2, answer = $3, status = $4, answered_at = $5, \
             is_important = $6, is_valid = $7 WHERE id = $1",
        )
        .bind(question.id)
        .bind(&question.text)
        .bind(&question.answer)
        .bind(question.status.as_str())
        .bind(question.answered_at)
        .bind(question.is_important)
        .bind(question.is_valid)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "question text already asked in this lecture"))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Question {} not found", question.id)));
        }
        Ok(())
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> PortResult<Vec<Question>> {
        let records = sqlx::query_as::<_, QuestionRecord>(&format!(
            "SELECT {} FROM questions \
             WHERE ($1::uuid IS NULL OR author_id = $1) \
               AND ($2::uuid IS NULL OR lecture_id = $2) \
               AND ($3 OR is_valid) \
             ORDER BY created_at DESC",
            QUESTION_COLUMNS
        ))
        .bind(filter.author_id)
        .bind(filter.lecture_id)
        .bind(filter.include_invalid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        records.into_iter().map(QuestionRecord::to_domain).collect()
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn resolve_token(&self, token: &str) -> PortResult<Caller> {
        let record = sqlx::query_as::<_, CallerRecord>(
            "SELECT u.user_id, u.role FROM auth_sessions s \
             JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => PortError::Unexpected(e.to_string()),
        })?;
        record.to_domain()
    }
}
