//! crates/classroom_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or sockets.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Caller, Lecture, LectureStatus, Question, QuestionFilter};
use crate::events::RoomEvent;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// A conditional write found the record in a different state than expected.
    #[error("Stale: {0}")]
    Stale(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait LectureRepository: Send + Sync {
    /// Stores a new lecture. Fails with `Conflict` when another lecture in the
    /// same slot (teacher, topic, subject, date, time) is still pending.
    async fn insert_lecture(&self, lecture: &Lecture) -> PortResult<()>;

    async fn get_lecture(&self, lecture_id: Uuid) -> PortResult<Lecture>;

    /// Overwrites the stored record with `lecture`, but only while the stored
    /// status is still `expected`. Fails with `Stale` when another write moved
    /// the lecture first.
    async fn save_lecture(&self, lecture: &Lecture, expected: LectureStatus) -> PortResult<()>;

    async fn delete_lecture(&self, lecture_id: Uuid) -> PortResult<()>;

    /// Newest first. `None` lists every teacher's lectures.
    async fn list_lectures(&self, teacher_id: Option<Uuid>) -> PortResult<Vec<Lecture>>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Stores a new question unless a question of the same lecture matches
    /// `text_pattern` (an anchored, already-escaped regular expression compared
    /// case-insensitively), in which case it fails with `Conflict`.
    async fn insert_question(&self, question: &Question, text_pattern: &str) -> PortResult<()>;

    async fn get_question(&self, question_id: Uuid) -> PortResult<Question>;

    /// Overwrites the stored record with `question`. Last write wins, except that
    /// the text must stay unique (case-insensitively) within its lecture, or the
    /// write fails with `Conflict`.
    async fn save_question(&self, question: &Question) -> PortResult<()>;

    /// Newest first.
    async fn list_questions(&self, filter: &QuestionFilter) -> PortResult<Vec<Question>>;
}

/// Delivers an event to every connection currently joined to its lecture's room.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: RoomEvent) -> PortResult<()>;
}

/// Resolves an opaque credential into the caller it belongs to.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn resolve_token(&self, token: &str) -> PortResult<Caller>;
}

/// An authoritative source of the current question list, used by clients to resync.
#[async_trait]
pub trait QuestionFeed: Send + Sync {
    async fn fetch_questions(&self, lecture_id: Uuid) -> PortResult<Vec<Question>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
