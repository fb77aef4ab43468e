//! crates/classroom_core/src/events.rs
//!
//! The room event catalog and the bridge that turns committed store mutations
//! into broadcasts. Ingress adapters never publish on their own; every event a
//! room sees comes out of [`EventBridge`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::{Lecture, Question};
use crate::ports::EventPublisher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    QuestionCreated,
    QuestionAnswered,
    QuestionStarred,
    QuestionUpdated,
    QuestionDeleted,
    SessionCreated,
    SessionUpdated,
    SessionStatusChanged,
    SessionDeleted,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::QuestionCreated,
        EventKind::QuestionAnswered,
        EventKind::QuestionStarred,
        EventKind::QuestionUpdated,
        EventKind::QuestionDeleted,
        EventKind::SessionCreated,
        EventKind::SessionUpdated,
        EventKind::SessionStatusChanged,
        EventKind::SessionDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::QuestionCreated => "question_created",
            EventKind::QuestionAnswered => "question_answered",
            EventKind::QuestionStarred => "question_starred",
            EventKind::QuestionUpdated => "question_updated",
            EventKind::QuestionDeleted => "question_deleted",
            EventKind::SessionCreated => "session_created",
            EventKind::SessionUpdated => "session_updated",
            EventKind::SessionStatusChanged => "session_status_changed",
            EventKind::SessionDeleted => "session_deleted",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn is_question_event(&self) -> bool {
        matches!(
            self,
            EventKind::QuestionCreated
                | EventKind::QuestionAnswered
                | EventKind::QuestionStarred
                | EventKind::QuestionUpdated
                | EventKind::QuestionDeleted
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full record an event describes. Events never carry partial diffs.
#[derive(Debug, Clone, PartialEq)]
pub enum EventEntity {
    Question(Question),
    Lecture(Lecture),
}

/// One broadcast, scoped to the room of `lecture_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    pub kind: EventKind,
    pub lecture_id: Uuid,
    pub entity: EventEntity,
}

impl RoomEvent {
    pub fn question(kind: EventKind, question: &Question) -> Self {
        Self {
            kind,
            lecture_id: question.lecture_id,
            entity: EventEntity::Question(question.clone()),
        }
    }

    pub fn lecture(kind: EventKind, lecture: &Lecture) -> Self {
        Self {
            kind,
            lecture_id: lecture.id,
            entity: EventEntity::Lecture(lecture.clone()),
        }
    }

    pub fn as_question(&self) -> Option<&Question> {
        match &self.entity {
            EventEntity::Question(question) => Some(question),
            EventEntity::Lecture(_) => None,
        }
    }

    pub fn as_lecture(&self) -> Option<&Lecture> {
        match &self.entity {
            EventEntity::Lecture(lecture) => Some(lecture),
            EventEntity::Question(_) => None,
        }
    }
}

/// The single authoritative broadcast source.
///
/// Services call it exactly once after a mutation has been committed. A failed
/// publish is logged and absorbed: the commit stands and clients recover
/// through their reconnect resync.
#[derive(Clone)]
pub struct EventBridge {
    publisher: Arc<dyn EventPublisher>,
}

impl EventBridge {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub async fn question_committed(&self, kind: EventKind, question: &Question) {
        self.emit(RoomEvent::question(kind, question)).await;
    }

    pub async fn lecture_committed(&self, kind: EventKind, lecture: &Lecture) {
        self.emit(RoomEvent::lecture(kind, lecture)).await;
    }

    async fn emit(&self, event: RoomEvent) {
        let kind = event.kind;
        let lecture_id = event.lecture_id;
        match self.publisher.publish(event).await {
            Ok(()) => debug!("Published {} to room {}", kind, lecture_id),
            Err(e) => error!("Failed to publish {} to room {}: {:?}", kind, lecture_id, e),
        }
    }
}
