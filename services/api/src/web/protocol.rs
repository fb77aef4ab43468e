//! services/api/src/web/protocol.rs
//!
//! Defines the JSON shapes exchanged with browser clients: the entity payloads
//! shared by the REST and WebSocket surfaces, and the WebSocket message protocol.

use chrono::{DateTime, Timelike, Utc};
use classroom_core::domain::{parse_lecture_date, parse_lecture_time, Lecture, Question};
use classroom_core::events::{EventEntity, EventKind, RoomEvent};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Entity Payloads
//=========================================================================================

/// A lecture as sent over the wire. Events always carry the full record.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct LectureDto {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub topic: String,
    pub subject: String,
    pub description: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, or `HH:MM:SS` when seconds are set.
    pub time: String,
    pub duration_minutes: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Lecture> for LectureDto {
    fn from(lecture: Lecture) -> Self {
        let time = if lecture.time.second() == 0 {
            lecture.time.format("%H:%M").to_string()
        } else {
            lecture.time.format("%H:%M:%S").to_string()
        };
        Self {
            id: lecture.id,
            teacher_id: lecture.teacher_id,
            topic: lecture.topic,
            subject: lecture.subject,
            description: lecture.description,
            date: lecture.date.format("%Y-%m-%d").to_string(),
            time,
            duration_minutes: lecture.duration_minutes,
            status: lecture.status.as_str().to_string(),
            created_at: lecture.created_at,
            updated_at: lecture.updated_at,
        }
    }
}

impl TryFrom<LectureDto> for Lecture {
    type Error = String;

    fn try_from(dto: LectureDto) -> Result<Self, Self::Error> {
        Ok(Lecture {
            id: dto.id,
            teacher_id: dto.teacher_id,
            topic: dto.topic,
            subject: dto.subject,
            description: dto.description,
            date: parse_lecture_date(&dto.date).ok_or_else(|| format!("bad date '{}'", dto.date))?,
            time: parse_lecture_time(&dto.time).ok_or_else(|| format!("bad time '{}'", dto.time))?,
            duration_minutes: dto.duration_minutes,
            status: dto.status.parse()?,
            created_at: dto.created_at,
            updated_at: dto.updated_at,
        })
    }
}

/// A question as sent over the wire.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct QuestionDto {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub answer: Option<String>,
    pub status: String,
    pub answered_at: Option<DateTime<Utc>>,
    pub is_important: bool,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Question> for QuestionDto {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            lecture_id: question.lecture_id,
            author_id: question.author_id,
            text: question.text,
            answer: question.answer,
            status: question.status.as_str().to_string(),
            answered_at: question.answered_at,
            is_important: question.is_important,
            is_valid: question.is_valid,
            created_at: question.created_at,
        }
    }
}

impl TryFrom<QuestionDto> for Question {
    type Error = String;

    fn try_from(dto: QuestionDto) -> Result<Self, Self::Error> {
        Ok(Question {
            id: dto.id,
            lecture_id: dto.lecture_id,
            author_id: dto.author_id,
            text: dto.text,
            answer: dto.answer,
            status: dto.status.parse()?,
            answered_at: dto.answered_at,
            is_important: dto.is_important,
            is_valid: dto.is_valid,
            created_at: dto.created_at,
        })
    }
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribes the connection to a lecture's room.
    JoinRoom { lecture_id: Uuid },

    /// Unsubscribes the connection from a lecture's room.
    LeaveRoom { lecture_id: Uuid },

    /// A student asks a question.
    SubmitQuestion {
        text: String,
        lecture_id: Uuid,
        author_id: Uuid,
        #[serde(default)]
        is_important: bool,
    },

    /// The teacher answers a question.
    SubmitAnswer {
        question_id: Uuid,
        answer: String,
        lecture_id: Uuid,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
///
/// Room events are published to every member of the lecture's room; the
/// acknowledgements and errors only ever go back to the originating connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    QuestionCreated { lecture_id: Uuid, entity: QuestionDto },
    QuestionAnswered { lecture_id: Uuid, entity: QuestionDto },
    QuestionStarred { lecture_id: Uuid, entity: QuestionDto },
    QuestionUpdated { lecture_id: Uuid, entity: QuestionDto },
    QuestionDeleted { lecture_id: Uuid, entity: QuestionDto },
    SessionCreated { lecture_id: Uuid, entity: LectureDto },
    SessionUpdated { lecture_id: Uuid, entity: LectureDto },
    /// Includes the `completed` transition, i.e. "class ended".
    SessionStatusChanged { lecture_id: Uuid, entity: LectureDto },
    SessionDeleted { lecture_id: Uuid, entity: LectureDto },

    RoomJoined { lecture_id: Uuid },
    RoomLeft { lecture_id: Uuid },

    /// A `submit_question` from this connection failed.
    QuestionError { error: String },
    /// A `submit_answer` from this connection failed.
    AnswerError { error: String },
    /// A frame from this connection could not be understood.
    ProtocolError { error: String },
}

impl From<RoomEvent> for ServerMessage {
    fn from(event: RoomEvent) -> Self {
        let lecture_id = event.lecture_id;
        match event.entity {
            EventEntity::Question(question) => {
                let entity = QuestionDto::from(question);
                match event.kind {
                    EventKind::QuestionCreated => ServerMessage::QuestionCreated { lecture_id, entity },
                    EventKind::QuestionAnswered => ServerMessage::QuestionAnswered { lecture_id, entity },
                    EventKind::QuestionStarred => ServerMessage::QuestionStarred { lecture_id, entity },
                    EventKind::QuestionDeleted => ServerMessage::QuestionDeleted { lecture_id, entity },
                    _ => ServerMessage::QuestionUpdated { lecture_id, entity },
                }
            }
            EventEntity::Lecture(lecture) => {
                let entity = LectureDto::from(lecture);
                match event.kind {
                    EventKind::SessionCreated => ServerMessage::SessionCreated { lecture_id, entity },
                    EventKind::SessionUpdated => ServerMessage::SessionUpdated { lecture_id, entity },
                    EventKind::SessionDeleted => ServerMessage::SessionDeleted { lecture_id, entity },
                    _ => ServerMessage::SessionStatusChanged { lecture_id, entity },
                }
            }
        }
    }
}

impl ServerMessage {
    /// Turns a received room event back into its domain form. Returns `None`
    /// for acknowledgements, errors and undecodable entities.
    pub fn into_room_event(self) -> Option<RoomEvent> {
        let (kind, lecture_id, entity) = match self {
            ServerMessage::QuestionCreated { lecture_id, entity } => {
                (EventKind::QuestionCreated, lecture_id, question_entity(entity)?)
            }
            ServerMessage::QuestionAnswered { lecture_id, entity } => {
                (EventKind::QuestionAnswered, lecture_id, question_entity(entity)?)
            }
            ServerMessage::QuestionStarred { lecture_id, entity } => {
                (EventKind::QuestionStarred, lecture_id, question_entity(entity)?)
            }
            ServerMessage::QuestionUpdated { lecture_id, entity } => {
                (EventKind::QuestionUpdated, lecture_id, question_entity(entity)?)
            }
            ServerMessage::QuestionDeleted { lecture_id, entity } => {
                (EventKind::QuestionDeleted, lecture_id, question_entity(entity)?)
            }
            ServerMessage::SessionCreated { lecture_id, entity } => {
                (EventKind::SessionCreated, lecture_id, lecture_entity(entity)?)
            }
            ServerMessage::SessionUpdated { lecture_id, entity } => {
                (EventKind::SessionUpdated, lecture_id, lecture_entity(entity)?)
            }
            ServerMessage::SessionStatusChanged { lecture_id, entity } => {
                (EventKind::SessionStatusChanged, lecture_id, lecture_entity(entity)?)
            }
            ServerMessage::SessionDeleted { lecture_id, entity } => {
                (EventKind::SessionDeleted, lecture_id, lecture_entity(entity)?)
            }
            _ => return None,
        };
        Some(RoomEvent {
            kind,
            lecture_id,
            entity,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn question_entity(dto: QuestionDto) -> Option<EventEntity> {
    Question::try_from(dto).ok().map(EventEntity::Question)
}

fn lecture_entity(dto: LectureDto) -> Option<EventEntity> {
    Lecture::try_from(dto).ok().map(EventEntity::Lecture)
}
