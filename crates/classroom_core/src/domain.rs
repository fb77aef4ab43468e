//! crates/classroom_core/src/domain.rs
//!
//! Defines the pure, core data structures for the live classroom.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Callers
//=========================================================================================

/// The role a user holds for the whole application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The authenticated identity behind a request or a socket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn teacher(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Teacher }
    }

    pub fn student(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Student }
    }
}

//=========================================================================================
// Lectures
//=========================================================================================

/// Lifecycle of a lecture: pending -> live -> completed, or pending -> cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LectureStatus {
    Pending,
    Live,
    Completed,
    Cancelled,
}

impl LectureStatus {
    pub const ALL: [LectureStatus; 4] = [
        LectureStatus::Pending,
        LectureStatus::Live,
        LectureStatus::Completed,
        LectureStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LectureStatus::Pending => "pending",
            LectureStatus::Live => "live",
            LectureStatus::Completed => "completed",
            LectureStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled lectures never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LectureStatus::Completed | LectureStatus::Cancelled)
    }

    /// The statuses reachable in one step from `self`.
    pub fn allowed_transitions(&self) -> &'static [LectureStatus] {
        use LectureStatus::*;
        match self {
            Pending => &[Live, Completed, Cancelled],
            Live => &[Completed],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: LectureStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }
}

impl fmt::Display for LectureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LectureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LectureStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!("Status required: pending, live, completed, or cancelled (got '{}')", s)
            })
    }
}

/// A scheduled teaching unit owned by a single teacher.
#[derive(Debug, Clone, PartialEq)]
pub struct Lecture {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub topic: String,
    pub subject: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub status: LectureStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lecture {
    /// The instant the lecture is scheduled to begin, read as UTC.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at()
    }

    /// Whether `other` would collide with `self` under the pending-duplicate rule.
    pub fn same_slot(&self, other: &Lecture) -> bool {
        self.teacher_id == other.teacher_id
            && self.topic == other.topic
            && self.subject == other.subject
            && self.date == other.date
            && self.time == other.time
    }
}

/// Input for scheduling a lecture.
#[derive(Debug, Clone)]
pub struct NewLecture {
    pub topic: String,
    pub subject: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
}

/// The descriptive fields a teacher may edit while the lecture is still pending.
#[derive(Debug, Clone, Default)]
pub struct LectureChanges {
    pub topic: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
}

impl LectureChanges {
    pub fn is_empty(&self) -> bool {
        self.topic.is_none()
            && self.subject.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.duration_minutes.is_none()
    }
}

/// Parses a `YYYY-MM-DD` lecture date.
pub fn parse_lecture_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Parses an `HH:MM` or `HH:MM:SS` lecture start time.
pub fn parse_lecture_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

//=========================================================================================
// Questions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionStatus {
    Unanswered,
    Answered,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Unanswered => "unanswered",
            QuestionStatus::Answered => "answered",
        }
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unanswered" => Ok(QuestionStatus::Unanswered),
            "answered" => Ok(QuestionStatus::Answered),
            other => Err(format!(
                "Status must be one of: answered, unanswered (got '{}')",
                other
            )),
        }
    }
}

/// A student-submitted question tied to a lecture.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: Uuid,
    pub lecture_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub answer: Option<String>,
    pub status: QuestionStatus,
    /// Set exactly when `status` is `Answered`.
    pub answered_at: Option<DateTime<Utc>>,
    pub is_important: bool,
    /// `false` marks a soft-removed question.
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// Moves the question to `status`, keeping `answered_at` in step with it.
    pub fn set_status(&mut self, status: QuestionStatus, answer: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.answered_at = match status {
            QuestionStatus::Answered => Some(now),
            QuestionStatus::Unanswered => None,
        };
        if let Some(answer) = answer {
            self.answer = Some(answer);
        }
    }
}

/// Input for asking a question.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub lecture_id: Uuid,
    pub text: String,
    pub is_important: bool,
}

/// Generic field merge for a question. Status and validity have dedicated operations.
#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub text: Option<String>,
    pub answer: Option<String>,
    pub is_important: Option<bool>,
}

impl QuestionPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.answer.is_none() && self.is_important.is_none()
    }

    /// True when the patch does nothing but flip the importance flag.
    pub fn only_importance(&self) -> bool {
        self.is_important.is_some() && self.text.is_none() && self.answer.is_none()
    }
}

/// Selection for listing questions. At least one of the ids must be set.
#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub author_id: Option<Uuid>,
    pub lecture_id: Option<Uuid>,
    pub include_invalid: bool,
}

impl QuestionFilter {
    pub fn for_lecture(lecture_id: Uuid) -> Self {
        Self {
            lecture_id: Some(lecture_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, question: &Question) -> bool {
        (self.include_invalid || question.is_valid)
            && self.author_id.map_or(true, |id| question.author_id == id)
            && self.lecture_id.map_or(true, |id| question.lecture_id == id)
    }
}
