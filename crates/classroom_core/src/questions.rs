//! crates/classroom_core/src/questions.rs
//!
//! The question store: student submissions with case-insensitive dedup, and
//! the moderation operations reserved to the lecture's owning teacher.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Caller, Lecture, NewQuestion, Question, QuestionFilter, QuestionPatch, QuestionStatus, Role,
};
use crate::error::{ServiceError, ServiceResult};
use crate::events::{EventBridge, EventKind};
use crate::policy::{require_owner, require_role};
use crate::ports::{Clock, LectureRepository, PortError, PortResult, QuestionFeed, QuestionRepository};

const DUPLICATE_QUESTION: &str = "Question already exists in this lecture.";

/// Builds the anchored pattern used for the duplicate check. Every regex
/// metacharacter in `text` is escaped so the match is literal.
pub fn exact_text_pattern(text: &str) -> String {
    format!("^{}$", regex::escape(text))
}

#[derive(Clone)]
pub struct QuestionService {
    questions: Arc<dyn QuestionRepository>,
    lectures: Arc<dyn LectureRepository>,
    bridge: EventBridge,
    clock: Arc<dyn Clock>,
}

impl QuestionService {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        lectures: Arc<dyn LectureRepository>,
        bridge: EventBridge,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            questions,
            lectures,
            bridge,
            clock,
        }
    }

    /// Records a student's question against an existing lecture.
    pub async fn create(&self, caller: &Caller, new: NewQuestion) -> ServiceResult<Question> {
        require_role(caller, Role::Student)?;
        if new.text.trim().is_empty() {
            return Err(ServiceError::Validation(
                "question and lecture_id are required".to_string(),
            ));
        }

        let lecture = self.lecture(new.lecture_id).await?;
        if lecture.status.is_terminal() {
            return Err(ServiceError::InvalidTransition(format!(
                "Class is already {}, questions are closed.",
                lecture.status
            )));
        }

        let question = Question {
            id: Uuid::new_v4(),
            lecture_id: lecture.id,
            author_id: caller.user_id,
            text: new.text,
            answer: None,
            status: QuestionStatus::Unanswered,
            answered_at: None,
            is_important: new.is_important,
            is_valid: true,
            created_at: self.clock.now(),
        };

        let pattern = exact_text_pattern(&question.text);
        self.questions
            .insert_question(&question, &pattern)
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => ServiceError::Conflict(DUPLICATE_QUESTION.to_string()),
                other => other.into(),
            })?;
        info!("Question {} asked in lecture {}", question.id, question.lecture_id);

        self.bridge.question_committed(EventKind::QuestionCreated, &question).await;
        Ok(question)
    }

    /// Marks a question answered or unanswered. `answer` is stored verbatim when given.
    pub async fn set_status(
        &self,
        caller: &Caller,
        question_id: Uuid,
        status: QuestionStatus,
        answer: Option<String>,
    ) -> ServiceResult<Question> {
        let mut question = self.moderated(caller, question_id).await?;

        question.set_status(status, answer, self.clock.now());
        self.questions.save_question(&question).await?;
        info!("Question {} marked {}", question.id, status);

        self.bridge.question_committed(EventKind::QuestionAnswered, &question).await;
        Ok(question)
    }

    /// Answers a question on behalf of the socket path, which names the lecture
    /// it believes the question belongs to.
    pub async fn answer(
        &self,
        caller: &Caller,
        question_id: Uuid,
        lecture_id: Uuid,
        answer: String,
    ) -> ServiceResult<Question> {
        if answer.trim().is_empty() {
            return Err(ServiceError::Validation("answer must not be empty".to_string()));
        }
        let question = self.get(question_id).await?;
        if question.lecture_id != lecture_id {
            return Err(ServiceError::Validation(
                "Question does not belong to this lecture".to_string(),
            ));
        }
        self.set_status(caller, question_id, QuestionStatus::Answered, Some(answer))
            .await
    }

    /// Soft-removes a question. Its status is left untouched.
    pub async fn invalidate(&self, caller: &Caller, question_id: Uuid) -> ServiceResult<Question> {
        let mut question = self.moderated(caller, question_id).await?;

        question.is_valid = false;
        self.questions.save_question(&question).await?;
        info!("Question {} cleared", question.id);

        self.bridge.question_committed(EventKind::QuestionDeleted, &question).await;
        Ok(question)
    }

    /// Merges whitelisted fields into a question.
    pub async fn patch(
        &self,
        caller: &Caller,
        question_id: Uuid,
        patch: QuestionPatch,
    ) -> ServiceResult<Question> {
        if patch.is_empty() {
            return Err(ServiceError::Validation(
                "Provide at least one of: text, answer, is_important".to_string(),
            ));
        }
        if matches!(&patch.text, Some(text) if text.trim().is_empty()) {
            return Err(ServiceError::Validation("text must not be empty".to_string()));
        }

        let mut question = self.moderated(caller, question_id).await?;
        let kind = if patch.only_importance() {
            EventKind::QuestionStarred
        } else {
            EventKind::QuestionUpdated
        };

        if let Some(text) = patch.text {
            question.text = text;
        }
        if let Some(answer) = patch.answer {
            question.answer = Some(answer);
        }
        if let Some(is_important) = patch.is_important {
            question.is_important = is_important;
        }
        self.questions
            .save_question(&question)
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => ServiceError::Conflict(DUPLICATE_QUESTION.to_string()),
                other => other.into(),
            })?;
        info!("Question {} patched", question.id);

        self.bridge.question_committed(kind, &question).await;
        Ok(question)
    }

    pub async fn list(&self, _caller: &Caller, filter: &QuestionFilter) -> ServiceResult<Vec<Question>> {
        if filter.author_id.is_none() && filter.lecture_id.is_none() {
            return Err(ServiceError::Validation(
                "Provide at least author_id or lecture_id".to_string(),
            ));
        }
        Ok(self.questions.list_questions(filter).await?)
    }

    pub async fn get(&self, question_id: Uuid) -> ServiceResult<Question> {
        self.questions.get_question(question_id).await.map_err(|e| match e {
            PortError::NotFound(_) => ServiceError::NotFound("Question not found".to_string()),
            other => other.into(),
        })
    }

    /// A [`QuestionFeed`] answering with what `caller` would get from a default listing.
    pub fn feed_for(&self, caller: Caller) -> ServiceQuestionFeed {
        ServiceQuestionFeed {
            service: self.clone(),
            caller,
        }
    }

    async fn lecture(&self, lecture_id: Uuid) -> ServiceResult<Lecture> {
        self.lectures.get_lecture(lecture_id).await.map_err(|e| match e {
            PortError::NotFound(_) => ServiceError::NotFound("Lecture not found".to_string()),
            other => other.into(),
        })
    }

    /// Loads a question the caller is about to moderate, enforcing ownership of its lecture.
    async fn moderated(&self, caller: &Caller, question_id: Uuid) -> ServiceResult<Question> {
        require_role(caller, Role::Teacher)?;
        let question = self.get(question_id).await?;
        let lecture = self.lecture(question.lecture_id).await?;
        require_owner(caller, &lecture, "moderate questions of")?;
        Ok(question)
    }
}

pub struct ServiceQuestionFeed {
    service: QuestionService,
    caller: Caller,
}

#[async_trait]
impl QuestionFeed for ServiceQuestionFeed {
    async fn fetch_questions(&self, lecture_id: Uuid) -> PortResult<Vec<Question>> {
        self.service
            .list(&self.caller, &QuestionFilter::for_lecture(lecture_id))
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(msg) => PortError::NotFound(msg),
                ServiceError::Unauthenticated => PortError::Unauthorized,
                other => PortError::Unexpected(other.to_string()),
            })
    }
}
