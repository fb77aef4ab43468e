//! services/api/src/adapters/memory.rs
//!
//! A process-local implementation of every persistence port. It backs the
//! `memory` storage backend and the test suites, and follows the same
//! conflict rules as the PostgreSQL adapter.

use async_trait::async_trait;
use classroom_core::domain::{Caller, Lecture, LectureStatus, Question, QuestionFilter};
use classroom_core::ports::{
    IdentityService, LectureRepository, PortError, PortResult, QuestionRepository,
};
use regex::RegexBuilder;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory document store. Records are kept in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    lectures: RwLock<Vec<Lecture>>,
    questions: RwLock<Vec<Question>>,
    tokens: RwLock<HashMap<String, Caller>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an opaque token for `caller`, standing in for the external
    /// authentication service.
    pub async fn issue_token(&self, caller: Caller) -> String {
        let token = Uuid::new_v4().to_string();
        self.register_token(token.clone(), caller).await;
        token
    }

    /// Registers a caller-chosen token, e.g. one seeded from configuration.
    pub async fn register_token(&self, token: String, caller: Caller) {
        self.tokens.write().await.insert(token, caller);
    }

    pub async fn revoke_token(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }
}

/// Newest first; records sharing a timestamp keep reverse insertion order.
fn newest_first<T: Clone>(records: &[T], created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) -> Vec<T> {
    let mut out: Vec<T> = records.iter().rev().cloned().collect();
    out.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    out
}

fn clashes_with_pending(existing: &[Lecture], lecture: &Lecture) -> bool {
    lecture.status == LectureStatus::Pending
        && existing.iter().any(|other| {
            other.id != lecture.id && other.status == LectureStatus::Pending && other.same_slot(lecture)
        })
}

//=========================================================================================
// `LectureRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl LectureRepository for MemoryStore {
    async fn insert_lecture(&self, lecture: &Lecture) -> PortResult<()> {
        let mut lectures = self.lectures.write().await;
        if clashes_with_pending(&lectures, lecture) {
            return Err(PortError::Conflict(format!(
                "pending lecture already scheduled for {} {}",
                lecture.date, lecture.time
            )));
        }
        lectures.push(lecture.clone());
        Ok(())
    }

    async fn get_lecture(&self, lecture_id: Uuid) -> PortResult<Lecture> {
        self.lectures
            .read()
            .await
            .iter()
            .find(|l| l.id == lecture_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Lecture {} not found", lecture_id)))
    }

    async fn save_lecture(&self, lecture: &Lecture, expected: LectureStatus) -> PortResult<()> {
        let mut lectures = self.lectures.write().await;
        let stored = lectures
            .iter()
            .position(|l| l.id == lecture.id)
            .ok_or_else(|| PortError::NotFound(format!("Lecture {} not found", lecture.id)))?;
        if lectures[stored].status != expected {
            return Err(PortError::Stale(format!(
                "lecture {} is {}, expected {}",
                lecture.id, lectures[stored].status, expected
            )));
        }
        if clashes_with_pending(&lectures, lecture) {
            return Err(PortError::Conflict(format!(
                "pending lecture already scheduled for {} {}",
                lecture.date, lecture.time
            )));
        }
        lectures[stored] = lecture.clone();
        Ok(())
    }

    async fn delete_lecture(&self, lecture_id: Uuid) -> PortResult<()> {
        let mut lectures = self.lectures.write().await;
        let before = lectures.len();
        lectures.retain(|l| l.id != lecture_id);
        if lectures.len() == before {
            return Err(PortError::NotFound(format!("Lecture {} not found", lecture_id)));
        }
        Ok(())
    }

    async fn list_lectures(&self, teacher_id: Option<Uuid>) -> PortResult<Vec<Lecture>> {
        let lectures = self.lectures.read().await;
        let mut out = newest_first(&lectures, |l| l.created_at);
        if let Some(teacher_id) = teacher_id {
            out.retain(|l| l.teacher_id == teacher_id);
        }
        Ok(out)
    }
}

//=========================================================================================
// `QuestionRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuestionRepository for MemoryStore {
    async fn insert_question(&self, question: &Question, text_pattern: &str) -> PortResult<()> {
        let matcher = RegexBuilder::new(text_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut questions = self.questions.write().await;
        let duplicate = questions
            .iter()
            .any(|q| q.lecture_id == question.lecture_id && matcher.is_match(&q.text));
        if duplicate {
            return Err(PortError::Conflict(format!(
                "question text already asked in lecture {}",
                question.lecture_id
            )));
        }
        questions.push(question.clone());
        Ok(())
    }

    async fn get_question(&self, question_id: Uuid) -> PortResult<Question> {
        self.questions
            .read()
            .await
            .iter()
            .find(|q| q.id == question_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Question {} not found", question_id)))
    }

    async fn save_question(&self, question: &Question) -> PortResult<()> {
        let mut questions = self.questions.write().await;
        let lowered = question.text.to_lowercase();
        let duplicate = questions.iter().any(|q| {
            q.id != question.id && q.lecture_id == question.lecture_id && q.text.to_lowercase() == lowered
        });
        if duplicate {
            return Err(PortError::Conflict(format!(
                "question text already asked in lecture {}",
                question.lecture_id
            )));
        }
        let slot = questions
            .iter_mut()
            .find(|q| q.id == question.id)
            .ok_or_else(|| PortError::NotFound(format!("Question {} not found", question.id)))?;
        *slot = question.clone();
        Ok(())
    }

    async fn list_questions(&self, filter: &QuestionFilter) -> PortResult<Vec<Question>> {
        let questions = self.questions.read().await;
        let mut out = newest_first(&questions, |q| q.created_at);
        out.retain(|q| filter.matches(q));
        Ok(out)
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for MemoryStore {
    async fn resolve_token(&self, token: &str) -> PortResult<Caller> {
        self.tokens
            .read()
            .await
            .get(token)
            .copied()
            .ok_or(PortError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    fn lecture(status: LectureStatus) -> Lecture {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        Lecture {
            id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            topic: "Optics".into(),
            subject: "Physics".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 60,
            status,
            created_at: at,
            updated_at: at,
        }
    }

    fn question(lecture_id: Uuid, text: &str) -> Question {
        Question {
            id: Uuid::new_v4(),
            lecture_id,
            author_id: Uuid::new_v4(),
            text: text.into(),
            answer: None,
            status: classroom_core::domain::QuestionStatus::Unanswered,
            answered_at: None,
            is_important: false,
            is_valid: true,
            created_at: Utc.with_ymd_and_hms(2026, 3, 2, 10, 5, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn save_lecture_refuses_a_moved_record() {
        let store = MemoryStore::new();
        let original = lecture(LectureStatus::Pending);
        store.insert_lecture(&original).await.unwrap();

        let mut completed = original.clone();
        completed.status = LectureStatus::Completed;
        store.save_lecture(&completed, LectureStatus::Pending).await.unwrap();

        let mut cancelled = original.clone();
        cancelled.status = LectureStatus::Cancelled;
        let err = store
            .save_lecture(&cancelled, LectureStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Stale(_)));
        assert_eq!(
            store.get_lecture(original.id).await.unwrap().status,
            LectureStatus::Completed
        );

        let missing = lecture(LectureStatus::Pending);
        let err = store
            .save_lecture(&missing, LectureStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
    }

    #[tokio::test]
    async fn save_question_keeps_text_unique_per_lecture() {
        let store = MemoryStore::new();
        let lecture_id = Uuid::new_v4();
        let first = question(lecture_id, "What is a photon?");
        let mut second = question(lecture_id, "What is a lens?");
        store.insert_question(&first, "^x$").await.unwrap();
        store.insert_question(&second, "^x$").await.unwrap();

        second.text = "WHAT IS A PHOTON?".into();
        let err = store.save_question(&second).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));

        // Re-saving a question under its own text is not a clash.
        let mut starred = first.clone();
        starred.is_important = true;
        store.save_question(&starred).await.unwrap();

        let mut elsewhere = question(Uuid::new_v4(), "What is a lens?");
        store.insert_question(&elsewhere, "^x$").await.unwrap();
        elsewhere.text = "What is a photon?".into();
        store.save_question(&elsewhere).await.unwrap();
    }

    #[tokio::test]
    async fn registered_tokens_resolve_until_revoked() {
        let store = MemoryStore::new();
        let caller = Caller::teacher(Uuid::new_v4());
        store.register_token("demo-teacher".into(), caller).await;

        assert_eq!(store.resolve_token("demo-teacher").await.unwrap(), caller);
        store.revoke_token("demo-teacher").await;
        assert!(matches!(
            store.resolve_token("demo-teacher").await,
            Err(PortError::Unauthorized)
        ));
    }
}
