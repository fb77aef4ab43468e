//! crates/classroom_core/src/live_view.rs
//!
//! The client-side cache of one lecture's questions. Room events are merged
//! into it as they arrive; after a reconnect the cache is rebuilt from a full
//! fetch, which is the only way missed events are recovered.

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{LectureStatus, Question};
use crate::events::{EventKind, RoomEvent};
use crate::ports::{PortResult, QuestionFeed};

/// Transport-level connection changes observed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Reconnected,
}

/// What applying a room event did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Merged,
    Removed,
    /// Duplicate insert, unknown id, or an event for another lecture.
    Ignored,
    /// The lecture ended; the view is now frozen.
    Ended,
    /// The view was already frozen.
    Frozen,
}

#[derive(Debug, Clone)]
pub struct LiveQuestionView {
    lecture_id: Uuid,
    /// Newest first.
    questions: Vec<Question>,
    lecture_status: Option<LectureStatus>,
    ended: bool,
    connected: bool,
}

impl LiveQuestionView {
    pub fn new(lecture_id: Uuid) -> Self {
        Self {
            lecture_id,
            questions: Vec::new(),
            lecture_status: None,
            ended: false,
            connected: false,
        }
    }

    pub fn lecture_id(&self) -> Uuid {
        self.lecture_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Whether the lecture has ended and local mutation is frozen.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn lecture_status(&self) -> Option<LectureStatus> {
        self.lecture_status
    }

    /// Merges one room event into the cache.
    pub fn apply(&mut self, event: &RoomEvent) -> ApplyOutcome {
        if event.lecture_id != self.lecture_id {
            return ApplyOutcome::Ignored;
        }
        if self.ended {
            return ApplyOutcome::Frozen;
        }

        if let Some(lecture) = event.as_lecture() {
            return match event.kind {
                EventKind::SessionDeleted => self.end(None),
                _ if lecture.status.is_terminal() => self.end(Some(lecture.status)),
                _ => {
                    self.lecture_status = Some(lecture.status);
                    ApplyOutcome::Merged
                }
            };
        }

        let Some(incoming) = event.as_question() else {
            return ApplyOutcome::Ignored;
        };
        match event.kind {
            EventKind::QuestionCreated => self.insert(incoming),
            EventKind::QuestionDeleted => self.remove(incoming.id),
            EventKind::QuestionUpdated if !incoming.is_valid => self.remove(incoming.id),
            kind => self.merge(kind, incoming),
        }
    }

    /// Replaces the whole cache with an authoritative listing.
    pub fn replace_all(&mut self, mut questions: Vec<Question>) {
        questions.retain(|q| q.lecture_id == self.lecture_id && q.is_valid);
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.questions = questions;
    }

    /// Fetches the full question list and swaps it in, discarding whatever
    /// the cache held before.
    pub async fn resync(&mut self, feed: &dyn QuestionFeed) -> PortResult<()> {
        let fresh = feed.fetch_questions(self.lecture_id).await?;
        info!(
            "Resynced lecture {} with {} questions",
            self.lecture_id,
            fresh.len()
        );
        self.replace_all(fresh);
        Ok(())
    }

    /// Tracks the transport state. Connecting for the first time and
    /// reconnecting both trigger a resync, unless the view has ended: a frozen
    /// view keeps the list it had when the lecture completed.
    pub async fn on_connection(&mut self, event: ConnectionEvent, feed: &dyn QuestionFeed) -> PortResult<()> {
        match event {
            ConnectionEvent::Disconnected => {
                debug!("Lecture {} view disconnected", self.lecture_id);
                self.connected = false;
                Ok(())
            }
            ConnectionEvent::Connected | ConnectionEvent::Reconnected => {
                self.connected = true;
                if self.ended {
                    debug!("Lecture {} view has ended, skipping resync", self.lecture_id);
                    return Ok(());
                }
                self.resync(feed).await
            }
        }
    }

    fn insert(&mut self, incoming: &Question) -> ApplyOutcome {
        if !incoming.is_valid || self.get(incoming.id).is_some() {
            return ApplyOutcome::Ignored;
        }
        self.questions.insert(0, incoming.clone());
        ApplyOutcome::Inserted
    }

    fn remove(&mut self, question_id: Uuid) -> ApplyOutcome {
        let before = self.questions.len();
        self.questions.retain(|q| q.id != question_id);
        if self.questions.len() < before {
            ApplyOutcome::Removed
        } else {
            ApplyOutcome::Ignored
        }
    }

    fn merge(&mut self, kind: EventKind, incoming: &Question) -> ApplyOutcome {
        let Some(existing) = self.questions.iter_mut().find(|q| q.id == incoming.id) else {
            return ApplyOutcome::Ignored;
        };
        match kind {
            EventKind::QuestionAnswered => {
                existing.status = incoming.status;
                existing.answer = incoming.answer.clone();
                existing.answered_at = incoming.answered_at;
            }
            EventKind::QuestionStarred => {
                existing.is_important = incoming.is_important;
            }
            _ => *existing = incoming.clone(),
        }
        ApplyOutcome::Merged
    }

    fn end(&mut self, status: Option<LectureStatus>) -> ApplyOutcome {
        info!("Lecture {} ended, freezing live view", self.lecture_id);
        self.lecture_status = status;
        self.ended = true;
        ApplyOutcome::Ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Lecture, QuestionStatus};
    use crate::ports::PortError;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
    use std::sync::Mutex;

    fn question(lecture_id: Uuid, text: &str, minute: i64) -> Question {
        Question {
            id: Uuid::new_v4(),
            lecture_id,
            author_id: Uuid::new_v4(),
            text: text.to_string(),
            answer: None,
            status: QuestionStatus::Unanswered,
            answered_at: None,
            is_important: false,
            is_valid: true,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap() + Duration::minutes(minute),
        }
    }

    fn lecture(id: Uuid, status: LectureStatus) -> Lecture {
        let now = Utc::now();
        Lecture {
            id,
            teacher_id: Uuid::new_v4(),
            topic: "Recursion".into(),
            subject: "CS101".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 45,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    struct StaticFeed(Mutex<Vec<Question>>);

    #[async_trait]
    impl QuestionFeed for StaticFeed {
        async fn fetch_questions(&self, lecture_id: Uuid) -> PortResult<Vec<Question>> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .filter(|q| q.lecture_id == lecture_id && q.is_valid)
                .cloned()
                .collect())
        }
    }

    struct BrokenFeed;

    #[async_trait]
    impl QuestionFeed for BrokenFeed {
        async fn fetch_questions(&self, _lecture_id: Uuid) -> PortResult<Vec<Question>> {
            Err(PortError::Unexpected("connection refused".into()))
        }
    }

    #[test]
    fn created_is_prepended_and_idempotent() {
        let lecture_id = Uuid::new_v4();
        let mut view = LiveQuestionView::new(lecture_id);
        let first = question(lecture_id, "What is recursion?", 0);
        let second = question(lecture_id, "What is a base case?", 1);

        let created = RoomEvent::question(EventKind::QuestionCreated, &first);
        assert_eq!(view.apply(&created), ApplyOutcome::Inserted);
        assert_eq!(view.apply(&created), ApplyOutcome::Ignored);
        assert_eq!(
            view.apply(&RoomEvent::question(EventKind::QuestionCreated, &second)),
            ApplyOutcome::Inserted
        );

        let ids: Vec<Uuid> = view.questions().iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn answered_and_starred_merge_only_their_fields() {
        let lecture_id = Uuid::new_v4();
        let mut view = LiveQuestionView::new(lecture_id);
        let original = question(lecture_id, "What is recursion?", 0);
        view.apply(&RoomEvent::question(EventKind::QuestionCreated, &original));

        let mut answered = original.clone();
        answered.set_status(
            QuestionStatus::Answered,
            Some("A function calling itself".into()),
            Utc::now(),
        );
        answered.text = "server-side text that answered events do not carry over".into();
        assert_eq!(
            view.apply(&RoomEvent::question(EventKind::QuestionAnswered, &answered)),
            ApplyOutcome::Merged
        );
        let cached = view.get(original.id).unwrap();
        assert_eq!(cached.status, QuestionStatus::Answered);
        assert!(cached.answered_at.is_some());
        assert_eq!(cached.text, "What is recursion?");

        let mut starred = original.clone();
        starred.is_important = true;
        view.apply(&RoomEvent::question(EventKind::QuestionStarred, &starred));
        let cached = view.get(original.id).unwrap();
        assert!(cached.is_important);
        assert_eq!(cached.status, QuestionStatus::Answered);
    }

    #[test]
    fn merge_for_unknown_id_is_a_no_op() {
        let lecture_id = Uuid::new_v4();
        let mut view = LiveQuestionView::new(lecture_id);
        let stray = question(lecture_id, "Never seen", 0);
        assert_eq!(
            view.apply(&RoomEvent::question(EventKind::QuestionUpdated, &stray)),
            ApplyOutcome::Ignored
        );
        assert!(view.is_empty());
    }

    #[test]
    fn deleted_and_invalidated_updates_remove_the_item() {
        let lecture_id = Uuid::new_v4();
        let mut view = LiveQuestionView::new(lecture_id);
        let a = question(lecture_id, "a", 0);
        let b = question(lecture_id, "b", 1);
        view.replace_all(vec![a.clone(), b.clone()]);

        assert_eq!(
            view.apply(&RoomEvent::question(EventKind::QuestionDeleted, &a)),
            ApplyOutcome::Removed
        );
        let mut hidden = b.clone();
        hidden.is_valid = false;
        assert_eq!(
            view.apply(&RoomEvent::question(EventKind::QuestionUpdated, &hidden)),
            ApplyOutcome::Removed
        );
        assert!(view.is_empty());
    }

    #[test]
    fn events_for_other_lectures_are_ignored() {
        let mut view = LiveQuestionView::new(Uuid::new_v4());
        let elsewhere = question(Uuid::new_v4(), "elsewhere", 0);
        assert_eq!(
            view.apply(&RoomEvent::question(EventKind::QuestionCreated, &elsewhere)),
            ApplyOutcome::Ignored
        );
    }

    #[test]
    fn completion_freezes_the_view() {
        let lecture_id = Uuid::new_v4();
        let mut view = LiveQuestionView::new(lecture_id);

        let live = lecture(lecture_id, LectureStatus::Live);
        assert_eq!(
            view.apply(&RoomEvent::lecture(EventKind::SessionStatusChanged, &live)),
            ApplyOutcome::Merged
        );
        assert_eq!(view.lecture_status(), Some(LectureStatus::Live));

        let done = lecture(lecture_id, LectureStatus::Completed);
        assert_eq!(
            view.apply(&RoomEvent::lecture(EventKind::SessionStatusChanged, &done)),
            ApplyOutcome::Ended
        );
        assert!(view.is_ended());

        let late = question(lecture_id, "too late", 5);
        assert_eq!(
            view.apply(&RoomEvent::question(EventKind::QuestionCreated, &late)),
            ApplyOutcome::Frozen
        );
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn reconnect_replaces_cache_with_fresh_fetch() {
        let lecture_id = Uuid::new_v4();
        let kept = question(lecture_id, "kept", 0);
        let missed = question(lecture_id, "missed while offline", 2);
        let stale = question(lecture_id, "invalidated while offline", 1);

        let mut view = LiveQuestionView::new(lecture_id);
        view.replace_all(vec![kept.clone(), stale.clone()]);
        let feed = StaticFeed(Mutex::new(vec![kept.clone(), missed.clone()]));

        view.on_connection(ConnectionEvent::Disconnected, &feed).await.unwrap();
        assert!(!view.is_connected());
        view.on_connection(ConnectionEvent::Reconnected, &feed).await.unwrap();
        assert!(view.is_connected());

        let ids: Vec<Uuid> = view.questions().iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![missed.id, kept.id]);
    }

    #[tokio::test]
    async fn ended_view_ignores_reconnect_resync() {
        let lecture_id = Uuid::new_v4();
        let before = question(lecture_id, "before the bell", 0);
        let mut view = LiveQuestionView::new(lecture_id);
        view.replace_all(vec![before.clone()]);
        let done = lecture(lecture_id, LectureStatus::Completed);
        assert_eq!(
            view.apply(&RoomEvent::lecture(EventKind::SessionStatusChanged, &done)),
            ApplyOutcome::Ended
        );

        let after = question(lecture_id, "after the bell", 5);
        let feed = StaticFeed(Mutex::new(vec![after, before.clone()]));
        view.on_connection(ConnectionEvent::Disconnected, &feed).await.unwrap();
        view.on_connection(ConnectionEvent::Reconnected, &feed).await.unwrap();

        assert!(view.is_connected());
        assert!(view.is_ended());
        assert_eq!(view.questions(), &[before][..]);
    }

    #[tokio::test]
    async fn failed_resync_leaves_cache_untouched() {
        let lecture_id = Uuid::new_v4();
        let kept = question(lecture_id, "kept", 0);
        let mut view = LiveQuestionView::new(lecture_id);
        view.replace_all(vec![kept.clone()]);

        assert!(view.on_connection(ConnectionEvent::Reconnected, &BrokenFeed).await.is_err());
        assert_eq!(view.len(), 1);
    }
}
