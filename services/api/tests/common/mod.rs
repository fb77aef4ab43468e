#![allow(dead_code)]

use api_lib::adapters::{MemoryStore, RoomRegistry};
use api_lib::config::Config;
use api_lib::web::protocol::ServerMessage;
use api_lib::web::{self, AppState};
use axum::Router;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use classroom_core::ports::Clock;
use classroom_core::{Caller, Lecture, NewLecture, NewQuestion, Question};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// A clock that only moves when told to.
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// 2026-03-02 09:00 UTC, one hour before [`lecture_slot`].
pub fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// The default slot used by [`new_lecture`]: 2026-03-02 at 10:00.
pub fn lecture_slot() -> (NaiveDate, NaiveTime) {
    (
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    )
}

pub fn new_lecture(topic: &str) -> NewLecture {
    let (date, time) = lecture_slot();
    NewLecture {
        topic: topic.to_string(),
        subject: "Physics".to_string(),
        description: None,
        date,
        time,
        duration_minutes: 60,
    }
}

pub fn new_question(lecture_id: Uuid, text: &str) -> NewQuestion {
    NewQuestion {
        lecture_id,
        text: text.to_string(),
        is_important: false,
    }
}

/// Configuration for the in-memory backend with every other setting at its default.
pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "STORAGE_BACKEND" => Some("memory".to_string()),
        _ => None,
    })
    .expect("memory config should load")
}

/// A fully wired service over `MemoryStore`, with direct handles to the
/// pieces tests want to poke at.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub rooms: Arc<RoomRegistry>,
    pub clock: Arc<FixedClock>,
    pub teacher: Caller,
    pub student: Caller,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(RoomRegistry::new());
        let clock = Arc::new(FixedClock::at(morning()));
        let state = Arc::new(AppState::new(
            Arc::new(test_config()),
            store.clone(),
            store.clone(),
            store.clone(),
            rooms.clone(),
            clock.clone(),
        ));
        Self {
            state,
            store,
            rooms,
            clock,
            teacher: Caller::teacher(Uuid::new_v4()),
            student: Caller::student(Uuid::new_v4()),
        }
    }

    pub fn router(&self) -> Router {
        web::router(self.state.clone()).expect("router should build")
    }

    pub async fn token_for(&self, caller: Caller) -> String {
        self.store.issue_token(caller).await
    }

    /// Schedules a pending lecture owned by `self.teacher`.
    pub async fn schedule(&self, topic: &str) -> Lecture {
        self.state
            .lectures
            .create(&self.teacher, new_lecture(topic))
            .await
            .expect("lecture should be created")
    }

    /// Asks a question as `self.student`.
    pub async fn ask(&self, lecture_id: Uuid, text: &str) -> Question {
        self.state
            .questions
            .create(&self.student, new_question(lecture_id, text))
            .await
            .expect("question should be created")
    }

    /// Opens a registry connection already joined to `lecture_id`.
    pub fn listener(&self, lecture_id: Uuid) -> UnboundedReceiver<ServerMessage> {
        let (conn, rx) = self.rooms.connect();
        self.rooms.join(conn, lecture_id);
        rx
    }
}

/// Everything currently queued on a connection.
pub fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}
