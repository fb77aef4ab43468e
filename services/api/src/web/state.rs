//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::broadcaster::RoomRegistry;
use crate::config::Config;
use classroom_core::events::EventBridge;
use classroom_core::ports::{Clock, IdentityService, LectureRepository, QuestionRepository};
use classroom_core::{LectureService, QuestionService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Both ingress paths (REST handlers and WebSocket connections) mutate through
/// the same two services; neither ever publishes to a room directly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lectures: LectureService,
    pub questions: QuestionService,
    pub identity: Arc<dyn IdentityService>,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    /// Wires the services to their ports. The room registry doubles as the
    /// event publisher behind the services' event bridge.
    pub fn new(
        config: Arc<Config>,
        lecture_repo: Arc<dyn LectureRepository>,
        question_repo: Arc<dyn QuestionRepository>,
        identity: Arc<dyn IdentityService>,
        rooms: Arc<RoomRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bridge = EventBridge::new(rooms.clone());
        let lectures = LectureService::new(lecture_repo.clone(), bridge.clone(), clock.clone());
        let questions = QuestionService::new(question_repo, lecture_repo, bridge, clock);
        Self {
            config,
            lectures,
            questions,
            identity,
            rooms,
        }
    }
}
