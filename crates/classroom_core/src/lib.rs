pub mod domain;
pub mod error;
pub mod events;
pub mod lectures;
pub mod live_view;
pub mod policy;
pub mod ports;
pub mod questions;

pub use domain::{
    Caller, Lecture, LectureChanges, LectureStatus, NewLecture, NewQuestion, Question,
    QuestionFilter, QuestionPatch, QuestionStatus, Role,
};
pub use error::{ServiceError, ServiceResult};
pub use events::{EventBridge, EventEntity, EventKind, RoomEvent};
pub use lectures::LectureService;
pub use live_view::{ApplyOutcome, ConnectionEvent, LiveQuestionView};
pub use ports::{
    Clock, EventPublisher, IdentityService, LectureRepository, PortError, PortResult,
    QuestionFeed, QuestionRepository, SystemClock,
};
pub use questions::QuestionService;
