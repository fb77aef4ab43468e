//! crates/classroom_core/src/lectures.rs
//!
//! The lecture store: scheduling, the status state machine, edits and deletion,
//! each guarded by ownership and by the lecture's start time.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{Caller, Lecture, LectureChanges, LectureStatus, NewLecture, Role};
use crate::error::{ServiceError, ServiceResult};
use crate::events::{EventBridge, EventKind};
use crate::policy::{require_owner, require_role};
use crate::ports::{Clock, LectureRepository, PortError};

const DUPLICATE_PENDING: &str = "A pending class for this topic, subject, and time already exists.";

#[derive(Clone)]
pub struct LectureService {
    lectures: Arc<dyn LectureRepository>,
    bridge: EventBridge,
    clock: Arc<dyn Clock>,
}

impl LectureService {
    pub fn new(lectures: Arc<dyn LectureRepository>, bridge: EventBridge, clock: Arc<dyn Clock>) -> Self {
        Self { lectures, bridge, clock }
    }

    /// Schedules a new lecture in `pending` status, owned by the calling teacher.
    pub async fn create(&self, caller: &Caller, new: NewLecture) -> ServiceResult<Lecture> {
        require_role(caller, Role::Teacher)?;
        require_text("topic", &new.topic)?;
        require_text("subject", &new.subject)?;
        require_duration(new.duration_minutes)?;

        let now = self.clock.now();
        let lecture = Lecture {
            id: Uuid::new_v4(),
            teacher_id: caller.user_id,
            topic: new.topic,
            subject: new.subject,
            description: new.description,
            date: new.date,
            time: new.time,
            duration_minutes: new.duration_minutes,
            status: LectureStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.lectures
            .insert_lecture(&lecture)
            .await
            .map_err(duplicate_pending)?;
        info!("Lecture {} scheduled by teacher {}", lecture.id, caller.user_id);

        self.bridge.lecture_committed(EventKind::SessionCreated, &lecture).await;
        Ok(lecture)
    }

    /// Moves the lecture along its state machine. Completing a lecture is what
    /// clients observe as "class ended".
    pub async fn change_status(
        &self,
        caller: &Caller,
        lecture_id: Uuid,
        target: LectureStatus,
    ) -> ServiceResult<Lecture> {
        let mut lecture = self.get(lecture_id).await?;
        require_owner(caller, &lecture, "update")?;

        if lecture.status.is_terminal() {
            return Err(ServiceError::InvalidTransition(format!(
                "Class is already {}, can't update.",
                lecture.status
            )));
        }
        let now = self.clock.now();
        if target == LectureStatus::Cancelled && lecture.has_started(now) {
            return Err(ServiceError::InvalidTransition(
                "Cannot cancel a class that has already started or passed.".to_string(),
            ));
        }
        if !lecture.status.can_transition_to(target) {
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot move a class from {} to {}.",
                lecture.status, target
            )));
        }

        let previous = lecture.status;
        lecture.status = target;
        lecture.updated_at = now;
        self.lectures
            .save_lecture(&lecture, previous)
            .await
            .map_err(|e| match e {
                PortError::Stale(_) => ServiceError::InvalidTransition(format!(
                    "Class is no longer {}, can't update.",
                    previous
                )),
                other => other.into(),
            })?;
        info!("Lecture {} moved from {} to {}", lecture.id, previous, target);

        self.bridge
            .lecture_committed(EventKind::SessionStatusChanged, &lecture)
            .await;
        Ok(lecture)
    }

    /// Applies edits to the descriptive fields of a pending lecture that has not started.
    pub async fn update(
        &self,
        caller: &Caller,
        lecture_id: Uuid,
        changes: LectureChanges,
    ) -> ServiceResult<Lecture> {
        let mut lecture = self.get(lecture_id).await?;
        require_owner(caller, &lecture, "edit")?;

        if lecture.status != LectureStatus::Pending {
            return Err(ServiceError::InvalidTransition(
                "Only pending classes can be edited.".to_string(),
            ));
        }
        let now = self.clock.now();
        if lecture.has_started(now) {
            return Err(ServiceError::InvalidTransition(
                "Cannot edit class that has started or passed.".to_string(),
            ));
        }
        if changes.is_empty() {
            return Err(ServiceError::Validation(
                "Provide at least one of: topic, subject, description, date, time, duration".to_string(),
            ));
        }

        if let Some(topic) = changes.topic {
            require_text("topic", &topic)?;
            lecture.topic = topic;
        }
        if let Some(subject) = changes.subject {
            require_text("subject", &subject)?;
            lecture.subject = subject;
        }
        if let Some(duration) = changes.duration_minutes {
            require_duration(duration)?;
            lecture.duration_minutes = duration;
        }
        if let Some(description) = changes.description {
            lecture.description = Some(description);
        }
        if let Some(date) = changes.date {
            lecture.date = date;
        }
        if let Some(time) = changes.time {
            lecture.time = time;
        }
        lecture.updated_at = now;

        self.lectures
            .save_lecture(&lecture, LectureStatus::Pending)
            .await
            .map_err(|e| match e {
                PortError::Stale(_) => {
                    ServiceError::InvalidTransition("Only pending classes can be edited.".to_string())
                }
                other => duplicate_pending(other),
            })?;
        info!("Lecture {} updated", lecture.id);

        self.bridge.lecture_committed(EventKind::SessionUpdated, &lecture).await;
        Ok(lecture)
    }

    /// Removes the lecture whatever its status. Returns the removed record.
    pub async fn delete(&self, caller: &Caller, lecture_id: Uuid) -> ServiceResult<Lecture> {
        let lecture = self.get(lecture_id).await?;
        require_owner(caller, &lecture, "delete")?;

        self.lectures.delete_lecture(lecture_id).await?;
        info!("Lecture {} deleted", lecture_id);

        self.bridge.lecture_committed(EventKind::SessionDeleted, &lecture).await;
        Ok(lecture)
    }

    /// Teachers only ever see their own lectures; students see everyone's,
    /// optionally narrowed to one teacher.
    pub async fn list(&self, caller: &Caller, teacher_id: Option<Uuid>) -> ServiceResult<Vec<Lecture>> {
        let scope = match caller.role {
            Role::Teacher => Some(caller.user_id),
            Role::Student => teacher_id,
        };
        Ok(self.lectures.list_lectures(scope).await?)
    }

    pub async fn get(&self, lecture_id: Uuid) -> ServiceResult<Lecture> {
        self.lectures.get_lecture(lecture_id).await.map_err(|e| match e {
            PortError::NotFound(_) => ServiceError::NotFound("Lecture not found".to_string()),
            other => other.into(),
        })
    }
}

fn duplicate_pending(err: PortError) -> ServiceError {
    match err {
        PortError::Conflict(_) => ServiceError::Conflict(DUPLICATE_PENDING.to_string()),
        other => other.into(),
    }
}

fn require_text(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        Err(ServiceError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

fn require_duration(minutes: u32) -> ServiceResult<()> {
    if minutes == 0 {
        Err(ServiceError::Validation("duration must be greater than zero".to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RoomEvent;
    use crate::ports::{EventPublisher, PortResult};
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
    use std::sync::Mutex;

    /// Hands control back to the scheduler between reading a lecture and
    /// writing it, so concurrent callers interleave at the worst point.
    struct YieldingRepo {
        lectures: Mutex<Vec<Lecture>>,
    }

    #[async_trait]
    impl LectureRepository for YieldingRepo {
        async fn insert_lecture(&self, lecture: &Lecture) -> PortResult<()> {
            self.lectures.lock().unwrap().push(lecture.clone());
            Ok(())
        }

        async fn get_lecture(&self, lecture_id: Uuid) -> PortResult<Lecture> {
            let found = self
                .lectures
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.id == lecture_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(lecture_id.to_string()));
            tokio::task::yield_now().await;
            found
        }

        async fn save_lecture(&self, lecture: &Lecture, expected: LectureStatus) -> PortResult<()> {
            let mut lectures = self.lectures.lock().unwrap();
            let slot = lectures
                .iter_mut()
                .find(|l| l.id == lecture.id)
                .ok_or_else(|| PortError::NotFound(lecture.id.to_string()))?;
            if slot.status != expected {
                return Err(PortError::Stale(slot.status.to_string()));
            }
            *slot = lecture.clone();
            Ok(())
        }

        async fn delete_lecture(&self, lecture_id: Uuid) -> PortResult<()> {
            self.lectures.lock().unwrap().retain(|l| l.id != lecture_id);
            Ok(())
        }

        async fn list_lectures(&self, _teacher_id: Option<Uuid>) -> PortResult<Vec<Lecture>> {
            Ok(self.lectures.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<RoomEvent>>);

    #[async_trait]
    impl EventPublisher for Recorder {
        async fn publish(&self, event: RoomEvent) -> PortResult<()> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct Fixed(DateTime<Utc>);

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn pending_lecture(teacher_id: Uuid) -> Lecture {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        Lecture {
            id: Uuid::new_v4(),
            teacher_id,
            topic: "Optics".into(),
            subject: "Physics".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 60,
            status: LectureStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    fn service(lecture: &Lecture) -> (LectureService, Arc<YieldingRepo>, Arc<Recorder>) {
        let repo = Arc::new(YieldingRepo {
            lectures: Mutex::new(vec![lecture.clone()]),
        });
        let recorder = Arc::new(Recorder::default());
        let service = LectureService::new(
            repo.clone(),
            EventBridge::new(recorder.clone()),
            Arc::new(Fixed(lecture.created_at)),
        );
        (service, repo, recorder)
    }

    #[tokio::test]
    async fn concurrent_terminal_moves_let_exactly_one_through() {
        let teacher = Caller::teacher(Uuid::new_v4());
        let lecture = pending_lecture(teacher.user_id);
        let (service, repo, recorder) = service(&lecture);

        let (completed, cancelled) = tokio::join!(
            service.change_status(&teacher, lecture.id, LectureStatus::Completed),
            service.change_status(&teacher, lecture.id, LectureStatus::Cancelled),
        );

        let winner = match (completed, cancelled) {
            (Ok(won), Err(ServiceError::InvalidTransition(_))) => won,
            (Err(ServiceError::InvalidTransition(_)), Ok(won)) => won,
            other => panic!("expected one winner, got {:?}", other),
        };
        let stored = repo.get_lecture(lecture.id).await.unwrap();
        assert_eq!(stored.status, winner.status);

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::SessionStatusChanged);
    }

    #[tokio::test]
    async fn edit_racing_a_status_change_is_refused() {
        let teacher = Caller::teacher(Uuid::new_v4());
        let lecture = pending_lecture(teacher.user_id);
        let (service, repo, recorder) = service(&lecture);

        let changes = LectureChanges {
            description: Some("Bring a prism".into()),
            ..LectureChanges::default()
        };
        let (live, edited) = tokio::join!(
            service.change_status(&teacher, lecture.id, LectureStatus::Live),
            service.update(&teacher, lecture.id, changes),
        );

        assert_eq!(live.unwrap().status, LectureStatus::Live);
        assert_eq!(
            edited.unwrap_err(),
            ServiceError::InvalidTransition("Only pending classes can be edited.".into())
        );
        let stored = repo.get_lecture(lecture.id).await.unwrap();
        assert_eq!(stored.status, LectureStatus::Live);
        assert_eq!(stored.description, None);
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }
}
