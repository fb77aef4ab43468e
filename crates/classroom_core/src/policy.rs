//! crates/classroom_core/src/policy.rs
//!
//! The authorization gate consulted by both stores before any state is touched.

use crate::domain::{Caller, Lecture, Role};
use crate::error::{ServiceError, ServiceResult};

pub fn require_role(caller: &Caller, role: Role) -> ServiceResult<()> {
    if caller.role == role {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Forbidden: Access allowed only for {}s",
            role.as_str()
        )))
    }
}

/// The caller must be the teacher who owns `lecture`.
pub fn require_owner(caller: &Caller, lecture: &Lecture, action: &str) -> ServiceResult<()> {
    require_role(caller, Role::Teacher)?;
    if lecture.teacher_id == caller.user_id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Not authorised to {} this class",
            action
        )))
    }
}
