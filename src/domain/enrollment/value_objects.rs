use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::{CourseId, EnrollmentId, UserId};

// ============================================================================
// Enrollment Value Objects
// ============================================================================

pub const MAX_PROGRESS: u8 = 100;

/// Grants a student access to a course. At most one per (student, course).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: UserId,
    pub course_id: CourseId,
    pub progress: u8,
    pub completed_at: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(student_id: UserId, course_id: CourseId, enrolled_at: DateTime<Utc>) -> Self {
        Self {
            id: EnrollmentId::new(),
            student_id,
            course_id,
            progress: 0,
            completed_at: None,
            enrolled_at,
        }
    }

    /// Clamp into [0, 100]. Completion is stamped the first time progress
    /// reaches 100 and is never cleared afterwards.
    pub fn record_progress(&mut self, progress: i32, now: DateTime<Utc>) {
        self.progress = progress.clamp(0, MAX_PROGRESS as i32) as u8;

        if self.progress == MAX_PROGRESS && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Outcome of an insert guarded by the (student, course) uniqueness rule
#[derive(Debug, Clone, PartialEq)]
pub enum Provisioned {
    Created(Enrollment),
    Existing(Enrollment),
}

impl Provisioned {
    pub fn enrollment(&self) -> &Enrollment {
        match self {
            Provisioned::Created(e) | Provisioned::Existing(e) => e,
        }
    }

    pub fn into_enrollment(self) -> Enrollment {
        match self {
            Provisioned::Created(e) | Provisioned::Existing(e) => e,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Provisioned::Created(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn enrollment() -> Enrollment {
        Enrollment::new(UserId::new(), CourseId::new(), Utc::now())
    }

    #[test]
    fn test_new_enrollment_starts_at_zero() {
        let e = enrollment();
        assert_eq!(e.progress, 0);
        assert!(!e.is_completed());
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut e = enrollment();
        e.record_progress(-20, Utc::now());
        assert_eq!(e.progress, 0);

        e.record_progress(150, Utc::now());
        assert_eq!(e.progress, 100);
    }

    #[test]
    fn test_completion_is_write_once() {
        let mut e = enrollment();
        let first = Utc::now();
        e.record_progress(100, first);
        assert_eq!(e.completed_at, Some(first));

        e.record_progress(80, first + Duration::minutes(5));
        assert_eq!(e.progress, 80);
        assert_eq!(e.completed_at, Some(first));

        e.record_progress(100, first + Duration::minutes(10));
        assert_eq!(e.completed_at, Some(first));
    }
}
