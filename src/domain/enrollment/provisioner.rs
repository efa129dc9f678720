use std::sync::Arc;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{CommerceError, CommerceResult};
use crate::metrics::Metrics;
use crate::models::{CourseId, EnrollmentId, UserId, Viewer};
use crate::store::{CatalogStore, IdentityStore, Store, StoreError, UnitOfWork};
use super::value_objects::{Enrollment, Provisioned};

// ============================================================================
// Enrollment Provisioner
// ============================================================================
//
// Owns Enrollment rows and the cached per-course student counter. The
// counter is only ever bumped in the same unit of work as a newly created
// enrollment, so it can never drift from the rows.
//
// ============================================================================

pub struct EnrollmentProvisioner {
    store: Arc<dyn Store>,
    catalog: Arc<dyn CatalogStore>,
    identity: Arc<dyn IdentityStore>,
    metrics: Arc<Metrics>,
}

impl EnrollmentProvisioner {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<dyn CatalogStore>,
        identity: Arc<dyn IdentityStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            catalog,
            identity,
            metrics,
        }
    }

    /// Return the enrollment for (student, course), creating it if needed
    pub async fn ensure_enrolled(&self, student_id: UserId, course_id: CourseId) -> CommerceResult<Enrollment> {
        let mut uow = self.store.begin().await?;
        let provisioned = self.ensure_enrolled_in(uow.as_mut(), student_id, course_id).await?;
        uow.commit().await?;
        self.record_committed(&provisioned);

        Ok(provisioned.into_enrollment())
    }

    /// Same as `ensure_enrolled`, inside a unit of work owned by the caller.
    /// Nothing is visible until the caller commits, and the caller reports
    /// the outcome through `record_committed` once it has.
    pub async fn ensure_enrolled_in(
        &self,
        uow: &mut dyn UnitOfWork,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<Provisioned, StoreError> {
        if let Some(existing) = uow.find_enrollment(student_id, course_id).await? {
            tracing::debug!(
                student_id = %student_id,
                course_id = %course_id,
                enrollment_id = %existing.id,
                "Enrollment already exists"
            );
            return Ok(Provisioned::Existing(existing));
        }

        let provisioned = uow
            .insert_enrollment(&Enrollment::new(student_id, course_id, Utc::now()))
            .await?;

        match &provisioned {
            Provisioned::Created(enrollment) => {
                uow.increment_student_count(course_id).await?;
                tracing::debug!(
                    student_id = %student_id,
                    course_id = %course_id,
                    enrollment_id = %enrollment.id,
                    "Enrollment staged"
                );
            }
            Provisioned::Existing(enrollment) => {
                // Lost the race against a concurrent insert
                tracing::debug!(
                    enrollment_id = %enrollment.id,
                    "Enrollment insert conflicted, using existing row"
                );
            }
        }

        Ok(provisioned)
    }

    /// Count a provisioning outcome. Call only after the unit of work that
    /// produced it has committed.
    pub fn record_committed(&self, provisioned: &Provisioned) {
        let enrollment = provisioned.enrollment();
        if provisioned.was_created() {
            self.metrics.enrollments.with_label_values(&["created"]).inc();
            tracing::info!(
                student_id = %enrollment.student_id,
                course_id = %enrollment.course_id,
                enrollment_id = %enrollment.id,
                "Enrollment created"
            );
        } else {
            self.metrics.enrollments.with_label_values(&["existing"]).inc();
        }
    }

    pub async fn update_progress(&self, enrollment_id: EnrollmentId, progress: i32) -> CommerceResult<Enrollment> {
        let mut uow = self.store.begin().await?;
        let mut enrollment = uow
            .load_enrollment_for_update(enrollment_id)
            .await?
            .ok_or(CommerceError::EnrollmentNotFound(enrollment_id))?;

        let was_completed = enrollment.is_completed();
        enrollment.record_progress(progress, Utc::now());
        uow.save_enrollment_progress(&enrollment).await?;
        uow.commit().await?;

        tracing::info!(
            enrollment_id = %enrollment_id,
            requested = progress,
            progress = enrollment.progress,
            "Enrollment progress updated"
        );
        if !was_completed && enrollment.is_completed() {
            tracing::info!(enrollment_id = %enrollment_id, "Course completed");
        }

        Ok(enrollment)
    }

    pub async fn is_enrolled(&self, student_id: UserId, course_id: CourseId) -> CommerceResult<bool> {
        Ok(self.store.find_enrollment(student_id, course_id).await?.is_some())
    }

    /// Direct enrollment without an order. Only free courses, admins and the
    /// course's own instructor may take this path.
    pub async fn self_enroll(&self, viewer: &Viewer, course_id: CourseId) -> CommerceResult<Enrollment> {
        let user_id = viewer
            .user_id
            .ok_or_else(|| CommerceError::PermissionDenied("anonymous viewers cannot enroll".into()))?;

        let user = self
            .identity
            .get_user(user_id)
            .await?
            .ok_or(CommerceError::UserNotFound(user_id))?;
        let course = self
            .catalog
            .get_course(course_id)
            .await?
            .ok_or(CommerceError::CourseNotFound(course_id))?;

        let authorized = course.price == Decimal::ZERO
            || Viewer::from(&user).is_admin()
            || course.instructor_id == user.id;

        if !authorized {
            tracing::warn!(
                user_id = %user_id,
                course_id = %course_id,
                "Self-enrollment refused for paid course"
            );
            return Err(CommerceError::PermissionDenied(format!(
                "course {} requires a paid order",
                course_id
            )));
        }

        self.ensure_enrolled(user.id, course_id).await
    }

    pub async fn get_enrollment(&self, enrollment_id: EnrollmentId) -> CommerceResult<Enrollment> {
        self.store
            .get_enrollment(enrollment_id)
            .await?
            .ok_or(CommerceError::EnrollmentNotFound(enrollment_id))
    }

    pub async fn enrollments_for_student(&self, student_id: UserId) -> CommerceResult<Vec<Enrollment>> {
        Ok(self.store.enrollments_for_student(student_id).await?)
    }

    pub async fn enrollments_for_course(&self, course_id: CourseId) -> CommerceResult<Vec<Enrollment>> {
        Ok(self.store.enrollments_for_course(course_id).await?)
    }

    pub async fn student_count(&self, course_id: CourseId) -> CommerceResult<u64> {
        Ok(self.store.student_count(course_id).await?)
    }

    pub async fn total_enrollments(&self) -> CommerceResult<u64> {
        Ok(self.store.total_enrollments().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Course, Role, User};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: MemoryStore,
        provisioner: EnrollmentProvisioner,
        student: User,
        instructor: User,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let student = User { id: UserId::new(), display_name: "Student".into(), role: Role::Student };
        let instructor = User { id: UserId::new(), display_name: "Mentor".into(), role: Role::Instructor };
        store.add_user(student.clone()).await;
        store.add_user(instructor.clone()).await;

        let shared = Arc::new(store.clone());
        let provisioner = EnrollmentProvisioner::new(
            shared.clone(),
            shared.clone(),
            shared,
            Arc::new(Metrics::new().unwrap()),
        );

        Fixture { store, provisioner, student, instructor }
    }

    async fn course(fx: &Fixture, price: Decimal) -> CourseId {
        let course = Course {
            id: CourseId::new(),
            title: "Rust".into(),
            thumbnail: None,
            price,
            is_active: true,
            instructor_id: fx.instructor.id,
        };
        let id = course.id;
        fx.store.add_course(course).await;
        id
    }

    #[tokio::test]
    async fn test_ensure_enrolled_is_idempotent() {
        let fx = fixture().await;
        let course_id = course(&fx, dec!(10)).await;

        let first = fx.provisioner.ensure_enrolled(fx.student.id, course_id).await.unwrap();
        let second = fx.provisioner.ensure_enrolled(fx.student.id, course_id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.progress, 0);
        assert_eq!(fx.provisioner.enrollments_for_course(course_id).await.unwrap().len(), 1);
        assert_eq!(fx.provisioner.student_count(course_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_progress_clamps_and_completes_once() {
        let fx = fixture().await;
        let course_id = course(&fx, dec!(10)).await;
        let enrollment = fx.provisioner.ensure_enrolled(fx.student.id, course_id).await.unwrap();

        let done = fx.provisioner.update_progress(enrollment.id, 150).await.unwrap();
        assert_eq!(done.progress, 100);
        let completed_at = done.completed_at.expect("completion stamped");

        let later = fx.provisioner.update_progress(enrollment.id, 80).await.unwrap();
        assert_eq!(later.progress, 80);
        assert_eq!(later.completed_at, Some(completed_at));

        let stored = fx.provisioner.get_enrollment(enrollment.id).await.unwrap();
        assert_eq!(stored, later);
    }

    #[tokio::test]
    async fn test_update_progress_unknown_enrollment() {
        let fx = fixture().await;
        let result = fx.provisioner.update_progress(EnrollmentId::new(), 10).await;
        assert!(matches!(result, Err(CommerceError::EnrollmentNotFound(_))));
    }

    #[tokio::test]
    async fn test_self_enroll_free_course() {
        let fx = fixture().await;
        let course_id = course(&fx, Decimal::ZERO).await;

        let enrollment = fx
            .provisioner
            .self_enroll(&Viewer::from(&fx.student), course_id)
            .await
            .unwrap();

        assert_eq!(enrollment.course_id, course_id);
        assert!(fx.provisioner.is_enrolled(fx.student.id, course_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_enroll_paid_course_denied() {
        let fx = fixture().await;
        let course_id = course(&fx, dec!(20)).await;

        let result = fx.provisioner.self_enroll(&Viewer::from(&fx.student), course_id).await;

        assert!(matches!(result, Err(CommerceError::PermissionDenied(_))));
        assert!(!fx.provisioner.is_enrolled(fx.student.id, course_id).await.unwrap());
        assert_eq!(fx.provisioner.student_count(course_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_self_enroll_owner_of_paid_course() {
        let fx = fixture().await;
        let course_id = course(&fx, dec!(20)).await;

        let result = fx.provisioner.self_enroll(&Viewer::from(&fx.instructor), course_id).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_self_enroll_anonymous_denied() {
        let fx = fixture().await;
        let course_id = course(&fx, Decimal::ZERO).await;

        let result = fx.provisioner.self_enroll(&Viewer::anonymous(), course_id).await;
        assert!(matches!(result, Err(CommerceError::PermissionDenied(_))));
    }
}
