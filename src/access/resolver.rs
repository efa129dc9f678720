use std::sync::Arc;

use crate::domain::enrollment::EnrollmentProvisioner;
use crate::error::CommerceResult;
use crate::metrics::Metrics;
use crate::models::{Course, Viewer};

// ============================================================================
// Access Resolver
// ============================================================================
//
// The one place that decides whether a viewer sees a course's content in
// full or only its metadata. Rules, first match wins:
// 1. administrator
// 2. owning instructor
// 3. enrolled student
// 4. everyone else, including viewers without an identity, gets metadata only
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Admin,
    Owner,
    Enrolled,
    MetadataOnly,
}

impl AccessDecision {
    pub fn is_full(self) -> bool {
        !matches!(self, AccessDecision::MetadataOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessDecision::Admin => "admin",
            AccessDecision::Owner => "owner",
            AccessDecision::Enrolled => "enrolled",
            AccessDecision::MetadataOnly => "metadata_only",
        }
    }
}

pub struct AccessResolver {
    enrollments: Arc<EnrollmentProvisioner>,
    metrics: Arc<Metrics>,
}

impl AccessResolver {
    pub fn new(enrollments: Arc<EnrollmentProvisioner>, metrics: Arc<Metrics>) -> Self {
        Self { enrollments, metrics }
    }

    pub async fn resolve(&self, viewer: &Viewer, course: &Course) -> CommerceResult<AccessDecision> {
        let decision = match viewer.user_id {
            _ if viewer.is_admin() => AccessDecision::Admin,
            None => AccessDecision::MetadataOnly,
            Some(user_id) if user_id == course.instructor_id => AccessDecision::Owner,
            Some(user_id) => {
                if self.enrollments.is_enrolled(user_id, course.id).await? {
                    AccessDecision::Enrolled
                } else {
                    AccessDecision::MetadataOnly
                }
            }
        };

        self.metrics
            .access_decisions
            .with_label_values(&[decision.as_str()])
            .inc();
        tracing::debug!(
            course_id = %course.id,
            viewer = ?viewer.user_id,
            decision = decision.as_str(),
            "Access resolved"
        );

        Ok(decision)
    }

    pub async fn can_view_full_content(&self, viewer: &Viewer, course: &Course) -> CommerceResult<bool> {
        Ok(self.resolve(viewer, course).await?.is_full())
    }
}
