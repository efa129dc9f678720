use crate::domain::order::OrderError;
use crate::models::{ChapterId, ContentId, CourseId, EnrollmentId, OrderId, UserId};
use crate::store::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Crate Error Taxonomy
// ============================================================================
//
// Every core operation returns CommerceError. Callers branch on `kind()` to
// choose a response and on `is_retryable()` to decide whether the same call
// may be repeated safely.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    InvalidTransition,
    PermissionDenied,
    DependencyUnavailable,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CommerceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Course not found: {0}")]
    CourseNotFound(CourseId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Enrollment not found: {0}")]
    EnrollmentNotFound(EnrollmentId),

    #[error("Chapter not found: {0}")]
    ChapterNotFound(ChapterId),

    #[error("Content not found: {0}")]
    ContentNotFound(ContentId),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{dependency} unavailable: {reason}")]
    DependencyUnavailable {
        dependency: &'static str,
        reason: String,
    },

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("Corrupt order history: {0}")]
    CorruptHistory(String),
}

impl CommerceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommerceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            CommerceError::UserNotFound(_)
            | CommerceError::CourseNotFound(_)
            | CommerceError::OrderNotFound(_)
            | CommerceError::EnrollmentNotFound(_)
            | CommerceError::ChapterNotFound(_)
            | CommerceError::ContentNotFound(_) => ErrorKind::NotFound,
            CommerceError::Order(e) => match e {
                OrderError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
                OrderError::EmptyItems | OrderError::InvalidPrice(_) => ErrorKind::InvalidRequest,
                _ => ErrorKind::Internal,
            },
            CommerceError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CommerceError::DependencyUnavailable { .. } => ErrorKind::DependencyUnavailable,
            CommerceError::Storage(_) | CommerceError::CorruptHistory(_) => ErrorKind::Internal,
        }
    }

    /// Nothing was persisted and repeating the call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CommerceError::DependencyUnavailable { .. } | CommerceError::Storage(_)
        )
    }

    pub fn dependency(dependency: &'static str, reason: impl Into<String>) -> Self {
        CommerceError::DependencyUnavailable {
            dependency,
            reason: reason.into(),
        }
    }
}

/// Only an order-number collision is cured by trying again
impl IsTransient for CommerceError {
    fn is_transient(&self) -> bool {
        matches!(self, CommerceError::Storage(e) if e.is_transient())
    }
}

pub type CommerceResult<T> = Result<T, CommerceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;

    #[test]
    fn test_kinds() {
        assert_eq!(CommerceError::UserNotFound(UserId::new()).kind(), ErrorKind::NotFound);
        assert_eq!(
            CommerceError::from(OrderError::InvalidTransition {
                from: OrderStatus::Paid,
                to: OrderStatus::Cancelled,
            })
            .kind(),
            ErrorKind::InvalidTransition
        );
        assert_eq!(CommerceError::from(OrderError::EmptyItems).kind(), ErrorKind::InvalidRequest);
        assert_eq!(
            CommerceError::PermissionDenied("not owner".into()).kind(),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn test_retryable() {
        assert!(CommerceError::dependency("catalog", "timed out").is_retryable());
        assert!(CommerceError::Storage(StoreError::Backend("down".into())).is_retryable());
        assert!(!CommerceError::InvalidRequest("empty".into()).is_retryable());
        assert!(!CommerceError::OrderNotFound(OrderId::new()).is_retryable());
    }
}
