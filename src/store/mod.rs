use async_trait::async_trait;

use crate::domain::core::EventEnvelope;
use crate::domain::enrollment::{Enrollment, Provisioned};
use crate::domain::order::{Order, OrderEvent, OrderStatus};
use crate::models::{
    Chapter, ChapterId, Content, ContentId, Course, CourseId, EnrollmentId, OrderId, User, UserId,
};
use crate::utils::IsTransient;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ============================================================================
// Persistence Boundary
// ============================================================================
//
// `Store` answers read queries and opens units of work. Every multi-row
// write of the core goes through one `UnitOfWork`: it either commits as a
// whole or, when dropped without `commit`, leaves no trace.
//
// Catalog, identity and content are external collaborators and are only
// ever read.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The row changed underneath a guarded update
    #[error("Concurrent modification: {0}")]
    Concurrency(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// An order row together with the number of events recorded for it
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub order: Order,
    pub version: i64,
}

#[async_trait]
pub trait UnitOfWork: Send {
    /// Insert the order row and all of its items. Fails with `Conflict` when
    /// the order number is already taken.
    async fn insert_order(&mut self, order: &Order, version: i64) -> Result<(), StoreError>;

    /// Load an order and lock it for the rest of this unit
    async fn load_order_for_update(&mut self, id: OrderId) -> Result<Option<OrderRecord>, StoreError>;

    /// Write the new status only if the row is still in `expected`
    async fn update_order_status(
        &mut self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        version: i64,
    ) -> Result<(), StoreError>;

    async fn append_order_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> Result<(), StoreError>;

    async fn find_enrollment(
        &mut self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StoreError>;

    /// Insert guarded by the (student, course) uniqueness constraint. A
    /// conflicting insert returns the row that won.
    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<Provisioned, StoreError>;

    async fn increment_student_count(&mut self, course_id: CourseId) -> Result<(), StoreError>;

    async fn load_enrollment_for_update(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError>;

    async fn save_enrollment_progress(&mut self, enrollment: &Enrollment) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError>;

    async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError>;

    /// Newest first
    async fn all_orders(&self) -> Result<Vec<Order>, StoreError>;

    async fn order_events(&self, id: OrderId) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError>;

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError>;

    async fn find_enrollment(
        &self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StoreError>;

    async fn enrollments_for_student(&self, student_id: UserId) -> Result<Vec<Enrollment>, StoreError>;

    async fn enrollments_for_course(&self, course_id: CourseId) -> Result<Vec<Enrollment>, StoreError>;

    async fn student_count(&self, course_id: CourseId) -> Result<u64, StoreError>;

    /// Enrollment rows across all courses
    async fn total_enrollments(&self) -> Result<u64, StoreError>;
}

// ============================================================================
// External Collaborators (read-only)
// ============================================================================

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StoreError>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn chapters_for_course(&self, course_id: CourseId) -> Result<Vec<Chapter>, StoreError>;

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError>;

    async fn contents_for_chapter(&self, chapter_id: ChapterId) -> Result<Vec<Content>, StoreError>;

    async fn get_content(&self, id: ContentId) -> Result<Option<Content>, StoreError>;
}
