use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::domain::core::EventEnvelope;
use crate::domain::enrollment::{Enrollment, Provisioned};
use crate::domain::order::{Order, OrderEvent, OrderNumber, OrderStatus};
use crate::models::{
    Chapter, ChapterId, Content, ContentId, Course, CourseId, EnrollmentId, OrderId, User, UserId,
};
use super::{
    CatalogStore, ContentStore, IdentityStore, OrderRecord, Store, StoreError, UnitOfWork,
};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// A unit of work takes the state lock for its whole lifetime and mutates a
// private copy. Commit swaps the copy in; dropping the unit discards it.
// Units are therefore fully serialised, which is all a single process needs.
//
// ============================================================================

#[derive(Debug, Default, Clone)]
struct LedgerState {
    orders: HashMap<OrderId, OrderRecord>,
    order_numbers: HashMap<OrderNumber, OrderId>,
    order_events: HashMap<OrderId, Vec<EventEnvelope<OrderEvent>>>,
    enrollments: HashMap<EnrollmentId, Enrollment>,
    enrollment_keys: HashMap<(UserId, CourseId), EnrollmentId>,
    student_counts: HashMap<CourseId, u64>,
    failing_enrollments: HashSet<CourseId>,
}

#[derive(Debug, Default)]
struct ReferenceData {
    users: HashMap<UserId, User>,
    courses: HashMap<CourseId, Course>,
    chapters: HashMap<ChapterId, Chapter>,
    contents: HashMap<ContentId, Content>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<LedgerState>>,
    reference: Arc<RwLock<ReferenceData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    pub async fn add_user(&self, user: User) {
        self.reference.write().await.users.insert(user.id, user);
    }

    pub async fn add_course(&self, course: Course) {
        self.reference.write().await.courses.insert(course.id, course);
    }

    pub async fn add_chapter(&self, chapter: Chapter) {
        self.reference.write().await.chapters.insert(chapter.id, chapter);
    }

    pub async fn add_content(&self, content: Content) {
        self.reference.write().await.contents.insert(content.id, content);
    }

    /// Change the live catalog price of a course
    pub async fn set_course_price(&self, course_id: CourseId, price: Decimal) -> Result<(), StoreError> {
        let mut reference = self.reference.write().await;
        let course = reference
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| StoreError::Backend(format!("unknown course {}", course_id)))?;
        course.price = price;
        Ok(())
    }

    /// Make every enrollment insert for `course_id` fail
    pub async fn fail_enrollments_for(&self, course_id: CourseId) {
        self.state.lock().await.failing_enrollments.insert(course_id);
    }

    async fn collect_orders<F>(&self, filter: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .map(|record| &record.order)
            .filter(|order| filter(order))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    async fn collect_enrollments<F>(&self, filter: F) -> Vec<Enrollment>
    where
        F: Fn(&Enrollment) -> bool,
    {
        let state = self.state.lock().await;
        let mut enrollments: Vec<Enrollment> = state
            .enrollments
            .values()
            .filter(|e| filter(e))
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| a.enrolled_at.cmp(&b.enrolled_at));
        enrollments
    }
}

// ============================================================================
// Unit of Work
// ============================================================================

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn insert_order(&mut self, order: &Order, version: i64) -> Result<(), StoreError> {
        if self.working.order_numbers.contains_key(&order.order_number) {
            return Err(StoreError::Conflict(format!(
                "order number {} already exists",
                order.order_number
            )));
        }
        if self.working.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }

        self.working.order_numbers.insert(order.order_number.clone(), order.id);
        self.working.orders.insert(
            order.id,
            OrderRecord {
                order: order.clone(),
                version,
            },
        );
        Ok(())
    }

    async fn load_order_for_update(&mut self, id: OrderId) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        version: i64,
    ) -> Result<(), StoreError> {
        let record = self
            .working
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::Concurrency(format!("order {} disappeared", id)))?;

        if record.order.status != expected {
            return Err(StoreError::Concurrency(format!(
                "order {} is {}, expected {}",
                id, record.order.status, expected
            )));
        }

        record.order.status = next;
        record.version = version;
        Ok(())
    }

    async fn append_order_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> Result<(), StoreError> {
        for envelope in events {
            let id = OrderId::from(envelope.aggregate_id);
            let history = self.working.order_events.entry(id).or_default();

            if let Some(last) = history.last() {
                if envelope.sequence_number <= last.sequence_number {
                    return Err(StoreError::Concurrency(format!(
                        "event {} for order {} already recorded",
                        envelope.sequence_number, id
                    )));
                }
            }
            history.push(envelope.clone());
        }
        Ok(())
    }

    async fn find_enrollment(
        &mut self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        Ok(self
            .working
            .enrollment_keys
            .get(&(student_id, course_id))
            .and_then(|id| self.working.enrollments.get(id))
            .cloned())
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<Provisioned, StoreError> {
        if self.working.failing_enrollments.contains(&enrollment.course_id) {
            return Err(StoreError::Backend(format!(
                "enrollment insert rejected for course {}",
                enrollment.course_id
            )));
        }

        let key = (enrollment.student_id, enrollment.course_id);
        if let Some(existing) = self
            .working
            .enrollment_keys
            .get(&key)
            .and_then(|id| self.working.enrollments.get(id))
        {
            return Ok(Provisioned::Existing(existing.clone()));
        }

        self.working.enrollment_keys.insert(key, enrollment.id);
        self.working.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(Provisioned::Created(enrollment.clone()))
    }

    async fn increment_student_count(&mut self, course_id: CourseId) -> Result<(), StoreError> {
        *self.working.student_counts.entry(course_id).or_insert(0) += 1;
        Ok(())
    }

    async fn load_enrollment_for_update(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        Ok(self.working.enrollments.get(&id).cloned())
    }

    async fn save_enrollment_progress(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        let stored = self
            .working
            .enrollments
            .get_mut(&enrollment.id)
            .ok_or_else(|| StoreError::Concurrency(format!("enrollment {} disappeared", enrollment.id)))?;

        stored.progress = enrollment.progress;
        stored.completed_at = enrollment.completed_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

// ============================================================================
// Store Implementation
// ============================================================================

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&id).map(|record| record.order.clone()))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        Ok(self.collect_orders(|order| order.user_id == user_id).await)
    }

    async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError> {
        Ok(self.collect_orders(|order| order.status == status).await)
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.collect_orders(|_| true).await)
    }

    async fn order_events(&self, id: OrderId) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.order_events.get(&id).cloned().unwrap_or_default())
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.enrollments.get(&id).cloned())
    }

    async fn find_enrollment(
        &self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .enrollment_keys
            .get(&(student_id, course_id))
            .and_then(|id| state.enrollments.get(id))
            .cloned())
    }

    async fn enrollments_for_student(&self, student_id: UserId) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self.collect_enrollments(|e| e.student_id == student_id).await)
    }

    async fn enrollments_for_course(&self, course_id: CourseId) -> Result<Vec<Enrollment>, StoreError> {
        Ok(self.collect_enrollments(|e| e.course_id == course_id).await)
    }

    async fn student_count(&self, course_id: CourseId) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state.student_counts.get(&course_id).copied().unwrap_or(0))
    }

    async fn total_enrollments(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.enrollments.len() as u64)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        Ok(self.reference.read().await.courses.get(&id).cloned())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.reference.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn chapters_for_course(&self, course_id: CourseId) -> Result<Vec<Chapter>, StoreError> {
        Ok(self
            .reference
            .read()
            .await
            .chapters
            .values()
            .filter(|chapter| chapter.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        Ok(self.reference.read().await.chapters.get(&id).cloned())
    }

    async fn contents_for_chapter(&self, chapter_id: ChapterId) -> Result<Vec<Content>, StoreError> {
        Ok(self
            .reference
            .read()
            .await
            .contents
            .values()
            .filter(|content| content.chapter_id == chapter_id)
            .cloned()
            .collect())
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<Content>, StoreError> {
        Ok(self.reference.read().await.contents.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use crate::domain::order::OrderItem;
    use crate::models::OrderItemId;

    fn order(number: &str) -> Order {
        let id = OrderId::new();
        Order {
            id,
            order_number: OrderNumber::from(number.to_string()),
            total_amount: dec!(10),
            payment_method: "QR_CODE".to_string(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            user_id: UserId::new(),
            items: vec![OrderItem {
                id: OrderItemId::new(),
                order_id: id,
                course_id: CourseId::new(),
                price: dec!(10),
            }],
        }
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let store = MemoryStore::new();
        let order = order("ORD-1");

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_order(&order, 1).await.unwrap();
        }

        assert!(store.get_order(order.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let order = order("ORD-1");

        let mut uow = store.begin().await.unwrap();
        uow.insert_order(&order, 1).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.get_order(order.id).await.unwrap(), Some(order));
    }

    #[tokio::test]
    async fn test_order_number_is_unique() {
        let store = MemoryStore::new();

        let mut uow = store.begin().await.unwrap();
        uow.insert_order(&order("ORD-1"), 1).await.unwrap();
        let result = uow.insert_order(&order("ORD-1"), 1).await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_guarded_status_update() {
        let store = MemoryStore::new();
        let order = order("ORD-1");

        let mut uow = store.begin().await.unwrap();
        uow.insert_order(&order, 1).await.unwrap();
        uow.update_order_status(order.id, OrderStatus::Pending, OrderStatus::Paid, 2)
            .await
            .unwrap();

        let stale = uow
            .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled, 2)
            .await;
        assert!(matches!(stale, Err(StoreError::Concurrency(_))));
    }

    #[tokio::test]
    async fn test_enrollment_insert_respects_uniqueness() {
        let store = MemoryStore::new();
        let student = UserId::new();
        let course = CourseId::new();

        let mut uow = store.begin().await.unwrap();
        let first = uow
            .insert_enrollment(&Enrollment::new(student, course, Utc::now()))
            .await
            .unwrap();
        let second = uow
            .insert_enrollment(&Enrollment::new(student, course, Utc::now()))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert!(first.was_created());
        assert!(!second.was_created());
        assert_eq!(first.enrollment(), second.enrollment());
        assert_eq!(store.enrollments_for_course(course).await.unwrap().len(), 1);
    }
}
