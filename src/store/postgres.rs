use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::core::EventEnvelope;
use crate::domain::enrollment::{Enrollment, Provisioned};
use crate::domain::order::{Order, OrderEvent, OrderItem, OrderNumber, OrderStatus};
use crate::models::{
    Chapter, ChapterId, Content, ContentId, Course, CourseId, EnrollmentId, OrderId, Role, User,
    UserId,
};
use super::{
    CatalogStore, ContentStore, IdentityStore, OrderRecord, Store, StoreError, UnitOfWork,
};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Each unit of work is one database transaction. Order rows are locked with
// SELECT ... FOR UPDATE, status writes are guarded by the expected current
// status, and the (student_id, course_id) unique constraint closes the race
// between concurrent enrollment inserts.
//
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Apply the schema (idempotent)
    #[tracing::instrument(skip(self))]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS users (
                id           UUID PRIMARY KEY,
                display_name TEXT NOT NULL,
                role         TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS courses (
                id            UUID PRIMARY KEY,
                title         TEXT NOT NULL,
                thumbnail     TEXT NULL,
                price         NUMERIC(12, 2) NOT NULL,
                is_active     BOOLEAN NOT NULL DEFAULT TRUE,
                instructor_id UUID NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS chapters (
                id           UUID PRIMARY KEY,
                course_id    UUID NOT NULL,
                title        TEXT NOT NULL,
                description  TEXT NULL,
                order_index  INTEGER NULL,
                document_url TEXT NULL,
                video_url    TEXT NULL,
                created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS contents (
                id               UUID PRIMARY KEY,
                chapter_id       UUID NOT NULL,
                title            TEXT NOT NULL,
                description      TEXT NULL,
                file_url         TEXT NULL,
                duration_minutes INTEGER NULL,
                order_index      INTEGER NULL,
                is_preview       BOOLEAN NOT NULL DEFAULT FALSE,
                created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS orders (
                id             UUID PRIMARY KEY,
                order_number   TEXT NOT NULL UNIQUE,
                total_amount   NUMERIC(12, 2) NOT NULL,
                payment_method TEXT NOT NULL,
                status         TEXT NOT NULL,
                created_at     TIMESTAMPTZ NOT NULL,
                user_id        UUID NOT NULL,
                version        BIGINT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS order_items (
                id        UUID PRIMARY KEY,
                order_id  UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                course_id UUID NOT NULL,
                price     NUMERIC(12, 2) NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS order_events (
                event_id        UUID NOT NULL,
                aggregate_id    UUID NOT NULL,
                sequence_number BIGINT NOT NULL,
                event_type      TEXT NOT NULL,
                event_version   INTEGER NOT NULL,
                event_data      JSONB NOT NULL,
                correlation_id  UUID NOT NULL,
                user_id         UUID NULL,
                created_at      TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (aggregate_id, sequence_number)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS enrollments (
                id           UUID PRIMARY KEY,
                student_id   UUID NOT NULL,
                course_id    UUID NOT NULL,
                progress     SMALLINT NOT NULL DEFAULT 0,
                completed_at TIMESTAMPTZ NULL,
                enrolled_at  TIMESTAMPTZ NOT NULL,
                UNIQUE (student_id, course_id)
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS course_stats (
                course_id     UUID PRIMARY KEY,
                student_count BIGINT NOT NULL DEFAULT 0
            )
            ",
            r"CREATE INDEX IF NOT EXISTS orders_by_user ON orders(user_id, created_at DESC)",
            r"CREATE INDEX IF NOT EXISTS order_items_by_order ON order_items(order_id)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn fetch_orders(&self, sql: &str, bind: Option<BindValue>) -> Result<Vec<Order>, StoreError> {
        let query = sqlx::query(sql);
        let query = match bind {
            Some(BindValue::Uuid(id)) => query.bind(id),
            Some(BindValue::Text(text)) => query.bind(text),
            None => query,
        };
        let rows = query.fetch_all(&self.pool).await?;

        let mut orders = rows
            .iter()
            .map(|row| order_from_row(row).map(|record| record.order))
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<Uuid> = orders.iter().map(|order| order.id.as_uuid()).collect();
        let item_rows = sqlx::query(
            "SELECT id, order_id, course_id, price FROM order_items WHERE order_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &item_rows {
            let item = item_from_row(row)?;
            items.entry(item.order_id).or_default().push(item);
        }
        for order in &mut orders {
            order.items = items.remove(&order.id).unwrap_or_default();
        }

        Ok(orders)
    }
}

enum BindValue {
    Uuid(Uuid),
    Text(String),
}

// ============================================================================
// Row Mapping
// ============================================================================

const ORDER_COLUMNS: &str =
    "id, order_number, total_amount, payment_method, status, created_at, user_id, version";

const ENROLLMENT_COLUMNS: &str = "id, student_id, course_id, progress, completed_at, enrolled_at";

fn order_from_row(row: &PgRow) -> Result<OrderRecord, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<OrderStatus>().map_err(StoreError::Backend)?;

    Ok(OrderRecord {
        order: Order {
            id: OrderId::from(row.try_get::<Uuid, _>("id")?),
            order_number: OrderNumber::from(row.try_get::<String, _>("order_number")?),
            total_amount: row.try_get("total_amount")?,
            payment_method: row.try_get("payment_method")?,
            status,
            created_at: row.try_get("created_at")?,
            user_id: UserId::from(row.try_get::<Uuid, _>("user_id")?),
            items: Vec::new(),
        },
        version: row.try_get("version")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    Ok(OrderItem {
        id: row.try_get::<Uuid, _>("id")?.into(),
        order_id: row.try_get::<Uuid, _>("order_id")?.into(),
        course_id: row.try_get::<Uuid, _>("course_id")?.into(),
        price: row.try_get("price")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> Result<Enrollment, StoreError> {
    let progress: i16 = row.try_get("progress")?;
    Ok(Enrollment {
        id: row.try_get::<Uuid, _>("id")?.into(),
        student_id: row.try_get::<Uuid, _>("student_id")?.into(),
        course_id: row.try_get::<Uuid, _>("course_id")?.into(),
        progress: u8::try_from(progress)
            .map_err(|_| StoreError::Backend(format!("progress out of range: {}", progress)))?,
        completed_at: row.try_get("completed_at")?,
        enrolled_at: row.try_get("enrolled_at")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<EventEnvelope<OrderEvent>, StoreError> {
    let data: sqlx::types::Json<OrderEvent> = row.try_get("event_data")?;
    Ok(EventEnvelope {
        event_id: row.try_get("event_id")?,
        aggregate_id: row.try_get("aggregate_id")?,
        sequence_number: row.try_get("sequence_number")?,
        event_type: row.try_get("event_type")?,
        event_version: row.try_get("event_version")?,
        event_data: data.0,
        correlation_id: row.try_get("correlation_id")?,
        user_id: row.try_get("user_id")?,
        timestamp: row.try_get("created_at")?,
    })
}

fn role_from_str(role: &str) -> Result<Role, StoreError> {
    match role {
        "STUDENT" => Ok(Role::Student),
        "INSTRUCTOR" => Ok(Role::Instructor),
        "ADMIN" => Ok(Role::Admin),
        other => Err(StoreError::Backend(format!("unknown role: {}", other))),
    }
}

fn chapter_from_row(row: &PgRow) -> Result<Chapter, StoreError> {
    Ok(Chapter {
        id: row.try_get::<Uuid, _>("id")?.into(),
        course_id: row.try_get::<Uuid, _>("course_id")?.into(),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        order_index: row.try_get("order_index")?,
        document_url: row.try_get("document_url")?,
        video_url: row.try_get("video_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn content_from_row(row: &PgRow) -> Result<Content, StoreError> {
    let duration: Option<i32> = row.try_get("duration_minutes")?;
    Ok(Content {
        id: row.try_get::<Uuid, _>("id")?.into(),
        chapter_id: row.try_get::<Uuid, _>("chapter_id")?.into(),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        file_url: row.try_get("file_url")?,
        duration_minutes: duration.map(|d| d.max(0) as u32),
        order_index: row.try_get("order_index")?,
        is_preview: row.try_get("is_preview")?,
        created_at: row.try_get("created_at")?,
    })
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// ============================================================================
// Unit of Work
// ============================================================================

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn insert_order(&mut self, order: &Order, version: i64) -> Result<(), StoreError> {
        let inserted = sqlx::query(
            r"
            INSERT INTO orders (id, order_number, total_amount, payment_method, status, created_at, user_id, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(order.id.as_uuid())
        .bind(order.order_number.as_str())
        .bind(order.total_amount)
        .bind(&order.payment_method)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.user_id.as_uuid())
        .bind(version)
        .execute(&mut *self.tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(StoreError::Conflict(format!(
                    "order number {} already exists",
                    order.order_number
                )));
            }
            Err(e) => return Err(e.into()),
        }

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, course_id, price) VALUES ($1, $2, $3, $4)",
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.course_id.as_uuid())
            .bind(item.price)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn load_order_for_update(&mut self, id: OrderId) -> Result<Option<OrderRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut record = order_from_row(&row)?;

        let item_rows = sqlx::query("SELECT id, order_id, course_id, price FROM order_items WHERE order_id = $1")
            .bind(id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;
        record.order.items = item_rows.iter().map(item_from_row).collect::<Result<_, _>>()?;

        Ok(Some(record))
    }

    async fn update_order_status(
        &mut self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        version: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET status = $1, version = $2 WHERE id = $3 AND status = $4")
            .bind(next.as_str())
            .bind(version)
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Concurrency(format!(
                "order {} is no longer {}",
                id, expected
            )));
        }
        Ok(())
    }

    async fn append_order_events(&mut self, events: &[EventEnvelope<OrderEvent>]) -> Result<(), StoreError> {
        for envelope in events {
            let inserted = sqlx::query(
                r"
                INSERT INTO order_events
                    (event_id, aggregate_id, sequence_number, event_type, event_version, event_data, correlation_id, user_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(envelope.event_id)
            .bind(envelope.aggregate_id)
            .bind(envelope.sequence_number)
            .bind(&envelope.event_type)
            .bind(envelope.event_version)
            .bind(sqlx::types::Json(&envelope.event_data))
            .bind(envelope.correlation_id)
            .bind(envelope.user_id)
            .bind(envelope.timestamp)
            .execute(&mut *self.tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::Concurrency(format!(
                        "event {} for order {} already recorded",
                        envelope.sequence_number, envelope.aggregate_id
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn find_enrollment(
        &mut self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM enrollments WHERE student_id = $1 AND course_id = $2",
            ENROLLMENT_COLUMNS
        ))
        .bind(student_id.as_uuid())
        .bind(course_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn insert_enrollment(&mut self, enrollment: &Enrollment) -> Result<Provisioned, StoreError> {
        let inserted: Option<Uuid> = sqlx::query_scalar(
            r"
            INSERT INTO enrollments (id, student_id, course_id, progress, completed_at, enrolled_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, course_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(enrollment.id.as_uuid())
        .bind(enrollment.student_id.as_uuid())
        .bind(enrollment.course_id.as_uuid())
        .bind(i16::from(enrollment.progress))
        .bind(enrollment.completed_at)
        .bind(enrollment.enrolled_at)
        .fetch_optional(&mut *self.tx)
        .await?;

        if inserted.is_some() {
            return Ok(Provisioned::Created(enrollment.clone()));
        }

        let existing = self
            .find_enrollment(enrollment.student_id, enrollment.course_id)
            .await?
            .ok_or_else(|| {
                StoreError::Concurrency(format!(
                    "enrollment for ({}, {}) conflicted but is not visible",
                    enrollment.student_id, enrollment.course_id
                ))
            })?;
        Ok(Provisioned::Existing(existing))
    }

    async fn increment_student_count(&mut self, course_id: CourseId) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO course_stats (course_id, student_count) VALUES ($1, 1)
            ON CONFLICT (course_id) DO UPDATE SET student_count = course_stats.student_count + 1
            ",
        )
        .bind(course_id.as_uuid())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn load_enrollment_for_update(&mut self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM enrollments WHERE id = $1 FOR UPDATE",
            ENROLLMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn save_enrollment_progress(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        sqlx::query("UPDATE enrollments SET progress = $1, completed_at = $2 WHERE id = $3")
            .bind(i16::from(enrollment.progress))
            .bind(enrollment.completed_at)
            .bind(enrollment.id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Store Implementation
// ============================================================================

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let orders = self
            .fetch_orders(
                &format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS),
                Some(BindValue::Uuid(id.as_uuid())),
            )
            .await?;
        Ok(orders.into_iter().next())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        self.fetch_orders(
            &format!("SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC", ORDER_COLUMNS),
            Some(BindValue::Uuid(user_id.as_uuid())),
        )
        .await
    }

    async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, StoreError> {
        self.fetch_orders(
            &format!("SELECT {} FROM orders WHERE status = $1 ORDER BY created_at DESC", ORDER_COLUMNS),
            Some(BindValue::Text(status.as_str().to_string())),
        )
        .await
    }

    async fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.fetch_orders(
            &format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLUMNS),
            None,
        )
        .await
    }

    async fn order_events(&self, id: OrderId) -> Result<Vec<EventEnvelope<OrderEvent>>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT event_id, aggregate_id, sequence_number, event_type, event_version, event_data, correlation_id, user_id, created_at
            FROM order_events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            ",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn get_enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM enrollments WHERE id = $1", ENROLLMENT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn find_enrollment(
        &self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM enrollments WHERE student_id = $1 AND course_id = $2",
            ENROLLMENT_COLUMNS
        ))
        .bind(student_id.as_uuid())
        .bind(course_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn enrollments_for_student(&self, student_id: UserId) -> Result<Vec<Enrollment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM enrollments WHERE student_id = $1 ORDER BY enrolled_at ASC",
            ENROLLMENT_COLUMNS
        ))
        .bind(student_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn enrollments_for_course(&self, course_id: CourseId) -> Result<Vec<Enrollment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM enrollments WHERE course_id = $1 ORDER BY enrolled_at ASC",
            ENROLLMENT_COLUMNS
        ))
        .bind(course_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn student_count(&self, course_id: CourseId) -> Result<u64, StoreError> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT student_count FROM course_stats WHERE course_id = $1")
                .bind(course_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    async fn total_enrollments(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

// ============================================================================
// External Collaborators
// ============================================================================

#[async_trait]
impl CatalogStore for PgStore {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, thumbnail, price, is_active, instructor_id FROM courses WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> Result<Course, StoreError> {
            let price: Decimal = row.try_get("price")?;
            Ok(Course {
                id: row.try_get::<Uuid, _>("id")?.into(),
                title: row.try_get("title")?,
                thumbnail: row.try_get("thumbnail")?,
                price,
                is_active: row.try_get("is_active")?,
                instructor_id: row.try_get::<Uuid, _>("instructor_id")?.into(),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, display_name, role FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<User, StoreError> {
            let role: String = row.try_get("role")?;
            Ok(User {
                id: row.try_get::<Uuid, _>("id")?.into(),
                display_name: row.try_get("display_name")?,
                role: role_from_str(&role)?,
            })
        })
        .transpose()
    }
}

const CHAPTER_COLUMNS: &str =
    "id, course_id, title, description, order_index, document_url, video_url, created_at, updated_at";

const CONTENT_COLUMNS: &str =
    "id, chapter_id, title, description, file_url, duration_minutes, order_index, is_preview, created_at";

#[async_trait]
impl ContentStore for PgStore {
    async fn chapters_for_course(&self, course_id: CourseId) -> Result<Vec<Chapter>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {} FROM chapters WHERE course_id = $1", CHAPTER_COLUMNS))
            .bind(course_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(chapter_from_row).collect()
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM chapters WHERE id = $1", CHAPTER_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(chapter_from_row).transpose()
    }

    async fn contents_for_chapter(&self, chapter_id: ChapterId) -> Result<Vec<Content>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {} FROM contents WHERE chapter_id = $1", CONTENT_COLUMNS))
            .bind(chapter_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(content_from_row).collect()
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<Content>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM contents WHERE id = $1", CONTENT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(content_from_row).transpose()
    }
}
