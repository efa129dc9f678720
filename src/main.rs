use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use course_commerce::config::{AppConfig, StorageBackend};
use course_commerce::metrics::Metrics;
use course_commerce::models::{
    Chapter, ChapterId, Content, ContentId, Course, CourseId, Role, User, UserId, Viewer,
};
use course_commerce::store::{MemoryStore, PgStore};
use course_commerce::Services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Default filter comes from configuration, RUST_LOG overrides it
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.default_filter))
        )
        .init();

    tracing::info!(backend = ?config.storage.backend, "Starting course commerce");

    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    match config.storage.backend {
        StorageBackend::Postgres => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = Arc::new(
                PgStore::connect(&config.storage.database_url, config.storage.max_connections).await?,
            );
            store.migrate().await?;

            let services = Services::build(store, &config, metrics)?;
            let pending = services
                .ledger
                .orders_by_status(course_commerce::domain::order::OrderStatus::Pending)
                .await?;
            tracing::info!(pending_orders = pending.len(), "Database ready");
        }
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            let services = Services::build(store.clone(), &config, metrics)?;
            run_demo(&store, &services).await?;
        }
    }

    Ok(())
}

/// Walk one buyer through checkout, payment and content access
async fn run_demo(store: &MemoryStore, services: &Services) -> anyhow::Result<()> {
    let now = Utc::now();

    let instructor = User { id: UserId::new(), display_name: "Instructor".into(), role: Role::Instructor };
    let buyer = User { id: UserId::new(), display_name: "Buyer".into(), role: Role::Student };
    store.add_user(instructor.clone()).await;
    store.add_user(buyer.clone()).await;

    let mut courses = Vec::new();
    for (title, price) in [("Rust Basics", Decimal::from(10)), ("Async Rust", Decimal::from(15))] {
        let course = Course {
            id: CourseId::new(),
            title: title.into(),
            thumbnail: None,
            price,
            is_active: true,
            instructor_id: instructor.id,
        };
        store.add_course(course.clone()).await;
        courses.push(course);
    }

    let chapter = Chapter {
        id: ChapterId::new(),
        course_id: courses[0].id,
        title: "Ownership".into(),
        description: Some("Moves and borrows".into()),
        order_index: Some(1),
        document_url: Some("docs/ownership.pdf".into()),
        video_url: Some("videos/ownership.mp4".into()),
        created_at: now,
        updated_at: now,
    };
    store.add_chapter(chapter.clone()).await;
    store
        .add_content(Content {
            id: ContentId::new(),
            chapter_id: chapter.id,
            title: "Borrow checker".into(),
            description: None,
            file_url: Some("lessons/borrowck.mp4".into()),
            duration_minutes: Some(14),
            order_index: Some(1),
            is_preview: false,
            created_at: now,
        })
        .await;

    let course_ids: Vec<CourseId> = courses.iter().map(|c| c.id).collect();
    let placed = services.ledger.create_order(buyer.id, &course_ids).await?;
    tracing::info!(
        order_number = %placed.order.order_number,
        total = %placed.order.total_amount,
        payment = ?placed.payment.as_ref().map(|p| p.display_content.as_str()),
        "Checkout complete"
    );

    let viewer = Viewer::from(&buyer);
    let before = services.gateway.chapter(&viewer, chapter.id).await?;
    tracing::info!(full_access = before.full_access, "Chapter before payment");

    services.ledger.confirm_payment(placed.order.id).await?;

    let after = services.gateway.chapter(&viewer, chapter.id).await?;
    tracing::info!(
        full_access = after.full_access,
        lessons = after.content_count,
        minutes = after.total_duration_minutes,
        "Chapter after payment"
    );

    let enrollments = services.provisioner.enrollments_for_student(buyer.id).await?;
    for enrollment in &enrollments {
        let updated = services.provisioner.update_progress(enrollment.id, 100).await?;
        tracing::info!(
            course_id = %updated.course_id,
            progress = updated.progress,
            completed = updated.is_completed(),
            "Progress recorded"
        );
    }

    tracing::info!(enrollments = enrollments.len(), "Demo complete");

    Ok(())
}
