use std::collections::HashSet;
use std::sync::Arc;
use futures_util::future::try_join_all;

use crate::config::PricingConfig;
use crate::domain::order::LineItem;
use crate::error::{CommerceError, CommerceResult};
use crate::models::CourseId;
use crate::store::CatalogStore;

// ============================================================================
// Price Quoter
// ============================================================================
//
// Turns course ids into line-items carrying a copy of the catalog price at
// call time. Either every course resolves or the quote fails as a whole.
//
// ============================================================================

pub struct PriceQuoter {
    catalog: Arc<dyn CatalogStore>,
    config: PricingConfig,
}

impl PriceQuoter {
    pub fn new(catalog: Arc<dyn CatalogStore>, config: PricingConfig) -> Self {
        Self { catalog, config }
    }

    pub async fn quote(&self, course_ids: &[CourseId]) -> CommerceResult<Vec<LineItem>> {
        if course_ids.is_empty() {
            return Err(CommerceError::InvalidRequest("course list is empty".into()));
        }

        // One line-item per course, first occurrence wins the position
        let mut seen = HashSet::new();
        let unique: Vec<CourseId> = course_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if unique.len() > self.config.max_courses_per_order {
            return Err(CommerceError::InvalidRequest(format!(
                "at most {} courses per order, got {}",
                self.config.max_courses_per_order,
                unique.len()
            )));
        }

        let lookups = unique.iter().map(|id| {
            let catalog = self.catalog.clone();
            let id = *id;
            async move {
                catalog
                    .get_course(id)
                    .await
                    .map_err(|e| CommerceError::dependency("catalog", e.to_string()))?
                    .ok_or(CommerceError::CourseNotFound(id))
            }
        });

        let courses = tokio::time::timeout(self.config.lookup_timeout(), try_join_all(lookups))
            .await
            .map_err(|_| {
                tracing::warn!(
                    courses = unique.len(),
                    timeout_ms = self.config.lookup_timeout_ms,
                    "Catalog lookup timed out"
                );
                CommerceError::dependency("catalog", "lookup timed out")
            })??;

        let mut line_items = Vec::with_capacity(courses.len());
        for course in courses {
            if self.config.reject_inactive && !course.is_active {
                return Err(CommerceError::InvalidRequest(format!(
                    "course {} is not available for purchase",
                    course.id
                )));
            }

            line_items.push(LineItem {
                course_id: course.id,
                title: course.title,
                price: course.price,
            });
        }

        tracing::debug!(
            requested = course_ids.len(),
            quoted = line_items.len(),
            "Quote built"
        );

        Ok(line_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use rust_decimal_macros::dec;
    use crate::models::{Course, UserId};
    use crate::store::{MemoryStore, StoreError};

    async fn seeded(courses: &[(rust_decimal::Decimal, bool)]) -> (Arc<MemoryStore>, Vec<CourseId>) {
        let store = Arc::new(MemoryStore::new());
        let mut ids = Vec::new();
        for (price, active) in courses {
            let course = Course {
                id: CourseId::new(),
                title: format!("Course {}", price),
                thumbnail: None,
                price: *price,
                is_active: *active,
                instructor_id: UserId::new(),
            };
            ids.push(course.id);
            store.add_course(course).await;
        }
        (store, ids)
    }

    #[tokio::test]
    async fn test_quote_copies_prices() {
        let (store, ids) = seeded(&[(dec!(10), true), (dec!(15), true)]).await;
        let quoter = PriceQuoter::new(store, PricingConfig::default());

        let items = quoter.quote(&ids).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].course_id, ids[0]);
        assert_eq!(items[0].price, dec!(10));
        assert_eq!(items[1].price, dec!(15));
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let (store, _) = seeded(&[]).await;
        let quoter = PriceQuoter::new(store, PricingConfig::default());

        assert!(matches!(quoter.quote(&[]).await, Err(CommerceError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_unknown_course_fails_whole_quote() {
        let (store, mut ids) = seeded(&[(dec!(10), true)]).await;
        let missing = CourseId::new();
        ids.push(missing);
        let quoter = PriceQuoter::new(store, PricingConfig::default());

        match quoter.quote(&ids).await {
            Err(CommerceError::CourseNotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected CourseNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicates_collapse() {
        let (store, ids) = seeded(&[(dec!(10), true)]).await;
        let quoter = PriceQuoter::new(store, PricingConfig::default());

        let items = quoter.quote(&[ids[0], ids[0]]).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_course_rejected() {
        let (store, ids) = seeded(&[(dec!(10), false)]).await;
        let quoter = PriceQuoter::new(store.clone(), PricingConfig::default());
        assert!(matches!(quoter.quote(&ids).await, Err(CommerceError::InvalidRequest(_))));

        let lenient = PriceQuoter::new(
            store,
            PricingConfig { reject_inactive: false, ..PricingConfig::default() },
        );
        assert!(lenient.quote(&ids).await.is_ok());
    }

    struct SlowCatalog;

    #[async_trait]
    impl CatalogStore for SlowCatalog {
        async fn get_course(&self, _id: CourseId) -> Result<Option<Course>, StoreError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_slow_catalog_times_out() {
        let quoter = PriceQuoter::new(
            Arc::new(SlowCatalog),
            PricingConfig { lookup_timeout_ms: 20, ..PricingConfig::default() },
        );

        let err = quoter.quote(&[CourseId::new()]).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, CommerceError::DependencyUnavailable { .. }));
    }
}
