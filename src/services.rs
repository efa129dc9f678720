use std::sync::Arc;

use crate::access::{AccessResolver, ContentGateway};
use crate::config::AppConfig;
use crate::domain::enrollment::EnrollmentProvisioner;
use crate::domain::order::OrderLedger;
use crate::metrics::Metrics;
use crate::payment::PaymentReferenceGenerator;
use crate::pricing::PriceQuoter;
use crate::store::{CatalogStore, ContentStore, IdentityStore, Store};

// ============================================================================
// Service Wiring
// ============================================================================
//
// Builds every core component once over a single backend and hands out
// shared handles. Component graph:
//
//   OrderLedger
//   ├── PriceQuoter ──────────── CatalogStore
//   ├── PaymentReferenceGenerator
//   └── EnrollmentProvisioner ── Store
//   ContentGateway
//   └── AccessResolver ───────── EnrollmentProvisioner
//
// ============================================================================

pub struct Services {
    pub ledger: Arc<OrderLedger>,
    pub provisioner: Arc<EnrollmentProvisioner>,
    pub resolver: Arc<AccessResolver>,
    pub gateway: Arc<ContentGateway>,
    pub payments: Arc<PaymentReferenceGenerator>,
    pub metrics: Arc<Metrics>,
}

impl Services {
    pub fn build<B>(backend: Arc<B>, config: &AppConfig, metrics: Arc<Metrics>) -> anyhow::Result<Self>
    where
        B: Store + CatalogStore + IdentityStore + ContentStore + 'static,
    {
        let provisioner = Arc::new(EnrollmentProvisioner::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            metrics.clone(),
        ));

        let payments = Arc::new(PaymentReferenceGenerator::from_config(
            config.payment.clone(),
            metrics.clone(),
        )?);

        let ledger = Arc::new(OrderLedger::new(
            backend.clone(),
            backend.clone(),
            PriceQuoter::new(backend.clone(), config.pricing.clone()),
            provisioner.clone(),
            payments.clone(),
            config.ledger.clone(),
            metrics.clone(),
        ));

        let resolver = Arc::new(AccessResolver::new(provisioner.clone(), metrics.clone()));
        let gateway = Arc::new(ContentGateway::new(backend.clone(), backend, resolver.clone()));

        tracing::info!(
            renderer_enabled = config.payment.renderer.enabled,
            "Commerce services ready"
        );

        Ok(Self {
            ledger,
            provisioner,
            resolver,
            gateway,
            payments,
            metrics,
        })
    }
}
