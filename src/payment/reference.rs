use base64::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::domain::order::OrderNumber;
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerError};
use super::renderer::{render_local_qr, HttpArtifactRenderer, PaymentArtifactRenderer, RenderedImage};
use super::PaymentError;

// ============================================================================
// Payment Reference Generator
// ============================================================================
//
// Builds the canonical payment content for an order from (amount, order
// number, bank configuration) and renders it as a scannable image. The
// remote renderer is tried first behind a timeout and a circuit breaker;
// any failure there falls back to a locally encoded QR code of the very
// same content.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSource {
    Remote,
    Local,
}

impl ArtifactSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactSource::Remote => "remote",
            ArtifactSource::Local => "local",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentArtifact {
    pub media_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub source: ArtifactSource,
}

impl PaymentArtifact {
    fn from_image(image: RenderedImage, source: ArtifactSource) -> Self {
        Self {
            media_type: image.media_type,
            bytes: image.bytes,
            source,
        }
    }

    /// `data:{media_type};base64,...` for direct embedding
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, BASE64_STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReference {
    pub order_number: OrderNumber,
    pub amount: Decimal,
    /// The canonical string encoded in the image
    pub display_content: String,
    pub narrative: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub image: PaymentArtifact,
}

pub struct PaymentReferenceGenerator {
    config: PaymentConfig,
    renderer: Option<Arc<dyn PaymentArtifactRenderer>>,
    breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

impl PaymentReferenceGenerator {
    pub fn new(
        config: PaymentConfig,
        renderer: Option<Arc<dyn PaymentArtifactRenderer>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let breaker = CircuitBreaker::new("payment_renderer", config.renderer.circuit_breaker());
        Self {
            config,
            renderer,
            breaker,
            metrics,
        }
    }

    /// Use the HTTP renderer when enabled in configuration
    pub fn from_config(config: PaymentConfig, metrics: Arc<Metrics>) -> Result<Self, PaymentError> {
        let renderer: Option<Arc<dyn PaymentArtifactRenderer>> = if config.renderer.enabled {
            Some(Arc::new(HttpArtifactRenderer::new(
                config.renderer.endpoint.clone(),
                config.renderer.timeout(),
            )?))
        } else {
            None
        };

        Ok(Self::new(config, renderer, metrics))
    }

    /// Whole currency units, half rounded away from zero
    pub fn format_amount(amount: Decimal) -> String {
        amount
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_string()
    }

    pub fn narrative(&self, order_number: &OrderNumber) -> String {
        format!("{} {}", self.config.narrative_prefix, order_number)
    }

    /// The template's placeholders are filled by position. Two placeholders
    /// take (account, amount), three take (bank, account, amount) and four
    /// take (bank, account, amount, narrative).
    pub fn canonical_content(&self, amount: Decimal, order_number: &OrderNumber) -> String {
        let amount = Self::format_amount(amount);
        let narrative = self.narrative(order_number);
        let template = &self.config.content_template;

        let values: Vec<&str> = match template.matches("%s").count() {
            2 => vec![self.config.account_number.as_str(), amount.as_str()],
            3 => vec![
                self.config.bank_name.as_str(),
                self.config.account_number.as_str(),
                amount.as_str(),
            ],
            _ => vec![
                self.config.bank_name.as_str(),
                self.config.account_number.as_str(),
                amount.as_str(),
                narrative.as_str(),
            ],
        };

        fill_placeholders(template, &values)
    }

    #[tracing::instrument(skip(self, order_number), fields(order_number = %order_number))]
    pub async fn reference(
        &self,
        amount: Decimal,
        order_number: &OrderNumber,
    ) -> Result<PaymentReference, PaymentError> {
        let display_content = self.canonical_content(amount, order_number);
        let image = self.render(&display_content).await?;

        Ok(PaymentReference {
            order_number: order_number.clone(),
            amount,
            narrative: self.narrative(order_number),
            display_content,
            bank_name: self.config.bank_name.clone(),
            account_number: self.config.account_number.clone(),
            account_name: self.config.account_name.clone(),
            image,
        })
    }

    async fn render(&self, content: &str) -> Result<PaymentArtifact, PaymentError> {
        let (width, height) = (self.config.renderer.width, self.config.renderer.height);

        if let Some(renderer) = &self.renderer {
            let timeout = self.config.renderer.timeout();
            let attempt = self
                .breaker
                .call(async {
                    tokio::time::timeout(timeout, renderer.render(content, width, height))
                        .await
                        .map_err(|_| PaymentError::Timeout(timeout))?
                })
                .await;

            self.metrics
                .circuit_breaker_state
                .set(self.breaker.get_state().await.code());

            match attempt {
                Ok(image) => {
                    let source = ArtifactSource::Remote;
                    self.metrics.payment_artifacts.with_label_values(&[source.as_str()]).inc();
                    return Ok(PaymentArtifact::from_image(image, source));
                }
                Err(CircuitBreakerError::CircuitOpen) => {
                    tracing::warn!("Payment renderer circuit open, rendering locally");
                }
                Err(CircuitBreakerError::OperationFailed(e)) => {
                    tracing::warn!(error = %e, "Payment renderer failed, rendering locally");
                }
            }
        }

        let image = render_local_qr(content, width, height)?;
        let source = ArtifactSource::Local;
        self.metrics.payment_artifacts.with_label_values(&[source.as_str()]).inc();
        Ok(PaymentArtifact::from_image(image, source))
    }
}

fn fill_placeholders(template: &str, values: &[&str]) -> String {
    let mut parts = template.split("%s");
    let mut out = String::from(parts.next().unwrap_or_default());

    for (i, part) in parts.enumerate() {
        out.push_str(values.get(i).copied().unwrap_or_default());
        out.push_str(part);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Records what it was asked to render; fails when told to
    struct FakeRenderer {
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    impl FakeRenderer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self { fail, seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl PaymentArtifactRenderer for FakeRenderer {
        async fn render(&self, content: &str, _w: u32, _h: u32) -> Result<RenderedImage, PaymentError> {
            self.seen.lock().unwrap().push(content.to_string());
            if self.fail {
                return Err(PaymentError::Status(503));
            }
            Ok(RenderedImage { media_type: "image/png".into(), bytes: content.as_bytes().to_vec() })
        }
    }

    fn config(template: &str) -> PaymentConfig {
        PaymentConfig {
            bank_name: "MB Bank".into(),
            account_number: "0123456789".into(),
            account_name: "SHOP".into(),
            content_template: template.into(),
            ..PaymentConfig::default()
        }
    }

    fn generator(template: &str, renderer: Option<Arc<dyn PaymentArtifactRenderer>>) -> PaymentReferenceGenerator {
        PaymentReferenceGenerator::new(config(template), renderer, Arc::new(Metrics::new().unwrap()))
    }

    fn number() -> OrderNumber {
        OrderNumber::from("ORD-20260101-ABCDEF12".to_string())
    }

    #[test]
    fn test_amount_has_no_decimals() {
        assert_eq!(PaymentReferenceGenerator::format_amount(dec!(25.00)), "25");
        assert_eq!(PaymentReferenceGenerator::format_amount(dec!(10.5)), "11");
        assert_eq!(PaymentReferenceGenerator::format_amount(dec!(10.49)), "10");
        assert_eq!(PaymentReferenceGenerator::format_amount(dec!(150000)), "150000");
    }

    #[test]
    fn test_content_by_placeholder_count() {
        let three = generator("NH:%s|STK:%s|ST:%s", None);
        assert_eq!(three.canonical_content(dec!(25), &number()), "NH:MB Bank|STK:0123456789|ST:25");

        let two = generator("STK:%s|ST:%s", None);
        assert_eq!(two.canonical_content(dec!(25), &number()), "STK:0123456789|ST:25");

        let four = generator("NH:%s|STK:%s|ST:%s|ND:%s", None);
        assert_eq!(
            four.canonical_content(dec!(25), &number()),
            "NH:MB Bank|STK:0123456789|ST:25|ND:Thanh toan don hang ORD-20260101-ABCDEF12"
        );
    }

    #[tokio::test]
    async fn test_remote_render() {
        let renderer = FakeRenderer::new(false);
        let gen = generator("STK:%s|ST:%s", Some(renderer.clone()));

        let reference = gen.reference(dec!(25), &number()).await.unwrap();

        assert_eq!(reference.image.source, ArtifactSource::Remote);
        assert_eq!(renderer.seen.lock().unwrap().as_slice(), [reference.display_content.clone()]);
        assert_eq!(reference.narrative, "Thanh toan don hang ORD-20260101-ABCDEF12");
    }

    #[tokio::test]
    async fn test_fallback_encodes_same_content() {
        let renderer = FakeRenderer::new(true);
        let gen = generator("STK:%s|ST:%s", Some(renderer.clone()));

        let reference = gen.reference(dec!(25), &number()).await.unwrap();
        let local = render_local_qr(&reference.display_content, 300, 300).unwrap();

        assert_eq!(reference.image.source, ArtifactSource::Local);
        assert_eq!(reference.image.bytes, local.bytes);
        assert_eq!(renderer.seen.lock().unwrap()[0], reference.display_content);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_renderer() {
        let renderer = FakeRenderer::new(true);
        let gen = generator("STK:%s|ST:%s", Some(renderer.clone()));

        // default failure threshold is 3
        for _ in 0..5 {
            let reference = gen.reference(dec!(10), &number()).await.unwrap();
            assert_eq!(reference.image.source, ArtifactSource::Local);
        }

        assert_eq!(renderer.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_data_uri() {
        let gen = generator("STK:%s|ST:%s", None);
        let reference = gen.reference(dec!(10), &number()).await.unwrap();

        assert!(reference.image.data_uri().starts_with("data:image/svg+xml;base64,"));
    }
}
