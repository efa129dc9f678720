use async_trait::async_trait;
use qrcode::QrCode;
use qrcode::render::svg;
use std::time::Duration;

use super::PaymentError;

// ============================================================================
// Payment Artifact Rendering
// ============================================================================

/// Image bytes plus their media type
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// External collaborator that turns payment content into a scannable image.
/// May be unavailable; callers must tolerate failure.
#[async_trait]
pub trait PaymentArtifactRenderer: Send + Sync {
    async fn render(&self, content: &str, width: u32, height: u32) -> Result<RenderedImage, PaymentError>;
}

/// Renders through a QR image service reached over HTTP.
///
/// Sends `GET {endpoint}?data={content}&size={width}x{height}` and takes the
/// response body as the image.
pub struct HttpArtifactRenderer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpArtifactRenderer {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PaymentArtifactRenderer for HttpArtifactRenderer {
    async fn render(&self, content: &str, width: u32, height: u32) -> Result<RenderedImage, PaymentError> {
        let size = format!("{}x{}", width, height);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("data", content), ("size", size.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaymentError::Status(status.as_u16()));
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/png")
            .to_string();

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(PaymentError::EmptyBody);
        }

        Ok(RenderedImage { media_type, bytes })
    }
}

/// Encode `content` as a QR code locally (SVG)
pub fn render_local_qr(content: &str, width: u32, height: u32) -> Result<RenderedImage, PaymentError> {
    let code = QrCode::new(content.as_bytes()).map_err(|e| PaymentError::Encoding(e.to_string()))?;

    let image = code
        .render::<svg::Color>()
        .min_dimensions(width, height)
        .quiet_zone(true)
        .build();

    Ok(RenderedImage {
        media_type: "image/svg+xml".to_string(),
        bytes: image.into_bytes(),
    })
}
