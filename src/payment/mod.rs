use std::time::Duration;

pub mod reference;
pub mod renderer;

pub use reference::{ArtifactSource, PaymentArtifact, PaymentReference, PaymentReferenceGenerator};
pub use renderer::{HttpArtifactRenderer, PaymentArtifactRenderer, RenderedImage};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Renderer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Renderer returned status {0}")]
    Status(u16),

    #[error("Renderer returned an empty image")]
    EmptyBody,

    #[error("Renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("QR encoding failed: {0}")]
    Encoding(String),
}
