use async_trait::async_trait;

use crate::error::GatewayError;
use crate::images::{GeneratedImage, ReferenceImage};
use crate::models::{DiagnosisResult, ExtractedProductInfo, ImagePlan, OptimizationResult, Platform, ProductInput};

/// The external text/image generation service.
///
/// Every call is a single attempt; failures go straight back to the wizard.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Resolve a product page to its title, price and description (search grounded).
    async fn extract_product_info(&self, url: &str) -> Result<ExtractedProductInfo, GatewayError>;

    /// Compare the listing against its competitors (search grounded).
    async fn perform_diagnosis(&self, platform: Platform, input: &ProductInput) -> Result<DiagnosisResult, GatewayError>;

    /// Produce candidate listing rewrites under a strict response schema.
    async fn generate_optimizations(
        &self,
        platform: Platform,
        input: &ProductInput,
        diagnosis: &DiagnosisResult,
    ) -> Result<OptimizationResult, GatewayError>;

    /// Render one planned image from the seller's reference photo.
    async fn generate_listing_image(
        &self,
        reference: &ReferenceImage,
        plan: &ImagePlan,
        product_description: &str,
    ) -> Result<GeneratedImage, GatewayError>;
}
