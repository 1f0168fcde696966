use async_trait::async_trait;
use base64::Engine;
use tracing::info;

use crate::error::GatewayError;
use crate::gateway::GenerationGateway;
use crate::images::{GeneratedImage, ReferenceImage};
use crate::models::{
    CompetitorAnalysis, DiagnosisResult, ExtractedProductInfo, ImagePlan, OptimizationPlan, OptimizationResult,
    Platform, ProductInput, Scores, SelfAnalysis,
};

/// Canned responses for running without a Gemini key.
#[derive(Debug, Default, Clone)]
pub struct DemoGateway;

const SLOT_COLORS: [&str; 5] = ["#3B82F6", "#EF4444", "#10B981", "#F59E0B", "#8B5CF6"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn demo_images() -> Vec<ImagePlan> {
    [("主图", "纯白背景，产品居中，占画面85%"), ("场景图", "通勤电车内佩戴场景"), ("卖点图", "细节特写，标注核心参数")]
        .iter()
        .zip(1u32..)
        .map(|((kind, composition), id)| ImagePlan {
            id,
            kind: kind.to_string(),
            composition: composition.to_string(),
            main_copy: "毎日をもっと快適に".to_string(),
            sub_copy: "こだわりの品質".to_string(),
            tips: "柔光箱，45度侧光".to_string(),
        })
        .collect()
}

fn demo_plan(name: &str, strategy: &str, title: &str, scores: Scores) -> OptimizationPlan {
    OptimizationPlan {
        name: name.to_string(),
        scores,
        title: title.to_string(),
        title_analysis: "核心词前置，长尾词补充".to_string(),
        catch_copy: "【高音質】毎日の通勤を快適に".to_string(),
        description: "<h3>商品の特徴</h3><p>デモ用の説明文です。</p>".to_string(),
        images: demo_images(),
        qa: "Q: 防水ですか？\nA: はい、IPX5相当です。".to_string(),
        strategy: strategy.to_string(),
    }
}

fn placeholder_svg(plan: &ImagePlan) -> String {
    let color = SLOT_COLORS[plan.id as usize % SLOT_COLORS.len()];
    format!(r#"<svg width="400" height="400" xmlns="http://www.w3.org/2000/svg">
            <defs>
                <linearGradient id="grad" x1="0%" y1="0%" x2="100%" y2="100%">
                    <stop offset="0%" style="stop-color:{color};stop-opacity:1" />
                    <stop offset="100%" style="stop-color:{color};stop-opacity:0.6" />
                </linearGradient>
            </defs>
            <rect width="400" height="400" fill="url(#grad)" />
            <text x="200" y="190" font-family="Arial, sans-serif" font-size="24" font-weight="bold"
                  text-anchor="middle" fill="white">#{id} {kind}</text>
            <text x="200" y="240" font-family="Arial, sans-serif" font-size="12"
                  text-anchor="middle" fill="white" opacity="0.8">Demo listing image</text>
        </svg>"#, id = plan.id, kind = plan.kind)
}

#[async_trait]
impl GenerationGateway for DemoGateway {
    async fn extract_product_info(&self, url: &str) -> Result<ExtractedProductInfo, GatewayError> {
        info!("Using demo mode - canned extraction for {}", url);
        Ok(ExtractedProductInfo {
            title: "ワイヤレスイヤホン Bluetooth 5.3 ノイズキャンセリング".to_string(),
            price: "¥3,980".to_string(),
            description: "デモモードの商品説明です。最大30時間再生、IPX5防水、片耳約4g。".to_string(),
        })
    }

    async fn perform_diagnosis(&self, platform: Platform, input: &ProductInput) -> Result<DiagnosisResult, GatewayError> {
        info!("Using demo mode - canned diagnosis for '{}' on {}", input.title, platform);
        Ok(DiagnosisResult {
            competitor_analysis: vec![
                CompetitorAnalysis {
                    name: "竞品A".to_string(),
                    pros: strings(&["评价数量多", "主图场景感强"]),
                    cons: strings(&["标题关键词堆砌"]),
                },
                CompetitorAnalysis {
                    name: "竞品B".to_string(),
                    pros: strings(&["价格优势明显"]),
                    cons: strings(&["详情页缺少规格表", "无Q&A"]),
                },
            ],
            self_analysis: SelfAnalysis {
                pros: strings(&["续航参数领先"]),
                cons: strings(&["标题缺少核心搜索词", "附图数量不足"]),
                suggestions: strings(&["标题前40字放入核心词", "补充使用场景图"]),
            },
        })
    }

    async fn generate_optimizations(
        &self,
        platform: Platform,
        input: &ProductInput,
        _diagnosis: &DiagnosisResult,
    ) -> Result<OptimizationResult, GatewayError> {
        info!("Using demo mode - canned plans on {}", platform);
        let title = if input.title.trim().is_empty() { "商品" } else { input.title.trim() };
        let score = |k, l, v, t, e| Scores { keywords: k, logic: l, visual: v, trust: t, experience: e };
        Ok(OptimizationResult {
            plans: vec![
                demo_plan("方案A：激进转化型", "强调促销与即时性", &format!("【送料無料】{title}"), score(92.0, 80.0, 75.0, 70.0, 78.0)),
                demo_plan("方案B：品质信赖型", "突出认证与售后", &format!("{title}【1年保証】"), score(78.0, 88.0, 72.0, 93.0, 80.0)),
                demo_plan("方案C：场景体验型", "以使用场景驱动点击", &format!("{title} 通勤 在宅"), score(75.0, 76.0, 94.0, 74.0, 90.0)),
            ],
        })
    }

    async fn generate_listing_image(
        &self,
        _reference: &ReferenceImage,
        plan: &ImagePlan,
        _product_description: &str,
    ) -> Result<GeneratedImage, GatewayError> {
        info!("Using demo mode - no real images generated");
        let encoded = base64::engine::general_purpose::STANDARD.encode(placeholder_svg(plan).as_bytes());
        GeneratedImage::from_base64(plan.id, "image/svg+xml", &encoded).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_plans_are_complete() {
        let result = DemoGateway
            .generate_optimizations(Platform::Yahoo, &ProductInput::default(), &DiagnosisResult::default())
            .await
            .unwrap();
        assert_eq!(result.plans.len(), 3);
        assert!(result.plans.iter().all(|p| p.images.iter().map(|i| i.id).eq(1..=3)));
    }

    #[tokio::test]
    async fn demo_image_is_an_svg_for_the_slot() {
        let reference = ReferenceImage { mime_type: "image/png", data: bytes::Bytes::from_static(b"\x89PNG") };
        let images = demo_images();
        let img = DemoGateway.generate_listing_image(&reference, &images[1], "").await.unwrap();
        assert_eq!(img.id, 2);
        assert!(img.data_url().starts_with("data:image/svg+xml;base64,"));
        assert!(String::from_utf8_lossy(&img.data).contains("#2 场景图"));
    }
}
