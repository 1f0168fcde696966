use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use tracing::warn;

pub const MAX_COMPETITOR_URLS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "Yahoo!ショッピング")] Yahoo,
    #[serde(rename = "楽天市場")] Rakuten,
    #[serde(rename = "Amazon Japan")] Amazon,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Yahoo, Platform::Rakuten, Platform::Amazon];

    pub fn label(self) -> &'static str {
        match self {
            Platform::Yahoo => "Yahoo!ショッピング",
            Platform::Rakuten => "楽天市場",
            Platform::Amazon => "Amazon Japan",
        }
    }

    /// Listing rules shown on the platform-selection screen.
    pub fn rules(self) -> &'static [&'static str] {
        match self {
            Platform::Yahoo => &[
                "标题：全角100字以内 (SEO重组)",
                "Catch Copy：全角30字以内 (半角空格分隔)",
                "说明文：HTML小标题分段 (Max 800字)",
                "图片：主图1 + 附图15-19张 (1000px)",
                "禁止：夸大/医疗暗示/他社Logo",
            ],
            Platform::Rakuten => &[
                "标题：全角127字以内 (前40字核心)",
                "Catch Copy：全角87字以内 (移动端适配)",
                "说明文：含“手机专用”及“基本规格”段落",
                "图片：主图1 + 附图19张 (正方形)",
                "风格：重视促销感和Ranking即时性",
            ],
            Platform::Amazon => &[
                "标题：全角100字 (核心词前置)",
                "五点描述：【小标题】+ 详细场景化说明",
                "图片：主图白底 + 8张附图 (1600px)",
                "说明文：建议A+标准模块结构",
                "搜索词：半角空格分隔",
            ],
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct PlatformInfo {
    pub platform: Platform,
    pub rules: Vec<&'static str>,
}

impl From<Platform> for PlatformInfo {
    fn from(platform: Platform) -> Self {
        Self { platform, rules: platform.rules().to_vec() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub product_url: String,
    pub title: String,
    pub price: String,
    pub description: String,
    pub competitor_urls: Vec<String>,
    pub competitor_info: String, // manual notes or an extracted summary
    pub core_features: String,
}

impl Default for ProductInput {
    fn default() -> Self {
        Self {
            product_url: String::new(),
            title: String::new(),
            price: String::new(),
            description: String::new(),
            competitor_urls: vec![String::new()],
            competitor_info: String::new(),
            core_features: String::new(),
        }
    }
}

impl ProductInput {
    pub fn filled_competitor_urls(&self) -> Vec<&str> {
        self.competitor_urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).collect()
    }
}

/// Partial update of the scalar input fields. Competitor URLs have their own actions.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct InputPatch {
    #[serde(default)] pub product_url: Option<String>,
    #[serde(default)] pub title: Option<String>,
    #[serde(default)] pub price: Option<String>,
    #[serde(default)] pub description: Option<String>,
    #[serde(default)] pub competitor_info: Option<String>,
    #[serde(default)] pub core_features: Option<String>,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ExtractedProductInfo {
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub title: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub price: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub description: String,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CompetitorAnalysis {
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub name: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub pros: Vec<String>,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub cons: Vec<String>,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SelfAnalysis {
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub pros: Vec<String>,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub cons: Vec<String>,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub suggestions: Vec<String>,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub competitor_analysis: Vec<CompetitorAnalysis>,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub self_analysis: SelfAnalysis,
}

/// Five 0–100 sub-scores. Missing or null values decode as 0.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct Scores {
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub keywords: f64,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub logic: f64,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub visual: f64,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub trust: f64,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub experience: f64,
}

impl Scores {
    pub fn clamped(self) -> Self {
        let c = |v: f64| if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 };
        Self {
            keywords: c(self.keywords),
            logic: c(self.logic),
            visual: c(self.visual),
            trust: c(self.trust),
            experience: c(self.experience),
        }
    }
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlan {
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub id: u32,
    #[serde(default, rename = "type")] #[serde_as(deserialize_as = "DefaultOnNull")] pub kind: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub composition: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub main_copy: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub sub_copy: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub tips: String,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationPlan {
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub name: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub scores: Scores,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub title: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub title_analysis: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub catch_copy: String, // bullet points for Amazon
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub description: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub images: Vec<ImagePlan>,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub qa: String,
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub strategy: String,
}

impl OptimizationPlan {
    pub fn image(&self, id: u32) -> Option<&ImagePlan> {
        self.images.iter().find(|img| img.id == id)
    }
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct OptimizationResult {
    #[serde(default)] #[serde_as(deserialize_as = "DefaultOnNull")] pub plans: Vec<OptimizationPlan>,
}

impl OptimizationResult {
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Image ids key the generation slots, so a plan with missing (zero) or
    /// repeated ids is renumbered 1..=n in list order.
    pub fn normalize_image_ids(&mut self) {
        for plan in &mut self.plans {
            let mut seen = HashSet::new();
            if plan.images.iter().all(|img| img.id != 0 && seen.insert(img.id)) {
                continue;
            }
            warn!("⚠️ Plan '{}' has missing or duplicate image ids, renumbering", plan.name);
            for (img, id) in plan.images.iter_mut().zip(1u32..) {
                img.id = id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn platform_uses_marketplace_names_on_the_wire() {
        assert_eq!(serde_json::to_value(Platform::Rakuten).unwrap(), json!("楽天市場"));
        let p: Platform = serde_json::from_value(json!("Amazon Japan")).unwrap();
        assert_eq!(p, Platform::Amazon);
        assert!(Platform::ALL.iter().all(|p| p.rules().len() == 5));
    }

    #[test]
    fn default_input_has_one_empty_competitor_slot() {
        let input = ProductInput::default();
        assert_eq!(input.competitor_urls, vec![String::new()]);
        assert!(input.filled_competitor_urls().is_empty());
    }

    #[test]
    fn missing_and_null_plan_fields_default_to_zero_values() {
        let result: OptimizationResult = serde_json::from_value(json!({
            "plans": [
                { "name": "方案A", "scores": { "keywords": 80, "logic": null }, "images": null },
                { "title": "t" }
            ]
        }))
        .unwrap();
        assert_eq!(result.plans.len(), 2);
        assert_eq!(result.plans[0].scores, Scores { keywords: 80.0, ..Scores::default() });
        assert!(result.plans[0].images.is_empty());
        assert_eq!(result.plans[1].scores, Scores::default());
        assert_eq!(result.plans[1].name, "");
    }

    #[test]
    fn missing_plan_list_is_empty() {
        let result: OptimizationResult = serde_json::from_value(json!({})).unwrap();
        assert!(result.is_empty());
        let result: OptimizationResult = serde_json::from_value(json!({ "plans": null })).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn missing_or_duplicate_image_ids_are_renumbered() {
        let mut result: OptimizationResult = serde_json::from_value(json!({ "plans": [
            { "name": "A", "images": [{ "type": "主图" }, { "type": "场景图" }, { "type": "细节图" }] },
            { "name": "B", "images": [{ "id": 2 }, { "id": 2 }] },
            { "name": "C", "images": [{ "id": 5 }, { "id": 3 }] }
        ] }))
        .unwrap();
        result.normalize_image_ids();
        let ids: Vec<Vec<u32>> = result.plans.iter().map(|p| p.images.iter().map(|i| i.id).collect()).collect();
        assert_eq!(ids, vec![vec![1, 2, 3], vec![1, 2], vec![5, 3]]);
        assert_eq!(result.plans[0].image(2).map(|i| i.kind.as_str()), Some("场景图"));
    }

    #[test]
    fn image_plan_reads_type_and_camel_case_copy() {
        let plan: ImagePlan = serde_json::from_value(json!({
            "id": 2, "type": "场景图", "mainCopy": "快適", "subCopy": "一日中"
        }))
        .unwrap();
        assert_eq!(plan.id, 2);
        assert_eq!(plan.kind, "场景图");
        assert_eq!(plan.main_copy, "快適");
        assert_eq!(plan.tips, "");
    }

    #[test]
    fn scores_are_clamped_for_rendering() {
        let s = Scores { keywords: 130.0, logic: -5.0, visual: f64::NAN, trust: 50.0, experience: 100.0 };
        assert_eq!(s.clamped(), Scores { keywords: 100.0, logic: 0.0, visual: 0.0, trust: 50.0, experience: 100.0 });
    }
}
