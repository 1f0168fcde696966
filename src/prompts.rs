//! Prompt text and the strict schema for the optimization step.

use serde_json::{json, Value};

use crate::models::{DiagnosisResult, ImagePlan, Platform, ProductInput};
use crate::sanitize::clean_url_for_search;

/// Shown by the extraction prompt as the title when the exact page cannot be found.
pub const EXTRACTION_FAILED_TITLE: &str = "提取失败，请手动输入";

pub const SYSTEM_INSTRUCTION: &str = "\
You are a listing optimization expert for cross-border e-commerce into Japan.
You know the conversion funnel (exposure -> click -> add to cart -> order) and the ranking
algorithms and shopper psychology of Yahoo!ショッピング, 楽天市場 and Amazon Japan.
Write all analysis and explanations in Chinese. Write all listing content (titles, copy,
descriptions, Q&A) in natural, professional business Japanese (丁寧語/尊敬語).";

pub fn extraction_prompt(raw_url: &str) -> String {
    let search_url = clean_url_for_search(raw_url);
    format!(
        "Task: extract the page information of one specific e-commerce product link.\n\
         \n\
         Target link: {search_url}\n\
         (as entered: {raw_url})\n\
         \n\
         1. Search for the target link with Google Search.\n\
         2. Find the product page that matches this exact link (Amazon.co.jp, Rakuten, Yahoo! Shopping, ...).\n\
         3. Only use information from that page. Never fill in details from similar products.\n\
         \n\
         Fields:\n\
         - title: the full product title as shown on the page (Japanese). If it cannot be confirmed, return \"{EXTRACTION_FAILED_TITLE}\".\n\
         - price: the displayed price including the currency symbol.\n\
         - description: a detailed summary of features, specs and selling points (Japanese, at least 200 characters).\n\
         \n\
         Reply with plain JSON only, no markdown fences:\n\
         {{\"title\": \"...\", \"price\": \"...\", \"description\": \"...\"}}"
    )
}

pub fn diagnosis_prompt(platform: Platform, input: &ProductInput) -> String {
    let search_url = clean_url_for_search(&input.product_url);
    let competitors = input.filled_competitor_urls().join(", ");
    format!(
        "Analyse the following {platform} listing along the funnel exposure -> click -> add to cart -> order.\n\
         \n\
         Target product:\n\
         URL: {search_url}\n\
         Title: {title}\n\
         Price: {price}\n\
         Details: {description}\n\
         Extra selling points: {features}\n\
         \n\
         Competitors:\n\
         URLs: {competitors}\n\
         Notes: {notes}\n\
         \n\
         1. Use Google Search on the target URL to check its positioning and reviews, if it exists.\n\
         2. Use Google Search on each competitor URL and analyse its strengths and weaknesses.\n\
         3. Compare them in depth.\n\
         \n\
         Reply with strict JSON only, no markdown fences, in this shape:\n\
         {{\n\
           \"competitorAnalysis\": [{{\"name\": \"...\", \"pros\": [\"...\"], \"cons\": [\"...\"]}}],\n\
           \"selfAnalysis\": {{\"pros\": [\"...\"], \"cons\": [\"...\"], \"suggestions\": [\"...\"]}}\n\
         }}\n\
         All analysis text must be in Chinese.",
        title = input.title,
        price = input.price,
        description = input.description,
        features = input.core_features,
        notes = input.competitor_info,
    )
}

fn platform_constraints(platform: Platform) -> &'static str {
    match platform {
        Platform::Yahoo => "\
1. Title: at most 100 full-width characters. Rework keywords for SEO and explain keyword weighting in titleAnalysis.
2. Catch copy: at most 30 full-width characters (60 bytes), separated by half-width spaces.
3. Description: at most 800 full-width characters, HTML using h3 and p, keywords woven in naturally.
4. Images: 1 main image + 15 to 19 sub images.
5. Forbidden: exaggeration, medical claims, other companies' logos.",
        Platform::Rakuten => "\
1. Title: at most 127 full-width characters; the first 40 characters (the mobile display area) matter most.
2. Catch copy: within 87 full-width characters, usable on PC and mobile, separated by half-width spaces.
3. Description:
   - PC version: clearly sectioned HTML.
   - Smartphone version: no div tags, only br, b and font; short and readable.
   - Must include a 基本仕様 section listing specs, materials, certifications and warranty.
4. Images: 1 main image + 19 sub images.",
        Platform::Amazon => "\
1. Title: at most 100 full-width characters, core keywords within the first 40.
2. Bullet points: exactly 5, each formatted as 【selling point】 followed by a concrete usage scenario and benefit.
3. Search terms: separated by half-width spaces.
4. Description / A+: suggest an A+ content module structure (brand story -> highlights -> features -> scenes -> specs).
5. Images: 1 main image on pure white + 8 sub images, ordered main -> scene -> selling points/details -> size -> package.",
    }
}

fn catch_copy_mapping(platform: Platform) -> &'static str {
    match platform {
        Platform::Yahoo => "catch copy (30 characters or fewer)",
        Platform::Rakuten => "catch copy (87 characters or fewer)",
        Platform::Amazon => "the five bullet points in one string, separated by newlines",
    }
}

fn description_mapping(platform: Platform) -> &'static str {
    match platform {
        Platform::Yahoo => "HTML text",
        Platform::Rakuten => "PC description, smartphone description and 基本仕様, clearly separated",
        Platform::Amazon => "A+ page structure copy (or a standard description)",
    }
}

fn image_count(platform: Platform) -> &'static str {
    match platform {
        Platform::Yahoo | Platform::Rakuten => "16 to 20 entries (1 main + 15 to 19 sub)",
        Platform::Amazon => "9 entries (1 main + 8 sub)",
    }
}

pub fn optimization_prompt(platform: Platform, input: &ProductInput, diagnosis: &DiagnosisResult) -> String {
    let diagnosis_context = serde_json::to_string(diagnosis).unwrap_or_default();
    format!(
        "Diagnosis result: {diagnosis_context}\n\
         \n\
         Product: {title}\n\
         Extra selling points: {features}\n\
         \n\
         Create 3 clearly different listing plans (Plan A/B/C) for {platform}.\n\
         \n\
         Platform constraints (high priority):\n\
         {constraints}\n\
         \n\
         Field mapping:\n\
         - title: the complete optimized title.\n\
         - titleAnalysis: keyword weighting analysis.\n\
         - catchCopy: {catch_copy}.\n\
         - description: {description}.\n\
         - images: {images}, with sequential ids starting at 1.\n\
         - scores: each of keywords, logic, visual, trust, experience from 0 to 100.\n\
         - strategy, titleAnalysis and image tips in Chinese.\n\
         - title, catchCopy, description, qa and image copy in natural business Japanese.",
        title = input.title,
        features = input.core_features,
        constraints = platform_constraints(platform),
        catch_copy = catch_copy_mapping(platform),
        description = description_mapping(platform),
        images = image_count(platform),
    )
}

/// Response schema for the optimization call (Gemini OpenAPI subset).
pub fn optimization_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "plans": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING", "description": "e.g. 方案A：激进转化型" },
                        "scores": {
                            "type": "OBJECT",
                            "properties": {
                                "keywords": { "type": "NUMBER" },
                                "logic": { "type": "NUMBER" },
                                "visual": { "type": "NUMBER" },
                                "trust": { "type": "NUMBER" },
                                "experience": { "type": "NUMBER" }
                            }
                        },
                        "title": { "type": "STRING" },
                        "titleAnalysis": { "type": "STRING" },
                        "catchCopy": { "type": "STRING", "description": "Yahoo/Rakuten catch copy or Amazon bullet points" },
                        "description": { "type": "STRING" },
                        "qa": { "type": "STRING", "description": "Q&A section content" },
                        "strategy": { "type": "STRING" },
                        "images": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "id": { "type": "INTEGER" },
                                    "type": { "type": "STRING" },
                                    "composition": { "type": "STRING" },
                                    "mainCopy": { "type": "STRING" },
                                    "subCopy": { "type": "STRING" },
                                    "tips": { "type": "STRING" }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

pub fn image_prompt(plan: &ImagePlan, product_description: &str) -> String {
    format!(
        "You are a professional e-commerce product photographer and visual editor.\n\
         \n\
         Task: create a high-quality selling image from the provided reference product photo, following this plan:\n\
         Image type: {kind}\n\
         Composition: {composition}\n\
         Visual style / tips: {tips}\n\
         Mood (from copy): {main} {sub}\n\
         \n\
         Product info:\n\
         {product_description}\n\
         \n\
         Requirements:\n\
         1. Keep the product from the reference image recognizable while making it look professional and high-end.\n\
         2. Place it in the background and context described by the composition and tips.\n\
         3. Photorealistic lighting and shadows.\n\
         4. Aspect ratio 1:1 (square).",
        kind = plan.kind,
        composition = plan.composition,
        tips = plan.tips,
        main = plan.main_copy,
        sub = plan.sub_copy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnosis_prompt_uses_clean_url_and_filled_competitors() {
        let input = ProductInput {
            product_url: "https://www.amazon.co.jp/dp/B0X?utm_source=x&th=1".into(),
            title: "Wireless Earbuds X1".into(),
            competitor_urls: vec!["https://a.jp/1".into(), "  ".into(), "https://b.jp/2".into()],
            ..ProductInput::default()
        };
        let prompt = diagnosis_prompt(Platform::Amazon, &input);
        assert!(prompt.contains("URL: https://www.amazon.co.jp/dp/B0X?th=1"));
        assert!(prompt.contains("URLs: https://a.jp/1, https://b.jp/2\n"));
        assert!(prompt.contains("Amazon Japan"));
        assert!(prompt.contains("Wireless Earbuds X1"));
    }

    #[test]
    fn optimization_prompt_carries_platform_constraints() {
        let input = ProductInput::default();
        let diagnosis = DiagnosisResult::default();
        let rakuten = optimization_prompt(Platform::Rakuten, &input, &diagnosis);
        assert!(rakuten.contains("基本仕様"));
        assert!(!rakuten.contains("Bullet points"));
        let amazon = optimization_prompt(Platform::Amazon, &input, &diagnosis);
        assert!(amazon.contains("9 entries"));
        assert!(amazon.contains("\"selfAnalysis\""));
    }

    #[test]
    fn extraction_prompt_keeps_the_raw_url_for_reference() {
        let prompt = extraction_prompt("https://item.rakuten.co.jp/s/x?ref=top");
        assert!(prompt.contains("Target link: https://item.rakuten.co.jp/s/x\n"));
        assert!(prompt.contains("(as entered: https://item.rakuten.co.jp/s/x?ref=top)"));
    }

    #[test]
    fn schema_describes_plan_fields() {
        let schema = optimization_schema();
        let plan = &schema["properties"]["plans"]["items"]["properties"];
        for field in ["name", "scores", "title", "titleAnalysis", "catchCopy", "description", "qa", "strategy", "images"] {
            assert!(plan.get(field).is_some(), "missing {field}");
        }
        assert_eq!(plan["images"]["items"]["properties"]["id"]["type"], "INTEGER");
    }
}
