//! The listing wizard: one owned state aggregate and the transitions a user can trigger.
//!
//! Gateway calls are split into `begin_*`, which checks guards, raises the busy
//! flag and hands out a ticket, and `settle_*`, which applies the outcome. The
//! caller awaits the gateway in between without holding the wizard. A reset
//! bumps the epoch, so a ticket issued before it settles as [`Settled::Stale`]
//! and changes nothing.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{GatewayError, Rejection, StepError};
use crate::images::{GeneratedImage, ReferenceImage};
use crate::models::{
    DiagnosisResult, ExtractedProductInfo, ImagePlan, InputPatch, OptimizationPlan, OptimizationResult, Platform,
    ProductInput, MAX_COMPETITOR_URLS,
};

pub const EMPTY_PLANS_MESSAGE: &str = "未生成有效的优化方案，请尝试重新生成。";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Platform,
    Input,
    Diagnosis,
    Optimization,
    ImageGeneration,
}

impl Step {
    pub const ALL: [Step; 5] = [Step::Platform, Step::Input, Step::Diagnosis, Step::Optimization, Step::ImageGeneration];

    pub fn name(self) -> &'static str {
        match self {
            Step::Platform => "PLATFORM",
            Step::Input => "INPUT",
            Step::Diagnosis => "DIAGNOSIS",
            Step::Optimization => "OPTIMIZATION",
            Step::ImageGeneration => "IMAGE_GENERATION",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Platform => "平台选择",
            Step::Input => "信息录入",
            Step::Diagnosis => "深度诊断",
            Step::Optimization => "方案生成",
            Step::ImageGeneration => "视觉生成",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::Platform => "Step 1: 选择电商平台",
            Step::Input => "Step 2: 输入产品与竞品链接",
            Step::Diagnosis => "Step 3: AI 深度诊断",
            Step::Optimization => "Step 4: 制定优化方案",
            Step::ImageGeneration => "Step 5: AI 视觉生成",
        }
    }
}

/// Outcome of applying a gateway result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Applied,
    Failed,
    /// The wizard was reset after the ticket was issued; nothing changed.
    Stale,
}

#[derive(Debug)]
pub struct ExtractionTicket {
    epoch: u64,
    pub url: String,
}

#[derive(Debug)]
pub struct DiagnosisTicket {
    epoch: u64,
    pub platform: Platform,
    pub input: ProductInput,
}

#[derive(Debug)]
pub struct OptimizationTicket {
    epoch: u64,
    pub platform: Platform,
    pub input: ProductInput,
    pub diagnosis: DiagnosisResult,
}

#[derive(Debug)]
pub struct ImageTicket {
    epoch: u64,
    pub reference: ReferenceImage,
    pub plan: ImagePlan,
    pub product_description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Idle,
    InFlight,
    Done(GeneratedImage),
    Failed(String),
}

/// Image-generation step state for the selected plan.
#[derive(Debug, Clone, Default)]
pub struct ImageStudio {
    reference: Option<ReferenceImage>,
    slots: BTreeMap<u32, SlotState>,
    error: Option<String>,
}

impl ImageStudio {
    fn for_plan(plan: &OptimizationPlan) -> Self {
        Self {
            reference: None,
            slots: plan.images.iter().map(|img| (img.id, SlotState::Idle)).collect(),
            error: None,
        }
    }

    pub fn slot(&self, id: u32) -> Option<&SlotState> {
        self.slots.get(&id)
    }

    pub fn reference(&self) -> Option<&ReferenceImage> {
        self.reference.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn can_generate(&self, id: u32) -> bool {
        self.reference.is_some() && matches!(self.slots.get(&id), Some(s) if *s != SlotState::InFlight)
    }
}

#[derive(Debug, Clone)]
pub struct Wizard {
    step: Step,
    platform: Option<Platform>,
    input: ProductInput,
    diagnosis: Option<DiagnosisResult>,
    optimization: Option<OptimizationResult>,
    selected_plan: Option<OptimizationPlan>,
    busy: bool,
    error: Option<String>,
    extracting: bool,
    extract_error: Option<String>,
    studio: ImageStudio,
    epoch: u64,
}

impl Default for Wizard {
    fn default() -> Self {
        Self {
            step: Step::Platform,
            platform: None,
            input: ProductInput::default(),
            diagnosis: None,
            optimization: None,
            selected_plan: None,
            busy: false,
            error: None,
            extracting: false,
            extract_error: None,
            studio: ImageStudio::default(),
            epoch: 0,
        }
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step { self.step }
    pub fn platform(&self) -> Option<Platform> { self.platform }
    pub fn input(&self) -> &ProductInput { &self.input }
    pub fn diagnosis(&self) -> Option<&DiagnosisResult> { self.diagnosis.as_ref() }
    pub fn optimization(&self) -> Option<&OptimizationResult> { self.optimization.as_ref() }
    pub fn selected_plan(&self) -> Option<&OptimizationPlan> { self.selected_plan.as_ref() }
    pub fn is_busy(&self) -> bool { self.busy }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn is_extracting(&self) -> bool { self.extracting }
    pub fn extract_error(&self) -> Option<&str> { self.extract_error.as_deref() }
    pub fn studio(&self) -> &ImageStudio { &self.studio }

    fn require_step(&self, step: Step) -> Result<(), Rejection> {
        if self.step == step { Ok(()) } else { Err(Rejection::WrongStep(self.step.name())) }
    }

    fn require_idle(&self) -> Result<(), Rejection> {
        if self.busy { Err(Rejection::Busy) } else { Ok(()) }
    }

    fn is_stale(&self, epoch: u64, what: &str) -> bool {
        if epoch != self.epoch {
            debug!("discarding {} result issued before a reset", what);
            return true;
        }
        false
    }

    /// Any state back to the initial one. In-flight results are discarded when they arrive.
    pub fn reset(&mut self) {
        info!("🔄 Resetting wizard from {}", self.step.name());
        *self = Self { epoch: self.epoch + 1, ..Self::default() };
    }

    pub fn select_platform(&mut self, platform: Platform) -> Result<(), Rejection> {
        self.require_step(Step::Platform)?;
        info!("🛒 Platform selected: {}", platform);
        self.platform = Some(platform);
        self.error = None;
        self.step = Step::Input;
        Ok(())
    }

    // --- input editing ---

    fn require_editable(&self) -> Result<(), Rejection> {
        self.require_step(Step::Input)?;
        self.require_idle()
    }

    pub fn update_input(&mut self, patch: InputPatch) -> Result<(), Rejection> {
        self.require_editable()?;
        let input = &mut self.input;
        let fields = [
            (patch.product_url, &mut input.product_url),
            (patch.title, &mut input.title),
            (patch.price, &mut input.price),
            (patch.description, &mut input.description),
            (patch.competitor_info, &mut input.competitor_info),
            (patch.core_features, &mut input.core_features),
        ];
        for (value, field) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        Ok(())
    }

    pub fn set_competitor_url(&mut self, index: usize, url: String) -> Result<(), Rejection> {
        self.require_editable()?;
        let slot = self.input.competitor_urls.get_mut(index).ok_or(Rejection::NoSuchCompetitor(index))?;
        *slot = url;
        Ok(())
    }

    pub fn add_competitor_url(&mut self) -> Result<(), Rejection> {
        self.require_editable()?;
        if self.input.competitor_urls.len() >= MAX_COMPETITOR_URLS {
            return Err(Rejection::TooManyCompetitors(MAX_COMPETITOR_URLS));
        }
        self.input.competitor_urls.push(String::new());
        Ok(())
    }

    pub fn remove_competitor_url(&mut self, index: usize) -> Result<(), Rejection> {
        self.require_editable()?;
        if index >= self.input.competitor_urls.len() {
            return Err(Rejection::NoSuchCompetitor(index));
        }
        if self.input.competitor_urls.len() == 1 {
            return Err(Rejection::LastCompetitor);
        }
        self.input.competitor_urls.remove(index);
        Ok(())
    }

    // --- extraction ---

    pub fn begin_extraction(&mut self) -> Result<ExtractionTicket, Rejection> {
        self.require_editable()?;
        if self.extracting {
            return Err(Rejection::Busy);
        }
        let url = self.input.product_url.trim();
        if url.is_empty() {
            return Err(Rejection::EmptyUrl);
        }
        let ticket = ExtractionTicket { epoch: self.epoch, url: url.to_string() };
        self.extracting = true;
        self.extract_error = None;
        Ok(ticket)
    }

    /// Fills title, price and description with the non-empty extracted values.
    pub fn settle_extraction(
        &mut self,
        ticket: ExtractionTicket,
        outcome: Result<ExtractedProductInfo, GatewayError>,
    ) -> Settled {
        if self.is_stale(ticket.epoch, "extraction") {
            return Settled::Stale;
        }
        self.extracting = false;
        match outcome {
            Ok(info) => {
                let fills = [
                    (info.title, &mut self.input.title),
                    (info.price, &mut self.input.price),
                    (info.description, &mut self.input.description),
                ];
                for (value, field) in fills {
                    if !value.trim().is_empty() {
                        *field = value;
                    }
                }
                info!("✅ Extracted product info from {}", ticket.url);
                Settled::Applied
            }
            Err(e) => {
                let err = StepError::Extraction(e);
                error!("❌ {}", err);
                self.extract_error = Some(err.user_message());
                Settled::Failed
            }
        }
    }

    // --- diagnosis ---

    pub fn can_start_diagnosis(&self) -> bool {
        self.step == Step::Input
            && !self.busy
            && !self.extracting
            && self.platform.is_some()
            && !self.input.title.trim().is_empty()
    }

    pub fn begin_diagnosis(&mut self) -> Result<DiagnosisTicket, Rejection> {
        self.require_editable()?;
        if self.extracting {
            return Err(Rejection::Busy);
        }
        let platform = self.platform.ok_or(Rejection::NoPlatform)?;
        if self.input.title.trim().is_empty() {
            return Err(Rejection::EmptyTitle);
        }
        self.busy = true;
        self.error = None;
        Ok(DiagnosisTicket { epoch: self.epoch, platform, input: self.input.clone() })
    }

    pub fn settle_diagnosis(
        &mut self,
        ticket: DiagnosisTicket,
        outcome: Result<DiagnosisResult, GatewayError>,
    ) -> Settled {
        if self.is_stale(ticket.epoch, "diagnosis") {
            return Settled::Stale;
        }
        self.busy = false;
        match outcome {
            Ok(result) => {
                info!("✅ Diagnosis complete with {} competitors", result.competitor_analysis.len());
                self.diagnosis = Some(result);
                self.error = None;
                self.step = Step::Diagnosis;
                Settled::Applied
            }
            Err(e) => {
                let err = StepError::Diagnosis(e);
                error!("❌ {}", err);
                self.error = Some(err.user_message());
                Settled::Failed
            }
        }
    }

    // --- optimization ---

    fn in_optimization_phase(&self) -> bool {
        matches!(self.step, Step::Diagnosis | Step::Optimization)
    }

    pub fn can_generate_plans(&self) -> bool {
        self.in_optimization_phase() && !self.busy && self.platform.is_some() && self.diagnosis.is_some()
    }

    /// From DIAGNOSIS, or again from OPTIMIZATION to regenerate the plans.
    pub fn begin_optimization(&mut self) -> Result<OptimizationTicket, Rejection> {
        if !self.in_optimization_phase() {
            return Err(Rejection::WrongStep(self.step.name()));
        }
        self.require_idle()?;
        let platform = self.platform.ok_or(Rejection::NoPlatform)?;
        let diagnosis = self.diagnosis.clone().ok_or(Rejection::NoDiagnosis)?;
        self.busy = true;
        self.error = None;
        Ok(OptimizationTicket { epoch: self.epoch, platform, input: self.input.clone(), diagnosis })
    }

    /// An empty plan list still advances; the view shows it as the empty state.
    pub fn settle_optimization(
        &mut self,
        ticket: OptimizationTicket,
        outcome: Result<OptimizationResult, GatewayError>,
    ) -> Settled {
        if self.is_stale(ticket.epoch, "optimization") {
            return Settled::Stale;
        }
        self.busy = false;
        match outcome {
            Ok(mut result) => {
                result.normalize_image_ids();
                info!("✅ Generated {} optimization plans", result.plans.len());
                self.optimization = Some(result);
                self.error = None;
                self.step = Step::Optimization;
                Settled::Applied
            }
            Err(e) => {
                let err = StepError::Optimization(e);
                error!("❌ {}", err);
                self.error = Some(err.user_message());
                Settled::Failed
            }
        }
    }

    pub fn can_select_plan(&self) -> bool {
        self.step == Step::Optimization && !self.busy && self.optimization.as_ref().is_some_and(|o| !o.is_empty())
    }

    pub fn select_plan(&mut self, index: usize) -> Result<(), Rejection> {
        self.require_step(Step::Optimization)?;
        self.require_idle()?;
        let plan = self
            .optimization
            .as_ref()
            .and_then(|o| o.plans.get(index))
            .cloned()
            .ok_or(Rejection::NoSuchPlan(index))?;
        info!("📌 Selected plan '{}' with {} image slots", plan.name, plan.images.len());
        self.studio = ImageStudio::for_plan(&plan);
        self.selected_plan = Some(plan);
        self.error = None;
        self.step = Step::ImageGeneration;
        Ok(())
    }

    // --- image generation ---

    pub fn set_reference_image(&mut self, image: ReferenceImage) -> Result<(), Rejection> {
        self.require_step(Step::ImageGeneration)?;
        info!("🖼️ Reference image set ({}, {} bytes)", image.mime_type, image.data.len());
        self.studio.reference = Some(image);
        Ok(())
    }

    pub fn can_generate_image(&self, id: u32) -> bool {
        self.step == Step::ImageGeneration && self.studio.can_generate(id)
    }

    pub fn begin_image(&mut self, id: u32) -> Result<ImageTicket, Rejection> {
        self.require_step(Step::ImageGeneration)?;
        let reference = self.studio.reference.clone().ok_or(Rejection::NoReferenceImage)?;
        let plan = self
            .selected_plan
            .as_ref()
            .and_then(|p| p.image(id))
            .cloned()
            .ok_or(Rejection::NoSuchImage(id))?;
        let slot = self.studio.slots.entry(id).or_insert(SlotState::Idle);
        if *slot == SlotState::InFlight {
            return Err(Rejection::SlotBusy(id));
        }
        *slot = SlotState::InFlight;
        self.studio.error = None;
        Ok(ImageTicket {
            epoch: self.epoch,
            reference,
            plan,
            product_description: self.input.description.clone(),
        })
    }

    /// Touches only the ticket's slot; sibling slots keep their state.
    pub fn settle_image(&mut self, ticket: ImageTicket, outcome: Result<GeneratedImage, GatewayError>) -> Settled {
        if self.is_stale(ticket.epoch, "image") {
            return Settled::Stale;
        }
        let id = ticket.plan.id;
        let Some(slot) = self.studio.slots.get_mut(&id).filter(|s| **s == SlotState::InFlight) else {
            debug!("discarding image {} result for a slot that is no longer in flight", id);
            return Settled::Stale;
        };
        match outcome {
            Ok(image) => {
                info!("✅ Generated image {}", id);
                *slot = SlotState::Done(image);
                Settled::Applied
            }
            Err(e) => {
                let err = StepError::ImageGeneration { id, source: e };
                error!("❌ {}", err);
                let message = err.user_message();
                *slot = SlotState::Failed(message.clone());
                self.studio.error = Some(message);
                Settled::Failed
            }
        }
    }

    pub fn view(&self) -> WizardView {
        WizardView::from(self)
    }
}

// --- snapshot ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInfo {
    pub id: Step,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotView {
    pub id: u32,
    pub state: &'static str,
    pub image: Option<String>,
    pub error: Option<String>,
    pub can_generate: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioView {
    pub has_reference: bool,
    pub reference_mime_type: Option<&'static str>,
    pub slots: Vec<SlotView>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsView {
    pub can_extract: bool,
    pub can_start_diagnosis: bool,
    pub can_generate_plans: bool,
    pub can_select_plan: bool,
}

/// What a client needs to render the current step.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub step: Step,
    pub step_index: usize,
    pub step_title: &'static str,
    pub steps: Vec<StepInfo>,
    pub platform: Option<Platform>,
    pub input: ProductInput,
    pub diagnosis: Option<DiagnosisResult>,
    pub optimization: Option<OptimizationResult>,
    pub empty_plans_message: Option<&'static str>,
    pub selected_plan: Option<OptimizationPlan>,
    pub busy: bool,
    pub error: Option<String>,
    pub extracting: bool,
    pub extract_error: Option<String>,
    pub images: StudioView,
    pub actions: ActionsView,
}

impl From<&Wizard> for WizardView {
    fn from(w: &Wizard) -> Self {
        let optimization = w.optimization.clone().map(|mut o| {
            for plan in &mut o.plans {
                plan.scores = plan.scores.clamped();
            }
            o
        });
        let empty_plans_message = (w.step == Step::Optimization && optimization.as_ref().map_or(true, |o| o.is_empty()))
            .then_some(EMPTY_PLANS_MESSAGE);

        let slots = w
            .studio
            .slots
            .iter()
            .map(|(&id, state)| {
                let (state_name, image, error) = match state {
                    SlotState::Idle => ("idle", None, None),
                    SlotState::InFlight => ("inFlight", None, None),
                    SlotState::Done(img) => ("done", Some(img.data_url()), None),
                    SlotState::Failed(msg) => ("failed", None, Some(msg.clone())),
                };
                SlotView { id, state: state_name, image, error, can_generate: w.can_generate_image(id) }
            })
            .collect();

        WizardView {
            step: w.step,
            step_index: w.step.index(),
            step_title: w.step.title(),
            steps: Step::ALL.iter().map(|&s| StepInfo { id: s, label: s.label() }).collect(),
            platform: w.platform,
            input: w.input.clone(),
            diagnosis: w.diagnosis.clone(),
            optimization,
            empty_plans_message,
            selected_plan: w.selected_plan.clone(),
            busy: w.busy,
            error: w.error.clone(),
            extracting: w.extracting,
            extract_error: w.extract_error.clone(),
            images: StudioView {
                has_reference: w.studio.reference.is_some(),
                reference_mime_type: w.studio.reference.as_ref().map(|r| r.mime_type),
                slots,
                error: w.studio.error.clone(),
            },
            actions: ActionsView {
                can_extract: w.step == Step::Input
                    && !w.busy
                    && !w.extracting
                    && !w.input.product_url.trim().is_empty(),
                can_start_diagnosis: w.can_start_diagnosis(),
                can_generate_plans: w.can_generate_plans(),
                can_select_plan: w.can_select_plan(),
            },
        }
    }
}
