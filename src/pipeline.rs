//! Intent pipeline: prompt → oracle → extract → sanitize.
//!
//! Each operation builds one [`Intent`], makes exactly one oracle call, and
//! returns a sanitized [`StructuredResult`]. Nothing here mutates a map; the
//! caller folds results in through [`QuadrantMap`].
//!
//! ```bash
//! quadrant estimate --map cars.json --item "Tesla Model 3"
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuadrantError;
use crate::extract::extract_structured;
use crate::gateway::{Attribution, ChatGateway, ChatRequest};
use crate::map::{Axis, Item, MapError, QuadrantMap};
use crate::occupancy;
use crate::prompts::{build_prompt, Intent, IntentKind, Peer};
use crate::sanitize::{sanitize, StructuredResult};

/// Environment variable overriding the model for every intent.
pub const MODEL_ENV: &str = "QUADRANT_MODEL";

// =============================================================================
// Configuration
// =============================================================================

/// Call parameters for one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentParams {
    #[serde(default = "default_model")]
    pub model: String,
    /// `None` leaves the provider default.
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Ask the provider for a JSON-object response format.
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_json_mode() -> bool {
    true
}

fn default_position() -> IntentParams {
    IntentParams {
        model: default_model(),
        temperature: None,
        max_tokens: 500,
        json_mode: default_json_mode(),
    }
}

fn default_enrich() -> IntentParams {
    IntentParams {
        model: default_model(),
        temperature: Some(0.5),
        max_tokens: 800,
        json_mode: default_json_mode(),
    }
}

fn default_suggest() -> IntentParams {
    IntentParams {
        model: default_model(),
        temperature: None,
        max_tokens: 500,
        json_mode: default_json_mode(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default = "default_position")]
    pub position: IntentParams,
    #[serde(default = "default_enrich")]
    pub enrich: IntentParams,
    #[serde(default = "default_suggest")]
    pub suggest: IntentParams,
    /// Rendered into every prompt when set.
    #[serde(default)]
    pub project_title: Option<String>,
    /// Attached to every call's usage record.
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            position: default_position(),
            enrich: default_enrich(),
            suggest: default_suggest(),
            project_title: None,
            session_id: None,
        }
    }
}

impl PipelineConfig {
    /// Defaults, with `QUADRANT_MODEL` applied when set.
    pub fn from_env() -> Self {
        Self::default().with_model_override(std::env::var(MODEL_ENV).ok().as_deref())
    }

    /// Parse a JSON config. Missing sections take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Use `model` for every intent. Blank values are ignored.
    pub fn with_model_override(mut self, model: Option<&str>) -> Self {
        if let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) {
            for params in [&mut self.position, &mut self.enrich, &mut self.suggest] {
                params.model = model.to_string();
            }
        }
        self
    }

    pub fn params(&self, kind: IntentKind) -> &IntentParams {
        match kind {
            IntentKind::PositionEstimate => &self.position,
            IntentKind::Enrich => &self.enrich,
            IntentKind::SuggestCompetitor => &self.suggest,
        }
    }
}

// =============================================================================
// Intent construction
// =============================================================================

/// Inputs for [`enrich_item`].
#[derive(Debug, Clone)]
pub struct EnrichRequest {
    pub item_name: String,
    pub domain_hint: Option<String>,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub peers: Vec<Peer>,
    pub constraints: Vec<String>,
    pub requested_attributes: Vec<String>,
}

pub fn position_intent(
    cfg: &PipelineConfig,
    item_name: &str,
    x_axis: &Axis,
    y_axis: &Axis,
    peers: &[Peer],
) -> Intent {
    Intent::PositionEstimate {
        item_name: item_name.to_string(),
        x_axis: x_axis.clone(),
        y_axis: y_axis.clone(),
        peers: peers.to_vec(),
        project_title: cfg.project_title.clone(),
    }
}

pub fn enrich_intent(cfg: &PipelineConfig, req: EnrichRequest) -> Intent {
    Intent::Enrich {
        item_name: req.item_name,
        domain_hint: req.domain_hint,
        x_axis: req.x_axis,
        y_axis: req.y_axis,
        peers: req.peers,
        constraints: req.constraints,
        requested_attributes: req.requested_attributes,
        project_title: cfg.project_title.clone(),
    }
}

/// Suggestion intent targeting the emptiest quadrant of `all_items`.
pub fn suggest_intent(
    cfg: &PipelineConfig,
    all_items: &[Item],
    x_axis: &Axis,
    y_axis: &Axis,
    constraints: &[String],
    requested_attributes: &[String],
) -> Intent {
    let occupancy = occupancy::analyze(all_items, x_axis, y_axis);
    Intent::SuggestCompetitor {
        x_axis: x_axis.clone(),
        y_axis: y_axis.clone(),
        peers: all_items
            .iter()
            .map(|item| item.as_peer(&x_axis.id, &y_axis.id))
            .collect(),
        occupancy,
        constraints: constraints.to_vec(),
        requested_attributes: requested_attributes.to_vec(),
        project_title: cfg.project_title.clone(),
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Render, send, extract and sanitize one intent.
pub async fn run_intent(
    gateway: &dyn ChatGateway,
    cfg: &PipelineConfig,
    intent: &Intent,
) -> Result<StructuredResult, QuadrantError> {
    let kind = intent.kind();
    let params = cfg.params(kind);
    let prompt = build_prompt(intent);

    let mut attribution = Attribution::new(caller_for(kind));
    if let Some(session_id) = cfg.session_id {
        attribution = attribution.with_session(session_id);
    }

    let mut req = ChatRequest::new(params.model.clone(), prompt.to_messages(), attribution)
        .max_tokens(params.max_tokens);
    if let Some(t) = params.temperature {
        req = req.temperature(t);
    }
    if params.json_mode {
        req = req.json();
    }

    let resp = gateway.chat(req).await?;
    let object = extract_structured(&resp.content)?;
    let result = sanitize(&object, kind)?;

    tracing::debug!(
        intent = kind.as_str(),
        template = %prompt.template_slug,
        x = result.x,
        y = result.y,
        "oracle result"
    );
    Ok(result)
}

fn caller_for(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::PositionEstimate => "pipeline::position",
        IntentKind::Enrich => "pipeline::enrich",
        IntentKind::SuggestCompetitor => "pipeline::suggest",
    }
}

/// Estimate where `item_name` sits on the two axes.
pub async fn estimate_position(
    gateway: &dyn ChatGateway,
    cfg: &PipelineConfig,
    item_name: &str,
    x_axis: &Axis,
    y_axis: &Axis,
    peers: &[Peer],
) -> Result<StructuredResult, QuadrantError> {
    let intent = position_intent(cfg, item_name, x_axis, y_axis, peers);
    run_intent(gateway, cfg, &intent).await
}

/// Position plus descriptive fields for one item.
pub async fn enrich_item(
    gateway: &dyn ChatGateway,
    cfg: &PipelineConfig,
    req: EnrichRequest,
) -> Result<StructuredResult, QuadrantError> {
    let intent = enrich_intent(cfg, req);
    run_intent(gateway, cfg, &intent).await
}

/// Ask for one real competitor in the least populated quadrant.
///
/// The result always carries a name. Names resembling an existing item are
/// logged and returned; whether to insert them is the caller's decision
/// (see [`near_duplicate`]).
pub async fn suggest_competitor(
    gateway: &dyn ChatGateway,
    cfg: &PipelineConfig,
    all_items: &[Item],
    x_axis: &Axis,
    y_axis: &Axis,
    constraints: &[String],
    requested_attributes: &[String],
) -> Result<StructuredResult, QuadrantError> {
    let intent = suggest_intent(cfg, all_items, x_axis, y_axis, constraints, requested_attributes);
    let result = run_intent(gateway, cfg, &intent).await?;

    if let Some(name) = result.name.as_deref() {
        if let Some(existing) = near_duplicate(name, all_items) {
            tracing::warn!(
                suggested = name,
                existing = %existing.name,
                "suggestion resembles an item already on the map"
            );
        }
    }
    Ok(result)
}

/// An existing item whose name matches `name` after folding case,
/// punctuation and common company suffixes.
pub fn near_duplicate<'a>(name: &str, items: &'a [Item]) -> Option<&'a Item> {
    let wanted = name_key(name);
    if wanted.is_empty() {
        return None;
    }
    items.iter().find(|item| name_key(&item.name) == wanted)
}

const COMPANY_SUFFIXES: &[&str] = &["inc", "ltd", "llc", "corp", "co", "gmbh", "ag", "sa", "plc"];

fn name_key(name: &str) -> String {
    let words: Vec<String> = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let mut end = words.len();
    while end > 1 && COMPANY_SUFFIXES.contains(&words[end - 1].as_str()) {
        end -= 1;
    }
    words[..end].join(" ")
}

// =============================================================================
// Refresh all
// =============================================================================

/// Result of one item's refresh.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub item_id: String,
    pub item_name: String,
    pub result: Result<StructuredResult, QuadrantError>,
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    /// One entry per attempted item, in map order.
    pub outcomes: Vec<RefreshOutcome>,
    /// Set when the cancel flag stopped the run before every item was tried.
    pub cancelled: bool,
}

impl RefreshReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Fold every successful result into `map`. Returns how many were applied.
    pub fn apply_to(&self, map: &mut QuadrantMap) -> Result<usize, MapError> {
        let mut applied = 0;
        for outcome in &self.outcomes {
            if let Ok(result) = &outcome.result {
                map.apply_result(&outcome.item_id, result)?;
                applied += 1;
            }
        }
        Ok(applied)
    }
}

/// Enrich every item on the map's active axes, one at a time.
///
/// A failed item is recorded and the run continues. `cancel` is checked
/// before each item; once set, no further calls are made.
pub async fn refresh_all(
    gateway: &dyn ChatGateway,
    cfg: &PipelineConfig,
    map: &QuadrantMap,
    constraints: &[String],
    requested_attributes: &[String],
    cancel: Option<&AtomicBool>,
) -> Result<RefreshReport, QuadrantError> {
    let (x_axis, y_axis) = map.active_axes()?;
    let peers = map.peers()?;
    let mut report = RefreshReport::default();

    for item in &map.items {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            report.cancelled = true;
            break;
        }

        let req = EnrichRequest {
            item_name: item.name.clone(),
            domain_hint: item.domain.clone(),
            x_axis: x_axis.clone(),
            y_axis: y_axis.clone(),
            peers: peers.clone(),
            constraints: constraints.to_vec(),
            requested_attributes: requested_attributes.to_vec(),
        };
        let result = enrich_item(gateway, cfg, req).await;
        if let Err(err) = &result {
            tracing::warn!(item = %item.name, code = err.code(), error = %err, "refresh failed");
        }
        report.outcomes.push(RefreshOutcome {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            result,
        });
    }

    tracing::info!(
        attempted = report.outcomes.len(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        cancelled = report.cancelled,
        "refresh finished"
    );
    Ok(report)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_per_intent() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.position.model, "gpt-4o-mini");
        assert_eq!(cfg.position.max_tokens, 500);
        assert_eq!(cfg.position.temperature, None);
        assert_eq!(cfg.enrich.temperature, Some(0.5));
        assert_eq!(cfg.enrich.max_tokens, 800);
        assert_eq!(cfg.suggest.max_tokens, 500);
        assert!(cfg.suggest.json_mode);
    }

    #[test]
    fn partial_json_config_keeps_defaults() {
        let cfg = PipelineConfig::from_json(
            r#"{"enrich": {"model": "gpt-4o", "maxTokens": 1}, "projectTitle": "EVs"}"#,
        )
        .unwrap();
        assert_eq!(cfg.enrich.model, "gpt-4o");
        assert_eq!(cfg.enrich.max_tokens, 1);
        assert_eq!(cfg.enrich.temperature, None);
        assert!(cfg.enrich.json_mode);
        assert_eq!(cfg.position, PipelineConfig::default().position);
        assert_eq!(cfg.project_title.as_deref(), Some("EVs"));
    }

    #[test]
    fn session_id_survives_config_json() {
        let cfg = PipelineConfig::from_json(
            r#"{"sessionId": "6f1c2b7e-0d4a-4c1e-9b7a-2f3d4e5a6b7c"}"#,
        )
        .unwrap();
        let session = cfg.session_id.unwrap();
        assert_eq!(session.to_string(), "6f1c2b7e-0d4a-4c1e-9b7a-2f3d4e5a6b7c");

        let written = serde_json::to_string(&cfg).unwrap();
        assert_eq!(PipelineConfig::from_json(&written).unwrap(), cfg);
    }

    #[test]
    fn model_override_applies_to_every_intent() {
        let cfg = PipelineConfig::default().with_model_override(Some("gpt-4.1-mini"));
        for kind in IntentKind::ALL {
            assert_eq!(cfg.params(kind).model, "gpt-4.1-mini");
        }
        let cfg = PipelineConfig::default().with_model_override(Some("  "));
        assert_eq!(cfg.enrich.model, "gpt-4o-mini");
    }

    #[test]
    fn near_duplicates_fold_case_punctuation_and_suffixes() {
        let items = vec![Item::new("a", "Tesla, Inc."), Item::new("b", "Porsche 911")];
        assert_eq!(near_duplicate("tesla", &items).map(|i| i.id.as_str()), Some("a"));
        assert_eq!(near_duplicate("PORSCHE-911", &items).map(|i| i.id.as_str()), Some("b"));
        assert!(near_duplicate("Porsche Taycan", &items).is_none());
        assert!(near_duplicate("  ", &items).is_none());
    }

    #[test]
    fn suggest_intent_targets_emptiest_quadrant() {
        let x = Axis::new("price", "Price", "Budget", "Premium");
        let y = Axis::new("perf", "Performance", "Commuter", "Sport");
        let items = vec![Item::new("a", "Porsche 911").at("price", 90.0).at("perf", 95.0)];
        let intent = suggest_intent(&PipelineConfig::default(), &items, &x, &y, &[], &[]);
        match intent {
            Intent::SuggestCompetitor { occupancy, peers, .. } => {
                assert_eq!(occupancy.target, crate::coords::Quadrant::TopLeft);
                assert_eq!(peers, vec![Peer::new("Porsche 911", 90.0, 95.0)]);
            }
            other => panic!("unexpected intent {other:?}"),
        }
    }
}
