use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quadrant_oracle::gateway::{
    ChatGateway, ChatRequest, ChatResponse, ErrorContext, FinishReason, OracleError, Role,
};
use quadrant_oracle::map::{Axis, Item, QuadrantMap};
use quadrant_oracle::pipeline::{self, EnrichRequest, PipelineConfig};
use quadrant_oracle::prompts::Peer;
use quadrant_oracle::QuadrantError;

/// Replays canned oracle outcomes in order and keeps every request it saw.
#[derive(Default)]
struct ScriptedGateway {
    script: Mutex<VecDeque<Result<String, OracleError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    /// Raised after the first call, to simulate a user cancelling mid-run.
    cancel_after_first: Option<Arc<AtomicBool>>,
}

impl ScriptedGateway {
    fn new(script: Vec<Result<String, OracleError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    fn replying(content: &str) -> Self {
        Self::new(vec![Ok(content.to_string())])
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn user_prompt(&self, idx: usize) -> String {
        let requests = self.requests.lock().unwrap();
        requests[idx]
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap()
    }
}

#[async_trait::async_trait]
impl ChatGateway for ScriptedGateway {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, OracleError> {
        self.requests.lock().unwrap().push(req);
        if let Some(flag) = &self.cancel_after_first {
            flag.store(true, Ordering::SeqCst);
        }
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted");
        next.map(|content| ChatResponse {
            content,
            input_tokens: 10,
            output_tokens: 10,
            cost_nanodollars: 0,
            latency: Duration::from_millis(1),
            finish_reason: FinishReason::Stop,
        })
    }
}

fn price() -> Axis {
    Axis::new("price", "Price", "Budget", "Premium")
}

fn performance() -> Axis {
    Axis::new("perf", "Performance", "Commuter", "Sport")
}

fn car_peers() -> Vec<Peer> {
    vec![
        Peer::new("Toyota Corolla", 30.0, 20.0),
        Peer::new("Porsche 911", 90.0, 95.0),
    ]
}

fn car_map() -> QuadrantMap {
    let mut map = QuadrantMap::new();
    map.add_axis(price()).unwrap();
    map.add_axis(performance()).unwrap();
    for (name, x, y) in [
        ("Toyota Corolla", 30.0, 20.0),
        ("Porsche 911", 90.0, 95.0),
        ("Tesla Model 3", 50.0, 50.0),
    ] {
        let id = map.add_item(name);
        map.set_position(&id, x, y).unwrap();
    }
    map
}

#[tokio::test]
async fn tesla_model_3_position_estimate() {
    let gateway = ScriptedGateway::replying(
        r#"{"xValue":55,"yValue":75,"reasoning":"mid-premium, sporty EV"}"#,
    );
    let cfg = PipelineConfig::default();

    let result = pipeline::estimate_position(
        &gateway,
        &cfg,
        "Tesla Model 3",
        &price(),
        &performance(),
        &car_peers(),
    )
    .await
    .unwrap();

    assert_eq!((result.x, result.y), (55.0, 75.0));
    assert_eq!(result.reasoning.as_deref(), Some("mid-premium, sporty EV"));
    assert!(result.highlights.is_empty());
    assert!(result.attributes.is_empty());
    assert!(result.sources.is_empty());
    assert!(result.icon_url.is_none());

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-4o-mini");
    assert_eq!(requests[0].max_tokens, Some(500));
    assert_eq!(requests[0].temperature, None);
    assert!(requests[0].json_mode);
    assert_eq!(requests[0].attribution.caller, "pipeline::position");

    let prompt = gateway.user_prompt(0);
    assert!(prompt.contains("\"Tesla Model 3\""));
    assert!(prompt.contains("- Toyota Corolla: Price=30, Performance=20"));
    assert!(prompt.contains("- Porsche 911: Price=90, Performance=95"));
}

#[tokio::test]
async fn fenced_answer_with_out_of_range_values_is_clamped() {
    let gateway = ScriptedGateway::replying(
        "Sure! Here is the estimate:\n```json\n{\"xValue\": 130, \"yValue\": -4, \"domain\": \"tesla.com\"}\n```",
    );
    let result = pipeline::estimate_position(
        &gateway,
        &PipelineConfig::default(),
        "Tesla Model 3",
        &price(),
        &performance(),
        &[],
    )
    .await
    .unwrap();

    assert_eq!((result.x, result.y), (100.0, 0.0));
    assert_eq!(
        result.icon_url.as_deref(),
        Some("https://www.google.com/s2/favicons?domain=tesla.com&sz=128")
    );
}

#[tokio::test]
async fn enrich_uses_enrich_parameters_and_renders_extras() {
    let gateway = ScriptedGateway::replying(
        r#"{
            "xValue": 60, "yValue": 70, "domain": "tesla.com",
            "reasoning": "Premium EV",
            "highlights": ["Range: 513 km", "0-100 km/h: 6.1 s"],
            "attributes": {"Range": "513 km", "Seats": 5},
            "sources": ["https://www.tesla.com/model3"]
        }"#,
    );
    let cfg = PipelineConfig {
        project_title: Some("EV market".into()),
        ..PipelineConfig::default()
    };
    let req = EnrichRequest {
        item_name: "Tesla Model 3".into(),
        domain_hint: Some("tesla.com".into()),
        x_axis: price(),
        y_axis: performance(),
        peers: car_peers(),
        constraints: vec!["Only cars sold in Europe".into()],
        requested_attributes: vec!["Range".into(), "Seats".into()],
    };

    let result = pipeline::enrich_item(&gateway, &cfg, req).await.unwrap();
    assert_eq!(result.attributes["Seats"], "5");
    assert_eq!(result.highlights.len(), 2);
    assert_eq!(result.sources, vec!["https://www.tesla.com/model3".to_string()]);

    let requests = gateway.requests();
    assert_eq!(requests[0].temperature, Some(0.5));
    assert_eq!(requests[0].max_tokens, Some(800));
    assert_eq!(requests[0].attribution.caller, "pipeline::enrich");

    let prompt = gateway.user_prompt(0);
    assert!(prompt.contains("for the project \"EV market\""));
    assert!(prompt.contains("verify or correct: \"tesla.com\""));
    assert!(prompt.contains("- Only cars sold in Europe"));
    assert!(prompt.contains("7 key highlights"));
}

#[tokio::test]
async fn suggestion_without_name_is_rejected() {
    let gateway = ScriptedGateway::replying(r#"{"xValue": 80, "yValue": 20}"#);
    let map = car_map();
    let (x, y) = map.active_axes().unwrap();

    let err = pipeline::suggest_competitor(
        &gateway,
        &PipelineConfig::default(),
        &map.items,
        x,
        y,
        &[],
        &[],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, QuadrantError::MissingName));
}

#[tokio::test]
async fn suggestion_targets_emptiest_quadrant_and_inserts() {
    let gateway = ScriptedGateway::replying(
        r#"{"name": "Dacia Spring", "xValue": 10, "yValue": 15, "domain": "dacia.com"}"#,
    );
    let mut map = car_map();
    let (x, y) = map.active_axes().unwrap();

    let result = pipeline::suggest_competitor(
        &gateway,
        &PipelineConfig::default(),
        &map.items,
        x,
        y,
        &[],
        &[],
    )
    .await
    .unwrap();

    // Corolla is bottom-left, Porsche and the centered Tesla are top-right.
    let prompt = gateway.user_prompt(0);
    assert!(prompt.contains("- Top-Right (High/High): 2"));
    assert!(prompt.contains("The top-left quadrant (Low Price and High Performance) is underrepresented."));
    assert!(prompt.contains("Toyota Corolla, Porsche 911, Tesla Model 3"));
    assert_eq!(gateway.requests()[0].attribution.caller, "pipeline::suggest");

    assert!(pipeline::near_duplicate("Dacia Spring", &map.items).is_none());
    let id = map.insert_suggestion(&result).unwrap();
    let item = map.item(&id).unwrap();
    assert_eq!(item.name, "Dacia Spring");
    assert_eq!(item.position("price", "perf"), (10.0, 15.0));
}

#[tokio::test]
async fn unparseable_answer_is_an_extraction_error() {
    let gateway = ScriptedGateway::replying("I think it is somewhere in the middle.");
    let err = pipeline::estimate_position(
        &gateway,
        &PipelineConfig::default(),
        "Tesla Model 3",
        &price(),
        &performance(),
        &[],
    )
    .await
    .unwrap_err();

    match err {
        QuadrantError::Extraction(e) => {
            assert_eq!(e.excerpt, "I think it is somewhere in the middle.");
        }
        other => panic!("expected Extraction, got {other:?}"),
    }
}

#[tokio::test]
async fn non_numeric_coordinates_are_rejected() {
    let gateway = ScriptedGateway::replying(r#"{"xValue": "high", "yValue": 20}"#);
    let err = pipeline::estimate_position(
        &gateway,
        &PipelineConfig::default(),
        "Tesla Model 3",
        &price(),
        &performance(),
        &[],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, QuadrantError::MissingCoordinates { field: "x" }));
}

#[tokio::test]
async fn gateway_failures_are_classified() {
    let gateway = ScriptedGateway::new(vec![
        Err(OracleError::config("OPENAI_API_KEY not set")),
        Err(OracleError::status(503, "overloaded", ErrorContext::new())),
    ]);
    let cfg = PipelineConfig::default();

    let first = pipeline::estimate_position(&gateway, &cfg, "A", &price(), &performance(), &[])
        .await
        .unwrap_err();
    assert!(matches!(first, QuadrantError::OracleUnavailable(_)));

    let second = pipeline::estimate_position(&gateway, &cfg, "A", &price(), &performance(), &[])
        .await
        .unwrap_err();
    assert!(matches!(second, QuadrantError::OracleError(_)));
    assert_eq!(gateway.requests().len(), 2);
}

#[tokio::test]
async fn refresh_all_records_failures_and_continues() {
    let gateway = ScriptedGateway::new(vec![
        Ok(r#"{"xValue": 25, "yValue": 15}"#.to_string()),
        Ok("no json here".to_string()),
        Ok(r#"{"xValue": 58, "yValue": 72, "highlights": ["Range: 513 km"]}"#.to_string()),
    ]);
    let mut map = car_map();

    let report = pipeline::refresh_all(
        &gateway,
        &PipelineConfig::default(),
        &map,
        &[],
        &["Range".to_string()],
        None,
    )
    .await
    .unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.outcomes[1].item_name, "Porsche 911");
    assert!(matches!(
        report.outcomes[1].result,
        Err(QuadrantError::Extraction(_))
    ));

    // The subject never appears in its own peer list.
    let second_prompt = gateway.user_prompt(1);
    assert!(!second_prompt.contains("- Porsche 911:"));
    assert!(second_prompt.contains("- Toyota Corolla:"));

    let applied = report.apply_to(&mut map).unwrap();
    assert_eq!(applied, 2);
    let tesla = map.item_by_name("Tesla Model 3").unwrap();
    assert_eq!(tesla.position("price", "perf"), (58.0, 72.0));
    assert_eq!(tesla.highlights, vec!["Range: 513 km".to_string()]);
    let porsche = map.item_by_name("Porsche 911").unwrap();
    assert_eq!(porsche.position("price", "perf"), (90.0, 95.0));
}

#[tokio::test]
async fn refresh_all_stops_when_cancelled() {
    let cancel = Arc::new(AtomicBool::new(false));
    let gateway = ScriptedGateway {
        cancel_after_first: Some(cancel.clone()),
        ..ScriptedGateway::new(vec![
            Ok(r#"{"xValue": 25, "yValue": 15}"#.to_string()),
            Ok(r#"{"xValue": 90, "yValue": 90}"#.to_string()),
        ])
    };
    let map = car_map();

    let report = pipeline::refresh_all(
        &gateway,
        &PipelineConfig::default(),
        &map,
        &[],
        &[],
        Some(cancel.as_ref()),
    )
    .await
    .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(gateway.requests().len(), 1);
}

#[tokio::test]
async fn refresh_all_without_active_axes_fails_fast() {
    let gateway = ScriptedGateway::default();
    let mut map = QuadrantMap::new();
    map.items.push(Item::new("a", "Orphan"));

    let err = pipeline::refresh_all(&gateway, &PipelineConfig::default(), &map, &[], &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, QuadrantError::Map(_)));
    assert!(gateway.requests().is_empty());
}
