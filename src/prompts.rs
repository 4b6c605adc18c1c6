//! Prompt rendering for oracle intents.
//!
//! One builder serves all three intents: a per-intent template supplies the
//! system instruction and opening, shared fragments render axes, peers,
//! field list, rules and the output contract. Rendering is pure; identical
//! intents produce byte-identical prompts, and peers are rendered in the
//! order given.

use std::fmt::Write as _;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use crate::coords::Quadrant;
use crate::gateway::Message;
use crate::map::Axis;
use crate::occupancy::Occupancy;

/// Most peers rendered into a context block.
pub const MAX_PEERS: usize = 10;
/// Highlights requested when no attributes are requested.
pub const DEFAULT_HIGHLIGHTS: usize = 5;
/// Upper bound on requested highlights.
pub const MAX_REQUESTED_HIGHLIGHTS: usize = 10;

// =============================================================================
// Intents
// =============================================================================

/// Another item on the map, used to ground relative placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl Peer {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    PositionEstimate,
    Enrich,
    SuggestCompetitor,
}

impl IntentKind {
    pub const ALL: [IntentKind; 3] = [
        IntentKind::PositionEstimate,
        IntentKind::Enrich,
        IntentKind::SuggestCompetitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::PositionEstimate => "position",
            IntentKind::Enrich => "enrich",
            IntentKind::SuggestCompetitor => "suggest",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown intent: {0} (expected one of: position, enrich, suggest)")]
pub struct UnknownIntent(pub String);

impl FromStr for IntentKind {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" | "position_estimate" | "estimate" => Ok(IntentKind::PositionEstimate),
            "enrich" => Ok(IntentKind::Enrich),
            "suggest" | "suggestion" | "suggest_competitor" => Ok(IntentKind::SuggestCompetitor),
            _ => Err(UnknownIntent(s.to_string())),
        }
    }
}

/// A typed request for the oracle. Built per action, consumed once.
#[derive(Debug, Clone)]
pub enum Intent {
    PositionEstimate {
        item_name: String,
        x_axis: Axis,
        y_axis: Axis,
        peers: Vec<Peer>,
        project_title: Option<String>,
    },
    Enrich {
        item_name: String,
        domain_hint: Option<String>,
        x_axis: Axis,
        y_axis: Axis,
        peers: Vec<Peer>,
        constraints: Vec<String>,
        requested_attributes: Vec<String>,
        project_title: Option<String>,
    },
    SuggestCompetitor {
        x_axis: Axis,
        y_axis: Axis,
        peers: Vec<Peer>,
        occupancy: Occupancy,
        constraints: Vec<String>,
        requested_attributes: Vec<String>,
        project_title: Option<String>,
    },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::PositionEstimate { .. } => IntentKind::PositionEstimate,
            Intent::Enrich { .. } => IntentKind::Enrich,
            Intent::SuggestCompetitor { .. } => IntentKind::SuggestCompetitor,
        }
    }

    fn axes(&self) -> (&Axis, &Axis) {
        match self {
            Intent::PositionEstimate { x_axis, y_axis, .. }
            | Intent::Enrich { x_axis, y_axis, .. }
            | Intent::SuggestCompetitor { x_axis, y_axis, .. } => (x_axis, y_axis),
        }
    }

    fn peers(&self) -> &[Peer] {
        match self {
            Intent::PositionEstimate { peers, .. }
            | Intent::Enrich { peers, .. }
            | Intent::SuggestCompetitor { peers, .. } => peers.as_slice(),
        }
    }

    fn subject(&self) -> Option<&str> {
        match self {
            Intent::PositionEstimate { item_name, .. } | Intent::Enrich { item_name, .. } => {
                Some(item_name.as_str())
            }
            Intent::SuggestCompetitor { .. } => None,
        }
    }

    fn constraints(&self) -> &[String] {
        match self {
            Intent::PositionEstimate { .. } => &[],
            Intent::Enrich { constraints, .. } | Intent::SuggestCompetitor { constraints, .. } => {
                constraints.as_slice()
            }
        }
    }

    fn requested_attributes(&self) -> &[String] {
        match self {
            Intent::PositionEstimate { .. } => &[],
            Intent::Enrich {
                requested_attributes,
                ..
            }
            | Intent::SuggestCompetitor {
                requested_attributes,
                ..
            } => requested_attributes.as_slice(),
        }
    }

    fn project_title(&self) -> Option<&str> {
        match self {
            Intent::PositionEstimate { project_title, .. }
            | Intent::Enrich { project_title, .. }
            | Intent::SuggestCompetitor { project_title, .. } => project_title.as_deref(),
        }
    }
}

// =============================================================================
// Prompt templates
// =============================================================================

/// Rendered prompt ready for the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInstance {
    pub template_slug: String,
    pub system: String,
    pub user: String,
    /// The JSON shape the oracle is asked to return, also embedded in `user`.
    pub expected_shape: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Per-intent parts of a prompt.
#[derive(Debug, Clone, Copy)]
pub struct IntentTemplate {
    pub kind: IntentKind,
    pub slug: &'static str,
    pub system: &'static str,
}

pub const POSITION_V1: IntentTemplate = IntentTemplate {
    kind: IntentKind::PositionEstimate,
    slug: "position_v1",
    system: "You are a product expert. Respond with valid JSON only.",
};

pub const ENRICH_V1: IntentTemplate = IntentTemplate {
    kind: IntentKind::Enrich,
    slug: "enrich_v1",
    system: "You are a product expert. Respond with valid JSON only. Always use metric units.",
};

pub const SUGGEST_V1: IntentTemplate = IntentTemplate {
    kind: IntentKind::SuggestCompetitor,
    slug: "suggest_v1",
    system: "You are a product strategy expert helping to analyze competitive landscapes. \
             Always respond with valid JSON only.",
};

pub const TEMPLATES: &[IntentTemplate] = &[POSITION_V1, ENRICH_V1, SUGGEST_V1];

pub fn template_for(kind: IntentKind) -> IntentTemplate {
    match kind {
        IntentKind::PositionEstimate => POSITION_V1,
        IntentKind::Enrich => ENRICH_V1,
        IntentKind::SuggestCompetitor => SUGGEST_V1,
    }
}

pub fn template_by_slug(slug: &str) -> Option<IntentTemplate> {
    TEMPLATES.iter().find(|t| t.slug == slug).copied()
}

/// Number of highlights to request for a given attribute count.
pub fn highlight_count(requested_attributes: usize) -> usize {
    if requested_attributes == 0 {
        DEFAULT_HIGHLIGHTS
    } else {
        MAX_REQUESTED_HIGHLIGHTS.min(requested_attributes + DEFAULT_HIGHLIGHTS)
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Render the prompt for an intent.
pub fn build_prompt(intent: &Intent) -> PromptInstance {
    let template = template_for(intent.kind());
    let (x_axis, y_axis) = intent.axes();
    let attributes: Vec<String> = intent
        .requested_attributes()
        .iter()
        .map(|a| one_line(a))
        .filter(|a| !a.is_empty())
        .collect();
    let constraints: Vec<String> = intent
        .constraints()
        .iter()
        .map(|c| one_line(c))
        .filter(|c| !c.is_empty())
        .collect();
    let highlights = highlight_count(attributes.len());
    let expected_shape = render_shape(intent, &attributes, highlights);

    let mut user = String::new();
    render_opening(&mut user, intent);
    render_axes(&mut user, x_axis, y_axis);

    if let Intent::SuggestCompetitor { occupancy, .. } = intent {
        render_distribution(&mut user, occupancy);
    }

    render_peers(&mut user, intent);

    if let Intent::SuggestCompetitor { occupancy, peers, .. } = intent {
        render_suggest_task(&mut user, occupancy, peers);
    }

    render_fields(&mut user, intent, &attributes, highlights);
    render_rules(&mut user, x_axis, y_axis, &constraints, &attributes);

    if let Intent::Enrich { item_name, .. } = intent {
        if !attributes.is_empty() {
            let name = one_line(item_name);
            let _ = writeln!(
                user,
                "- If \"{name}\" is a brand or company rather than a specific product, give \
                 brand-level attributes (e.g. Founded, Employees, Revenue, HQ Location); \
                 otherwise give product specifications."
            );
        }
    }

    let _ = write!(
        user,
        "\nRespond ONLY with a single JSON object in exactly this shape (same field order, no \
         markdown):\n{expected_shape}"
    );

    PromptInstance {
        template_slug: template.slug.to_string(),
        system: template.system.to_string(),
        user,
        expected_shape,
    }
}

fn project_suffix(intent: &Intent) -> String {
    match intent.project_title().map(one_line).filter(|t| !t.is_empty()) {
        Some(title) => format!(" for the project \"{title}\""),
        None => String::new(),
    }
}

fn render_opening(out: &mut String, intent: &Intent) {
    let project = project_suffix(intent);
    let _ = match intent {
        Intent::PositionEstimate { item_name, .. } => writeln!(
            out,
            "Estimate the position of \"{}\" on a quadrant map{project}.",
            one_line(item_name)
        ),
        Intent::Enrich { item_name, .. } => writeln!(
            out,
            "Enrich the item \"{}\" for a quadrant map{project}.",
            one_line(item_name)
        ),
        Intent::SuggestCompetitor { .. } => {
            writeln!(out, "You are analyzing a quadrant map{project}.")
        }
    };
}

fn render_axes(out: &mut String, x_axis: &Axis, y_axis: &Axis) {
    let _ = writeln!(out, "\nAxes:");
    for (tag, axis) in [("X", x_axis), ("Y", y_axis)] {
        let _ = writeln!(
            out,
            "- {tag}: {} (0 = {}, 100 = {})",
            one_line(&axis.label),
            one_line(&axis.left_label),
            one_line(&axis.right_label)
        );
    }
}

fn render_distribution(out: &mut String, occupancy: &Occupancy) {
    let counts = &occupancy.counts;
    let _ = writeln!(out, "\nCurrent distribution:");
    let _ = writeln!(out, "- Top-Right (High/High): {}", counts.top_right);
    let _ = writeln!(out, "- Top-Left (Low/High): {}", counts.top_left);
    let _ = writeln!(out, "- Bottom-Right (High/Low): {}", counts.bottom_right);
    let _ = writeln!(out, "- Bottom-Left (Low/Low): {}", counts.bottom_left);
    let _ = writeln!(
        out,
        "\nThe {} quadrant ({}) is underrepresented.",
        occupancy.target,
        one_line(&occupancy.target_description)
    );
}

fn render_peers(out: &mut String, intent: &Intent) {
    let (x_axis, y_axis) = intent.axes();
    let subject = intent.subject().map(normalized_name);
    let x_label = one_line(&x_axis.label);
    let y_label = one_line(&y_axis.label);

    let lines: Vec<String> = intent
        .peers()
        .iter()
        .filter(|p| subject.as_deref() != Some(normalized_name(&p.name).as_str()))
        .take(MAX_PEERS)
        .map(|p| {
            format!(
                "- {}: {x_label}={}, {y_label}={}",
                one_line(&p.name),
                fmt_value(p.x),
                fmt_value(p.y)
            )
        })
        .collect();

    let _ = writeln!(out, "\nContext (other items on the map):");
    if lines.is_empty() {
        let _ = writeln!(out, "No other items yet.");
    } else {
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
    }
}

fn render_suggest_task(out: &mut String, occupancy: &Occupancy, peers: &[Peer]) {
    let target = occupancy.target;
    let description = one_line(&occupancy.target_description);
    let _ = writeln!(
        out,
        "\nTask: Suggest ONE REAL, currently existing competing product or company for the \
         {target} quadrant ({description})."
    );
    let _ = writeln!(out, "- It must be real and exist today. Do not invent names.");
    let _ = writeln!(out, "- Its position must fall inside the {target} quadrant.");

    let mut seen: Vec<String> = Vec::new();
    for peer in peers {
        let name = one_line(&peer.name);
        if !name.is_empty() && !seen.iter().any(|s| normalized_name(s) == normalized_name(&name)) {
            seen.push(name);
        }
    }
    if !seen.is_empty() {
        let _ = writeln!(
            out,
            "- It must NOT be any item already on the map, nor a near-identical name (case, \
             punctuation or suffixes such as \"Inc.\" do not make a name different): {}.",
            seen.join(", ")
        );
    }
}

fn render_fields(out: &mut String, intent: &Intent, attributes: &[String], highlights: usize) {
    let (x_axis, y_axis) = intent.axes();
    let mut fields: Vec<String> = Vec::new();

    if intent.kind() == IntentKind::SuggestCompetitor {
        fields.push("name - the suggested item's name".to_string());
    }
    fields.push(format!(
        "xValue (0-100) - absolute position on the X axis ({} -> {})",
        one_line(&x_axis.left_label),
        one_line(&x_axis.right_label)
    ));
    fields.push(format!(
        "yValue (0-100) - absolute position on the Y axis ({} -> {})",
        one_line(&y_axis.left_label),
        one_line(&y_axis.right_label)
    ));

    let mut domain = "domain - the primary web domain of the company behind it (e.g. \"slack.com\")"
        .to_string();
    if let Intent::Enrich {
        domain_hint: Some(hint),
        ..
    } = intent
    {
        let hint = one_line(hint);
        if !hint.is_empty() {
            let _ = write!(domain, " - verify or correct: \"{hint}\"");
        }
    }
    fields.push(domain);

    fields.push("reasoning - brief explanation (max 1 sentence)".to_string());
    fields.push(format!(
        "highlights - {highlights} key highlights or specifications, max 5 words each (facts \
         over marketing, e.g. \"Range: 500 km\", \"Origin: Germany\")"
    ));
    if !attributes.is_empty() {
        fields.push(format!(
            "attributes - object with a value for each of: {}",
            attributes.join(", ")
        ));
    }
    fields.push("sources - URLs supporting the answer, or an empty array".to_string());

    let _ = match intent.subject() {
        Some(name) => writeln!(
            out,
            "\nBased on general knowledge about \"{}\", provide:",
            one_line(name)
        ),
        None => writeln!(out, "\nProvide details for the suggested item:"),
    };
    for (i, field) in fields.iter().enumerate() {
        let _ = writeln!(out, "{}. {field}", i + 1);
    }
}

fn render_rules(
    out: &mut String,
    x_axis: &Axis,
    y_axis: &Axis,
    constraints: &[String],
    attributes: &[String],
) {
    let _ = writeln!(out, "\nIMPORTANT RULES:");
    let _ = writeln!(out, "- Use the FULL range 0-100. Do NOT default to 50.");
    for axis in [x_axis, y_axis] {
        let _ = writeln!(
            out,
            "- On {}: 0 means extremely \"{}\", 100 means extremely \"{}\".",
            one_line(&axis.label),
            one_line(&axis.left_label),
            one_line(&axis.right_label)
        );
    }
    let _ = writeln!(
        out,
        "- Example: a very cheap product belongs close to 0 on a Price axis (Low -> High); a \
         very expensive one close to 100."
    );
    let _ = writeln!(
        out,
        "- Example: an item clearly at one pole of an axis belongs near 5 or 95, not near 50."
    );
    let _ = writeln!(out, "- Place the item relative to the context items where they are comparable.");
    let _ = writeln!(
        out,
        "- ALWAYS use METRIC units (km not miles, kg not lbs, °C not °F) in highlights and attributes."
    );
    let _ = writeln!(
        out,
        "- List any source URLs you relied on in \"sources\"; use an empty array if none."
    );

    if !constraints.is_empty() {
        let _ = writeln!(out, "\nConstraints (each MUST be satisfied):");
        for c in constraints {
            let _ = writeln!(out, "- {c}");
        }
    }
    if !attributes.is_empty() {
        let _ = writeln!(out, "\nAttributes to provide under \"attributes\":");
        for a in attributes {
            let _ = writeln!(out, "- {a}");
        }
    }
}

fn render_shape(intent: &Intent, attributes: &[String], highlights: usize) -> String {
    let (sample_x, sample_y) = match intent {
        Intent::SuggestCompetitor { occupancy, .. } => sample_point(occupancy.target),
        _ => (15, 85),
    };

    let mut fields: Vec<String> = Vec::new();
    if intent.kind() == IntentKind::SuggestCompetitor {
        fields.push("  \"name\": \"Item name\"".to_string());
    }
    fields.push(format!("  \"xValue\": {sample_x}"));
    fields.push(format!("  \"yValue\": {sample_y}"));
    fields.push("  \"domain\": \"example.com\"".to_string());
    fields.push("  \"reasoning\": \"...\"".to_string());
    let samples: Vec<String> = (1..=highlights)
        .map(|i| format!("\"Highlight {i}\""))
        .collect();
    fields.push(format!("  \"highlights\": [{}]", samples.join(", ")));
    if !attributes.is_empty() {
        let entries: Vec<String> = attributes
            .iter()
            .map(|a| format!("{}: \"value\"", Value::String(a.clone())))
            .collect();
        fields.push(format!("  \"attributes\": {{ {} }}", entries.join(", ")));
    }
    fields.push("  \"sources\": []".to_string());

    format!("{{\n{}\n}}", fields.join(",\n"))
}

/// A point well inside a quadrant, used as the sample in the output shape.
fn sample_point(quadrant: Quadrant) -> (u8, u8) {
    let x = if quadrant.high_x() { 75 } else { 25 };
    let y = if quadrant.high_y() { 75 } else { 25 };
    (x, y)
}

/// Collapse user-supplied text to a single trimmed line without control
/// characters, so it cannot break the prompt's block structure.
fn one_line(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalized_name(s: &str) -> String {
    one_line(s).to_lowercase()
}

/// Axis values rounded to one decimal; whole numbers print without a fraction.
fn fmt_value(v: f64) -> String {
    let rounded = (v * 10.0).round() / 10.0;
    format!("{rounded}")
}

// =============================================================================
// TESTS
// =============================================================================
