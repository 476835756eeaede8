//! Crisis classification heuristics.
//!
//! A crisis is never stored; it is derived from an execution on every cycle
//! from its input text and whatever the flow reported in its output.

use crate::execution::Execution;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Words that mark input text as a crisis on their own
const CRISIS_KEYWORDS: &[&str] = &["down", "outage", "crisis", "emergency", "critical"];

/// Incident priority. P0 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    /// Parse "P0".."P3" (case-insensitive). Anything else is None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P0" => Some(Priority::P0),
            "P1" => Some(Priority::P1),
            "P2" => Some(Priority::P2),
            "P3" => Some(Priority::P3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Priority::P0 | Priority::P1)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort rank for a raw priority label: P0=0 .. P3=3, unknown labels rank as P3
pub fn priority_rank(label: &str) -> u8 {
    match Priority::parse(label) {
        Some(Priority::P0) => 0,
        Some(Priority::P1) => 1,
        Some(Priority::P2) => 2,
        Some(Priority::P3) | None => 3,
    }
}

/// Broad category of a crisis, used for the icon and label
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CrisisType {
    Outage,
    Pr,
    Security,
    Billing,
    Safety,
    Other(String),
    Unknown,
}

impl CrisisType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "outage" => CrisisType::Outage,
            "pr" => CrisisType::Pr,
            "security" => CrisisType::Security,
            "billing" => CrisisType::Billing,
            "safety" => CrisisType::Safety,
            "" | "unknown" => CrisisType::Unknown,
            other => CrisisType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CrisisType::Outage => "outage",
            CrisisType::Pr => "PR",
            CrisisType::Security => "security",
            CrisisType::Billing => "billing",
            CrisisType::Safety => "safety",
            CrisisType::Other(s) => s.as_str(),
            CrisisType::Unknown => "unknown",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            CrisisType::Outage => "🔴",
            CrisisType::Pr => "📢",
            CrisisType::Security => "🔒",
            CrisisType::Billing => "💳",
            CrisisType::Safety => "⚠️",
            CrisisType::Other(_) | CrisisType::Unknown => "🚨",
        }
    }

    /// Human-readable label, e.g. "Outage Crisis"
    pub fn label(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{} Crisis", capitalized)
    }
}

/// What the input text alone says about an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextSignal {
    /// Any crisis keyword or keyword combination matched
    pub crisis: bool,
    /// Outage wording ("down"/"outage")
    pub outage: bool,
    /// Payment or billing wording
    pub billing: bool,
}

/// Keyword match over free text
pub fn text_signal(text: &str) -> TextSignal {
    let lower = text.to_lowercase();
    let has = |w: &str| lower.contains(w);

    let outage = has("down") || has("outage");
    let payment = has("payment") && (has("failed") || has("deducted"));
    let billing = has("billing") && (has("error") || has("issue"));

    TextSignal {
        crisis: CRISIS_KEYWORDS.iter().any(|k| has(k)) || payment || billing,
        outage,
        billing: payment || billing,
    }
}

/// Classification outcome for one execution
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub is_crisis: bool,
    /// Raw label as displayed; output wins over the text default
    pub priority: String,
    pub crisis_type: CrisisType,
    /// Score in [0, 1]
    pub score: f64,
}

/// Classify an execution.
///
/// Crisis when the text matches the keyword set, or the output carries
/// priority P0/P1, or the output says `crisis_detected: true`.
pub fn classify(exec: &Execution) -> Classification {
    let signal = exec.text().map(text_signal).unwrap_or_default();

    let output_priority = exec.output_str("priority").map(str::to_string);
    let output_high = output_priority
        .as_deref()
        .and_then(Priority::parse)
        .map(|p| p.is_high())
        .unwrap_or(false);

    let is_crisis = signal.crisis || output_high || exec.output_flag("crisis_detected");

    let priority = output_priority.unwrap_or_else(|| {
        if signal.outage {
            Priority::P1.to_string()
        } else {
            Priority::P2.to_string()
        }
    });

    let crisis_type = match exec.output_str("crisis_type") {
        Some(t) => CrisisType::parse(t),
        None if signal.outage => CrisisType::Outage,
        None if signal.billing => CrisisType::Billing,
        None => CrisisType::Unknown,
    };

    let score = exec
        .output_value("crisis_score")
        .and_then(Value::as_f64)
        .map(clamp_score)
        .unwrap_or(0.0);

    Classification {
        is_crisis,
        priority,
        crisis_type,
        score,
    }
}

/// Clamp to [0, 1]; NaN becomes 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
