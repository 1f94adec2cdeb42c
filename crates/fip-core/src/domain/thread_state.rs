//! The cumulative, machine-readable understanding of a thread.
//!
//! This is the object the Updater produces and the Gatekeeper consumes.
//! Field names follow the JSON schema given to the LLM (camelCase,
//! PascalCase enum variants) rather than Rust convention, because this
//! struct's wire shape *is* the prompt contract described in
//! `pipeline::updater::prompt`.

use serde::{Deserialize, Serialize};

/// The cumulative state document. Must be monotonic in fact content:
/// previous `repro_steps` and `known_environment` entries are preserved
/// or refined, never dropped silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadState {
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_goal: Option<String>,
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub known_environment: KnownEnvironment,
    #[serde(default)]
    pub repro_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_behavior: Option<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub resolved_questions: Vec<String>,
    #[serde(default)]
    pub signals: Signals,
    #[serde(default)]
    pub work_item_candidates: Vec<WorkItemCandidate>,
    #[serde(default)]
    pub recommendation: Recommendation,
    #[serde(default)]
    pub duplicate_hint: DuplicateHint,
}

impl Default for ThreadState {
    fn default() -> Self {
        Self {
            summary: String::new(),
            user_goal: None,
            intent: Intent::Other,
            known_environment: KnownEnvironment::default(),
            repro_steps: Vec::new(),
            expected_behavior: None,
            actual_behavior: None,
            open_questions: Vec::new(),
            resolved_questions: Vec::new(),
            signals: Signals::default(),
            work_item_candidates: Vec::new(),
            recommendation: Recommendation::default(),
            duplicate_hint: DuplicateHint::default(),
        }
    }
}

impl ThreadState {
    /// Merge a freshly-produced state on top of the previous one so the
    /// monotonicity invariant holds regardless of what the LLM chose to
    /// repeat: every prior repro step is kept (by value, de-duplicated,
    /// original order first) and every known-environment key already
    /// set is kept unless the new state provides a non-empty refinement.
    pub fn merge_preserving(mut self, previous: &ThreadState) -> ThreadState {
        let mut repro_steps = previous.repro_steps.clone();
        for step in &self.repro_steps {
            if !repro_steps.contains(step) {
                repro_steps.push(step.clone());
            }
        }
        self.repro_steps = repro_steps;

        self.known_environment = self.known_environment.merge_preserving(&previous.known_environment);

        for q in &previous.resolved_questions {
            if !self.resolved_questions.contains(q) {
                self.resolved_questions.push(q.clone());
            }
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Intent {
    Bug,
    Feature,
    Performance,
    Billing,
    #[default]
    Other,
}

/// Optional environment facts the Updater has gathered. Once a key is
/// set it must never revert to `None` in a later state (monotonicity).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownEnvironment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl KnownEnvironment {
    fn merge_preserving(self, previous: &KnownEnvironment) -> KnownEnvironment {
        KnownEnvironment {
            device: self.device.or_else(|| previous.device.clone()),
            os: self.os.or_else(|| previous.os.clone()),
            browser: self.browser.or_else(|| previous.browser.clone()),
            app_version: self.app_version.or_else(|| previous.app_version.clone()),
            hardware: self.hardware.or_else(|| previous.hardware.clone()),
            network: self.network.or_else(|| previous.network.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_guess: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemCandidate {
    #[serde(rename = "type")]
    pub kind: WorkItemType,
    pub short_title: String,
    pub reason: String,
    pub confidence: f32,
}

/// Superset of `RecommendationAction`'s two ticket-creating variants:
/// the Gatekeeper's fallback coercion (rule 4) must be able to name
/// `Chore`/`Docs` as a landing spot even though the Updater's
/// `recommendation.action` never produces them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WorkItemType {
    Bug,
    Feature,
    Chore,
    Docs,
}

impl WorkItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkItemType::Bug => "bug",
            WorkItemType::Feature => "feature",
            WorkItemType::Chore => "chore",
            WorkItemType::Docs => "docs",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub action: RecommendationAction,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub confidence: f32,
}

impl Default for Recommendation {
    fn default() -> Self {
        Self {
            action: RecommendationAction::NoTicket,
            reason: String::new(),
            confidence: 0.0,
        }
    }
}

/// Unknown `action` values deserialize to `NoTicket` via `#[serde(other)]`,
/// so an LLM response using a not-yet-recognized action name degrades
/// safely instead of failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RecommendationAction {
    #[serde(other)]
    NoTicket,
    AskQuestions,
    CreateBugWorkItem,
    CreateFeatureWorkItem,
    SplitIntoTwo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateHint {
    #[serde(default)]
    pub possible_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_work_item_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_ticket_url: Option<String>,
}
