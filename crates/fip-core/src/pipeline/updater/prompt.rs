//! The Updater's system prompt and JSON schema, kept together as one
//! versioned unit: the prompt is a contract, not prose, and is versioned
//! alongside the schema it describes. Bumping `PROMPT_VERSION` is the
//! signal that a deployed prompt/schema pair has changed in a way worth
//! distinguishing in the audit log.

/// Bump whenever the prompt text or the JSON schema it describes
/// changes in a way that could affect the shape or meaning of
/// `ThreadState`. Stamped onto `threadstate_updated` audit entries.
pub const PROMPT_VERSION: &str = "updater-v1";

/// The system prompt sent with every `updateFullContext` call. Restates
/// the schema inline (most OpenAI-compatible providers do not honor a
/// separate `response_format` schema reliably across vendors) and
/// enforces the invariants required of the output.
pub fn system_prompt() -> String {
    format!(
        r#"You maintain a structured understanding of a customer feedback thread.

You will be given the thread's current cumulative state (a JSON object) and the
full message history in order. Produce an updated state reflecting everything
in the conversation, old and new.

Rules:
- Output EXCLUSIVELY a single JSON object. No prose, no markdown, no code fences.
- Carry over every previous reproSteps entry and every knownEnvironment field
  already set. You may add to them; you must never drop or contradict one that
  was already established.
- intent is one of: Bug, Feature, Performance, Billing, Other.
- confidence values are calibrated: use >= 0.85 only when the user has stated the
  problem and a concrete next step unambiguously; use 0.5-0.7 when the intent is
  clear but details are thin; use < 0.4 when you are mostly guessing.
- If the conversation is not actionable feedback (a greeting, a thank-you, small
  talk), recommendation.action MUST be "NoTicket".
- If recommendation.action is "CreateBugWorkItem" or "CreateFeatureWorkItem",
  workItemCandidates MUST be non-empty.

Required JSON shape:
{{
  "summary": string,
  "userGoal": string | null,
  "intent": "Bug" | "Feature" | "Performance" | "Billing" | "Other",
  "knownEnvironment": {{"device": string|null, "os": string|null, "browser": string|null, "appVersion": string|null, "hardware": string|null, "network": string|null}},
  "reproSteps": [string],
  "expectedBehavior": string | null,
  "actualBehavior": string | null,
  "openQuestions": [string],
  "resolvedQuestions": [string],
  "signals": {{"sentiment": string|null, "urgency": string|null, "impactGuess": string|null}},
  "workItemCandidates": [{{"type": "Bug"|"Feature"|"Chore"|"Docs", "shortTitle": string, "reason": string, "confidence": number}}],
  "recommendation": {{"action": "NoTicket"|"AskQuestions"|"CreateBugWorkItem"|"CreateFeatureWorkItem"|"SplitIntoTwo", "reason": string, "confidence": number}},
  "duplicateHint": {{"possibleDuplicate": bool, "matchedWorkItemId": number|null, "matchedTicketUrl": string|null}}
}}

Schema version: {PROMPT_VERSION}."#,
    )
}

/// Render the current state plus the full conversation into the single
/// user-turn prompt passed to `jsonCompletion`.
pub fn user_prompt(previous_state_json: &str, transcript: &str) -> String {
    format!(
        "Current cumulative state:\n{previous_state_json}\n\n\
         Full conversation (oldest first):\n{transcript}\n\n\
         Reply with ONLY the updated JSON state object described in the system prompt."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_mentions_schema_version() {
        assert!(system_prompt().contains(PROMPT_VERSION));
    }

    #[test]
    fn system_prompt_forbids_prose_and_fences() {
        let prompt = system_prompt();
        assert!(prompt.contains("No prose"));
        assert!(prompt.contains("no code fences"));
    }

    #[test]
    fn user_prompt_embeds_state_and_transcript() {
        let rendered = user_prompt(r#"{"summary":""}"#, "user: hello\nagent: hi");
        assert!(rendered.contains(r#"{"summary":""}"#));
        assert!(rendered.contains("user: hello"));
    }
}
