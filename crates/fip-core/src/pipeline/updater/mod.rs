//! ThreadState Updater (Job A): loads a thread's full conversation,
//! calls the LLM for an updated cumulative state, validates it, and
//! persists it transactionally.
//!
//! Build prompt, call LLM, validate, persist, using
//! [`crate::llm::RetryingLlmClient::chat_completion_json`] for the
//! repair/corrective-retry ladder and
//! [`crate::storage::threads::update_thread_state`] for the
//! optimistic-concurrency persist.

pub mod prompt;

use crate::domain::{Message, Thread, ThreadState};
use crate::error::{LlmError, PipelineError, StorageError};
use crate::llm::{GenerationParams, RetryingLlmClient};
use crate::storage::{audit, threads, DbPool};
use tokio_util::sync::CancellationToken;

const MAX_CORRECTIVE_RETRIES: u32 = 1;

fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.deleted_at.is_none())
        .map(|m| {
            let who = m.sender_name.as_deref().unwrap_or_else(|| match m.sender_type {
                crate::domain::SenderType::User => "user",
                crate::domain::SenderType::Internal => "internal",
            });
            format!("{who}: {}", m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Validates the Updater's structural invariants that are cheap to
/// check synchronously. Semantic monotonicity is enforced afterward by
/// `ThreadState::merge_preserving`, not here.
fn validate_state(state: &ThreadState) -> Result<(), String> {
    use crate::domain::RecommendationAction;

    if !(0.0..=1.0).contains(&state.recommendation.confidence) {
        return Err(format!(
            "recommendation.confidence {} out of range [0,1]",
            state.recommendation.confidence
        ));
    }

    for candidate in &state.work_item_candidates {
        if !(0.0..=1.0).contains(&candidate.confidence) {
            return Err(format!(
                "workItemCandidates confidence {} out of range [0,1]",
                candidate.confidence
            ));
        }
    }

    let requires_candidates = matches!(
        state.recommendation.action,
        RecommendationAction::CreateBugWorkItem | RecommendationAction::CreateFeatureWorkItem
    );
    if requires_candidates && state.work_item_candidates.is_empty() {
        return Err(
            "recommendation.action requires a work item but workItemCandidates is empty".to_string(),
        );
    }

    Ok(())
}

/// Run the Updater for one thread: load its messages, call the LLM,
/// merge the result over the previous state, and persist it. Returns
/// the thread's resulting `ThreadState` (the previous one, unchanged,
/// on a malformed-response outcome).
pub async fn update_full_context(
    pool: &DbPool,
    llm: &RetryingLlmClient,
    thread_id: i64,
    cancel: CancellationToken,
) -> Result<ThreadState, PipelineError> {
    let mut thread = threads::get_thread(pool, thread_id).await?;
    let messages = messages_for(pool, thread_id).await?;
    let transcript = render_transcript(&messages);

    let previous_state_json =
        serde_json::to_string(&thread.thread_state).expect("ThreadState always serializes");
    let params = GenerationParams {
        max_tokens: 2048,
        temperature: 0.2,
        system_prompt: None,
    };

    let completion = llm
        .chat_completion_json::<ThreadState, _>(
            &prompt::system_prompt(),
            &prompt::user_prompt(&previous_state_json, &transcript),
            |state: &ThreadState| validate_state(state),
            &params,
            MAX_CORRECTIVE_RETRIES,
            cancel,
        )
        .await;

    let new_state = match completion {
        Ok(completion) => completion.data,
        Err(err) if err.is_unavailable() => {
            return Err(PipelineError::LlmUnavailable { thread_id });
        }
        Err(LlmError::Malformed { reason, raw_content }) => {
            audit::append(
                pool,
                "thread",
                thread_id,
                "threadstate_update_failed",
                Some(serde_json::json!({
                    "reason": reason,
                    "rawContent": raw_content,
                    "promptVersion": prompt::PROMPT_VERSION,
                })),
            )
            .await?;
            return Ok(thread.thread_state);
        }
        Err(_) => {
            // `chat_completion_json` only ever produces `Unavailable`
            // (handled above) or `Malformed` (handled above); any other
            // variant reaching here is treated as the conservative,
            // retry-rather-than-advance case.
            return Err(PipelineError::LlmUnavailable { thread_id });
        }
    };

    let merged = new_state.merge_preserving(&thread.thread_state);

    let mut applied = persist_state_and_audit(pool, thread_id, thread.updated_at, &merged).await?;
    if !applied {
        thread = threads::get_thread(pool, thread_id).await?;
        applied = persist_state_and_audit(pool, thread_id, thread.updated_at, &merged).await?;
    }
    if !applied {
        return Err(PipelineError::Storage(StorageError::Conflict {
            entity: "thread".to_string(),
            id: thread_id,
        }));
    }

    Ok(merged)
}

/// Persists the merged state and writes the `threadstate_updated` audit
/// entry inside a single transaction, so the two writes land as one
/// logical step: either both commit or neither does. Returns `false`
/// (transaction rolled back, nothing written) on an
/// optimistic-concurrency conflict, so the caller can reload and retry.
async fn persist_state_and_audit(
    pool: &DbPool,
    thread_id: i64,
    expected_updated_at: chrono::DateTime<chrono::Utc>,
    merged: &ThreadState,
) -> Result<bool, StorageError> {
    let mut tx = pool.begin().await.map_err(|e| StorageError::Query { source: e })?;

    let applied = threads::update_thread_state(&mut *tx, thread_id, expected_updated_at, merged).await?;
    if !applied {
        tx.rollback().await.map_err(|e| StorageError::Query { source: e })?;
        return Ok(false);
    }

    audit::append(
        &mut *tx,
        "thread",
        thread_id,
        "threadstate_updated",
        Some(serde_json::json!({ "promptVersion": prompt::PROMPT_VERSION })),
    )
    .await?;

    tx.commit().await.map_err(|e| StorageError::Query { source: e })?;
    Ok(true)
}

async fn messages_for(pool: &DbPool, thread_id: i64) -> Result<Vec<Message>, StorageError> {
    crate::storage::messages::list_messages_for_thread(pool, thread_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecommendationAction, WorkItemCandidate, WorkItemType};

    #[test]
    fn validate_state_rejects_out_of_range_confidence() {
        let mut state = ThreadState::default();
        state.recommendation.confidence = 1.5;
        assert!(validate_state(&state).is_err());
    }

    #[test]
    fn validate_state_requires_candidates_for_bug_recommendation() {
        let mut state = ThreadState::default();
        state.recommendation.action = RecommendationAction::CreateBugWorkItem;
        state.recommendation.confidence = 0.9;
        assert!(validate_state(&state).is_err());

        state.work_item_candidates.push(WorkItemCandidate {
            kind: WorkItemType::Bug,
            short_title: "crash on save".to_string(),
            reason: "repeated user reports".to_string(),
            confidence: 0.9,
        });
        assert!(validate_state(&state).is_ok());
    }

    #[test]
    fn validate_state_accepts_default() {
        assert!(validate_state(&ThreadState::default()).is_ok());
    }

    #[test]
    fn render_transcript_uses_sender_name_when_present() {
        let messages = vec![Message {
            id: 1,
            public_id: "m1".to_string(),
            thread_id: 1,
            source: crate::domain::MessageSource::Widget,
            sender_type: crate::domain::SenderType::User,
            sender_name: Some("Alex".to_string()),
            visibility: crate::domain::Visibility::Public,
            text: "it crashes".to_string(),
            metadata: None,
            created_at: chrono::Utc::now(),
            deleted_at: None,
        }];
        let transcript = render_transcript(&messages);
        assert_eq!(transcript, "Alex: it crashes");
    }
}
