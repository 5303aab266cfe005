//! Folding log records into agent state
//!
//! [`fold`] incorporates an ordered batch of records into an [`Agent`],
//! creating it on the first batch. Records are processed in on-disk append
//! order: append order reflects the true causal sequence even under clock
//! skew, so the final record decides `last_activity` and the stop-reason
//! evidence. Timestamps are used for age computation and display only,
//! never for re-sorting.
//!
//! Folding is associative across batch boundaries: folding m records then n
//! records yields the same agent as folding all m + n at once. Costs
//! accumulate per record, priced with that record's model.

use crate::pricing::PriceTable;
use crate::types::{Agent, AgentStatus, LogRecord, RecordType, TokenUsage};
use chrono::{DateTime, Utc};

/// Fold a batch of records into an agent.
///
/// `fallback_agent_id` identifies the agent when no record carries an
/// `agentId` (typically the log file stem). Returns `None` only when there
/// is no previous agent and the batch is empty.
pub fn fold(
    prev: Option<Agent>,
    records: impl IntoIterator<Item = LogRecord>,
    fallback_agent_id: &str,
    pending_todo: bool,
    now: DateTime<Utc>,
    table: &PriceTable,
) -> Option<Agent> {
    let mut records = records.into_iter().peekable();

    let mut agent = match prev {
        Some(agent) => agent,
        None => {
            let first = records.peek()?;
            Agent {
                agent_id: first
                    .agent_id
                    .clone()
                    .unwrap_or_else(|| fallback_agent_id.to_string()),
                session_id: None,
                project_path: None,
                status: AgentStatus::Stopped,
                created_at: first.timestamp,
                last_activity: first.timestamp,
                usage: TokenUsage::default(),
                model: None,
                message_count: 0,
                last_record_type: None,
                last_stop_reason: None,
            }
        }
    };

    for record in records {
        if agent.session_id.is_none() {
            agent.session_id = record.session_id.clone();
        }
        if let Some(cwd) = record.cwd {
            agent.project_path = Some(cwd);
        }
        if let Some(model) = record.model {
            agent.model = Some(model);
        }

        if let Some(usage) = record.usage {
            // Price with the record's model; fall back to the last seen one.
            let cost = table.cost(&usage, agent.model.as_deref());
            agent.usage.accumulate(&usage, cost);
        }

        if matches!(record.record_type, RecordType::User | RecordType::Assistant) {
            agent.message_count += 1;
        }

        agent.last_activity = record.timestamp;
        agent.last_record_type = Some(record.record_type);
        agent.last_stop_reason = record.stop_reason;
    }

    reclassify(&mut agent, pending_todo, now);
    Some(agent)
}

/// Re-evaluate an agent's status against the current instant.
///
/// Used by the aggregator at publish time so every agent in one snapshot is
/// classified against the same `now`.
pub fn reclassify(agent: &mut Agent, pending_todo: bool, now: DateTime<Utc>) {
    agent.status = AgentStatus::classify(
        agent.last_activity,
        agent.last_record_type,
        agent.last_stop_reason,
        pending_todo,
        now,
    );
}
