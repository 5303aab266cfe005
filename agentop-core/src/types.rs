//! Core domain types for agentop
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Agent** | One monitored process whose activity lands in a dedicated log file |
//! | **LogRecord** | One parsed JSON-lines entry from an agent log |
//! | **Fold** | Incorporating a batch of records into an agent's accumulated state |
//! | **Snapshot** | An immutable, atomically-published view of all agents |
//!
//! Agents are never mutated in place by consumers: the aggregator owns the
//! authoritative map and publishes whole [`Snapshot`] values. The rendering
//! layer only ever reads the last published snapshot.

use crate::pricing::PricingTier;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================
// Money
// ============================================

/// A monetary amount in micro-USD (10^-6 dollars).
///
/// Costs are accumulated with integer arithmetic only, so folding the same
/// records always produces the identical amount. Floor rounding happens once
/// per record inside the cost calculation, never during accumulation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(pub u64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Construct from whole dollars.
    pub const fn from_dollars(dollars: u64) -> Self {
        Money(dollars * 1_000_000)
    }

    /// Micro-USD value.
    pub const fn micros(&self) -> u64 {
        self.0
    }

    /// Approximate value in dollars, for display only.
    pub fn as_dollars_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

// ============================================
// Log records
// ============================================

/// Type of a log record, from the `type` field of a JSON-lines entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    User,
    Assistant,
    System,
    /// Catch-all for record types we do not interpret
    Other,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::User => "user",
            RecordType::Assistant => "assistant",
            RecordType::System => "system",
            RecordType::Other => "other",
        }
    }

    /// Map a raw `type` string; unknown values become [`RecordType::Other`].
    pub fn from_raw(s: &str) -> Self {
        match s {
            "user" => RecordType::User,
            "assistant" => RecordType::Assistant,
            "system" => RecordType::System,
            _ => RecordType::Other,
        }
    }
}

/// Why an assistant turn stopped, from `message.stop_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    StopSequence,
    /// Catch-all for stop reasons we do not interpret
    Other,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::MaxTokens => "max_tokens",
            StopReason::ToolUse => "tool_use",
            StopReason::StopSequence => "stop_sequence",
            StopReason::Other => "other",
        }
    }

    /// Map a raw stop reason string; unknown values become [`StopReason::Other`].
    pub fn from_raw(s: &str) -> Self {
        match s {
            "end_turn" => StopReason::EndTurn,
            "max_tokens" => StopReason::MaxTokens,
            "tool_use" => StopReason::ToolUse,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::Other,
        }
    }
}

/// Token counters reported by a single record's `message.usage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl UsageCounters {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

/// One parsed entry from an agent log file. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Record timestamp (required field)
    pub timestamp: DateTime<Utc>,
    /// Record type (required field)
    pub record_type: RecordType,
    /// Agent identifier, if present
    pub agent_id: Option<String>,
    /// Session identifier, if present
    pub session_id: Option<String>,
    /// Working directory reported by the record
    pub cwd: Option<String>,
    /// Model identifier from `message.model`
    pub model: Option<String>,
    /// Token usage from `message.usage`
    pub usage: Option<UsageCounters>,
    /// Stop reason from `message.stop_reason`
    pub stop_reason: Option<StopReason>,
}

// ============================================
// Token usage accumulator
// ============================================

/// Cumulative token usage for one agent, with derived cost.
///
/// Cost accumulates record by record using that record's model, so folding
/// in two batches of sizes m and n yields the same value as one batch of
/// m + n, and cost is monotone non-decreasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub cost: Money,
}

impl TokenUsage {
    /// Fold one record's counters and its computed cost into the accumulator.
    pub fn accumulate(&mut self, counters: &UsageCounters, cost: Money) {
        self.input_tokens += counters.input_tokens;
        self.output_tokens += counters.output_tokens;
        self.cache_creation_tokens += counters.cache_creation_tokens;
        self.cache_read_tokens += counters.cache_read_tokens;
        self.cost += cost;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

// ============================================
// Agent
// ============================================

/// Activity state of an agent, derived from its log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Activity within the last 30 seconds
    Active,
    /// Recent activity (within the last hour), not waiting
    Idle,
    /// A turn ended recently and the agent appears parked on the operator
    WaitingForUser,
    /// No activity for over an hour
    Stopped,
}

/// Activity window for [`AgentStatus::Active`].
pub const ACTIVE_WINDOW_SECS: i64 = 30;
/// Recency window separating idle/waiting from [`AgentStatus::Stopped`].
pub const RECENT_WINDOW_SECS: i64 = 3600;

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Idle => "idle",
            AgentStatus::WaitingForUser => "waiting",
            AgentStatus::Stopped => "stopped",
        }
    }

    /// Classify an agent's status. Pure function of its inputs.
    ///
    /// Rules are evaluated in fixed priority order, first match wins:
    ///
    /// 1. `Active` if activity within the last 30 seconds. Recency trumps
    ///    stop-reason: a just-finished turn still reads as busy until the
    ///    active window expires.
    /// 2. `WaitingForUser` if within the last hour and either the last
    ///    record was an assistant `end_turn`, or a pending todo file exists
    ///    for the agent. Both evidentiary sources are consulted; a missing
    ///    todo file does not override a matching end_turn.
    /// 3. `Idle` if within the last hour.
    /// 4. `Stopped` otherwise.
    pub fn classify(
        last_activity: DateTime<Utc>,
        last_record_type: Option<RecordType>,
        last_stop_reason: Option<StopReason>,
        pending_todo: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let elapsed = now.signed_duration_since(last_activity);

        if elapsed <= Duration::seconds(ACTIVE_WINDOW_SECS) {
            return AgentStatus::Active;
        }

        if elapsed <= Duration::seconds(RECENT_WINDOW_SECS) {
            let turn_ended = last_record_type == Some(RecordType::Assistant)
                && last_stop_reason == Some(StopReason::EndTurn);
            if turn_ended || pending_todo {
                return AgentStatus::WaitingForUser;
            }
            return AgentStatus::Idle;
        }

        AgentStatus::Stopped
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived state of one monitored agent.
///
/// Created on first sighting of its log file, replaced by a new value on
/// every fold, and dropped from the published snapshot when its log file
/// disappears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent identifier (from records, or the log file stem)
    pub agent_id: String,
    /// Session this agent belongs to
    pub session_id: Option<String>,
    /// Project path (last seen cwd)
    pub project_path: Option<String>,
    /// Current derived status
    pub status: AgentStatus,
    /// Timestamp of the first record ever folded; preserved across folds
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent record
    pub last_activity: DateTime<Utc>,
    /// Cumulative token usage and cost
    pub usage: TokenUsage,
    /// Last-seen raw model identifier
    pub model: Option<String>,
    /// Number of user/assistant records seen
    pub message_count: u64,
    /// Last record type, kept for status inference only
    pub last_record_type: Option<RecordType>,
    /// Last stop reason, kept for status inference only
    pub last_stop_reason: Option<StopReason>,
}

impl Agent {
    /// Shortened agent id for display (first 7 characters).
    pub fn short_id(&self) -> &str {
        let end = self
            .agent_id
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.agent_id.len());
        &self.agent_id[..end]
    }
}

// ============================================
// Sorting and filtering
// ============================================

/// Sort order for agent listings. Ties break by agent id ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Most recent activity first
    #[default]
    LastActivity,
    /// Highest cost first
    Cost,
    /// Most total tokens first
    Tokens,
    /// Agent id ascending
    AgentId,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::LastActivity => "activity",
            SortKey::Cost => "cost",
            SortKey::Tokens => "tokens",
            SortKey::AgentId => "agent",
        }
    }

    /// Cycle to the next sort key (for the TUI `s` binding).
    pub fn next(&self) -> SortKey {
        match self {
            SortKey::LastActivity => SortKey::Cost,
            SortKey::Cost => SortKey::Tokens,
            SortKey::Tokens => SortKey::AgentId,
            SortKey::AgentId => SortKey::LastActivity,
        }
    }
}

// ============================================
// Metrics and snapshot
// ============================================

/// Aggregated metrics across all agents in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_agents: usize,
    pub active_agents: usize,
    pub idle_agents: usize,
    pub waiting_agents: usize,
    pub stopped_agents: usize,
    pub total_sessions: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub total_cost: Money,
}

impl Metrics {
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens
            + self.total_output_tokens
            + self.total_cache_creation_tokens
            + self.total_cache_read_tokens
    }
}

/// An immutable, fully-consistent view of all agents.
///
/// Published atomically by the aggregator; readers see either the fully-old
/// or fully-new snapshot, never an interleaving. Derives `PartialEq` so
/// re-scans with no intervening changes can be asserted value-identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Agents keyed by agent id
    pub agents: BTreeMap<String, Agent>,
    /// Summary metrics
    pub metrics: Metrics,
    /// Which pricing tier produced the costs in this snapshot
    pub pricing_tier: PricingTier,
    /// Lines that failed to parse across all scans, as a health counter
    pub parse_failures: u64,
}

impl Snapshot {
    /// Build a snapshot from an agent set, computing summary metrics.
    pub fn build(
        agents: BTreeMap<String, Agent>,
        pricing_tier: PricingTier,
        parse_failures: u64,
    ) -> Self {
        let mut metrics = Metrics {
            total_agents: agents.len(),
            ..Metrics::default()
        };
        let mut sessions = std::collections::HashSet::new();

        for agent in agents.values() {
            match agent.status {
                AgentStatus::Active => metrics.active_agents += 1,
                AgentStatus::Idle => metrics.idle_agents += 1,
                AgentStatus::WaitingForUser => metrics.waiting_agents += 1,
                AgentStatus::Stopped => metrics.stopped_agents += 1,
            }
            metrics.total_input_tokens += agent.usage.input_tokens;
            metrics.total_output_tokens += agent.usage.output_tokens;
            metrics.total_cache_creation_tokens += agent.usage.cache_creation_tokens;
            metrics.total_cache_read_tokens += agent.usage.cache_read_tokens;
            metrics.total_cost += agent.usage.cost;
            if let Some(ref sid) = agent.session_id {
                sessions.insert(sid.clone());
            }
        }
        metrics.total_sessions = sessions.len();

        Snapshot {
            agents,
            metrics,
            pricing_tier,
            parse_failures,
        }
    }

    /// All agents ordered by the given key, ties broken by agent id ascending.
    pub fn agents_sorted(&self, key: SortKey) -> Vec<&Agent> {
        let mut agents: Vec<&Agent> = self.agents.values().collect();
        match key {
            SortKey::LastActivity => {
                agents.sort_by(|a, b| {
                    b.last_activity
                        .cmp(&a.last_activity)
                        .then_with(|| a.agent_id.cmp(&b.agent_id))
                });
            }
            SortKey::Cost => {
                agents.sort_by(|a, b| {
                    b.usage
                        .cost
                        .cmp(&a.usage.cost)
                        .then_with(|| a.agent_id.cmp(&b.agent_id))
                });
            }
            SortKey::Tokens => {
                agents.sort_by(|a, b| {
                    b.usage
                        .total_tokens()
                        .cmp(&a.usage.total_tokens())
                        .then_with(|| a.agent_id.cmp(&b.agent_id))
                });
            }
            SortKey::AgentId => {
                // BTreeMap iteration is already id-ascending
            }
        }
        agents
    }

    /// Sorted agents restricted to one status, or all when `status` is `None`.
    pub fn agents_filtered(&self, status: Option<AgentStatus>, key: SortKey) -> Vec<&Agent> {
        self.agents_sorted(key)
            .into_iter()
            .filter(|a| status.map(|s| a.status == s).unwrap_or(true))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money(0).to_string(), "$0.000000");
        assert_eq!(Money(1_234_567).to_string(), "$1.234567");
        assert_eq!(Money::from_dollars(3).to_string(), "$3.000000");
    }

    #[test]
    fn test_active_wins_over_end_turn() {
        // Recency trumps stop-reason: end_turn 10s ago is still Active.
        let now = t0();
        let status = AgentStatus::classify(
            now - Duration::seconds(10),
            Some(RecordType::Assistant),
            Some(StopReason::EndTurn),
            true,
            now,
        );
        assert_eq!(status, AgentStatus::Active);
    }

    #[test]
    fn test_waiting_without_todo_file() {
        // end_turn 45 minutes ago, no todo file: still waiting.
        let now = t0();
        let status = AgentStatus::classify(
            now - Duration::minutes(45),
            Some(RecordType::Assistant),
            Some(StopReason::EndTurn),
            false,
            now,
        );
        assert_eq!(status, AgentStatus::WaitingForUser);
    }

    #[test]
    fn test_waiting_from_todo_signal_alone() {
        let now = t0();
        let status = AgentStatus::classify(
            now - Duration::minutes(10),
            Some(RecordType::User),
            None,
            true,
            now,
        );
        assert_eq!(status, AgentStatus::WaitingForUser);
    }

    #[test]
    fn test_idle_when_no_waiting_evidence() {
        let now = t0();
        let status = AgentStatus::classify(
            now - Duration::minutes(10),
            Some(RecordType::Assistant),
            Some(StopReason::ToolUse),
            false,
            now,
        );
        assert_eq!(status, AgentStatus::Idle);
    }

    #[test]
    fn test_stopped_regardless_of_message_type() {
        let now = t0();
        let status = AgentStatus::classify(
            now - Duration::hours(2),
            Some(RecordType::Assistant),
            Some(StopReason::EndTurn),
            true,
            now,
        );
        assert_eq!(status, AgentStatus::Stopped);
    }

    #[test]
    fn test_future_timestamp_is_active() {
        let now = t0();
        let status = AgentStatus::classify(now + Duration::seconds(5), None, None, false, now);
        assert_eq!(status, AgentStatus::Active);
    }

    fn test_agent(id: &str, cost: u64, tokens: u64, activity_offset: i64) -> Agent {
        Agent {
            agent_id: id.to_string(),
            session_id: Some("s1".to_string()),
            project_path: None,
            status: AgentStatus::Idle,
            created_at: t0(),
            last_activity: t0() + Duration::seconds(activity_offset),
            usage: TokenUsage {
                input_tokens: tokens,
                output_tokens: 0,
                cache_creation_tokens: 0,
                cache_read_tokens: 0,
                cost: Money(cost),
            },
            model: None,
            message_count: 1,
            last_record_type: None,
            last_stop_reason: None,
        }
    }

    fn snapshot_of(agents: Vec<Agent>) -> Snapshot {
        let map = agents
            .into_iter()
            .map(|a| (a.agent_id.clone(), a))
            .collect();
        Snapshot::build(map, PricingTier::Bundled, 0)
    }

    #[test]
    fn test_sort_by_cost_ties_break_by_id() {
        let snap = snapshot_of(vec![
            test_agent("bbb", 100, 10, 0),
            test_agent("aaa", 100, 20, 0),
            test_agent("ccc", 200, 5, 0),
        ]);
        let ids: Vec<&str> = snap
            .agents_sorted(SortKey::Cost)
            .iter()
            .map(|a| a.agent_id.as_str())
            .collect();
        assert_eq!(ids, vec!["ccc", "aaa", "bbb"]);
    }

    #[test]
    fn test_sort_by_last_activity_descending() {
        let snap = snapshot_of(vec![
            test_agent("aaa", 0, 0, 10),
            test_agent("bbb", 0, 0, 30),
            test_agent("ccc", 0, 0, 20),
        ]);
        let ids: Vec<&str> = snap
            .agents_sorted(SortKey::LastActivity)
            .iter()
            .map(|a| a.agent_id.as_str())
            .collect();
        assert_eq!(ids, vec!["bbb", "ccc", "aaa"]);
    }

    #[test]
    fn test_filter_by_status() {
        let mut active = test_agent("aaa", 0, 0, 0);
        active.status = AgentStatus::Active;
        let idle = test_agent("bbb", 0, 0, 0);
        let snap = snapshot_of(vec![active, idle]);

        let filtered = snap.agents_filtered(Some(AgentStatus::Active), SortKey::AgentId);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].agent_id, "aaa");

        let all = snap.agents_filtered(None, SortKey::AgentId);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_metrics_totals() {
        let snap = snapshot_of(vec![
            test_agent("aaa", 100, 10, 0),
            test_agent("bbb", 250, 40, 0),
        ]);
        assert_eq!(snap.metrics.total_agents, 2);
        assert_eq!(snap.metrics.total_sessions, 1);
        assert_eq!(snap.metrics.total_input_tokens, 50);
        assert_eq!(snap.metrics.total_cost, Money(350));
        assert_eq!(snap.metrics.idle_agents, 2);
    }
}
