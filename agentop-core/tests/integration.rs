//! Integration tests for the agentop aggregation pipeline
//!
//! These tests build agent home directories under tempdirs (plus one static
//! fixture in `tests/fixtures/`) and drive the public `Aggregator` API
//! end-to-end: discovery, incremental tailing, folding, status inference,
//! and snapshot publication.

use agentop_core::parse::Records;
use agentop_core::types::{AgentStatus, SortKey};
use agentop_core::{Aggregator, PriceTable, PricingTier};
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Create an agent home directory skeleton, returning the projects subdir.
fn agent_home(dir: &Path) -> PathBuf {
    let projects = dir.join("projects").join("proj");
    std::fs::create_dir_all(&projects).unwrap();
    std::fs::create_dir_all(dir.join("todos")).unwrap();
    projects
}

/// An assistant record with usage, `secs_ago` before now.
fn assistant_line(secs_ago: i64, agent_id: &str, session_id: &str, stop_reason: &str) -> String {
    let ts = (Utc::now() - chrono::Duration::seconds(secs_ago))
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    format!(
        "{{\"timestamp\":\"{ts}\",\"type\":\"assistant\",\"agentId\":\"{agent_id}\",\
         \"sessionId\":\"{session_id}\",\"cwd\":\"/home/dev/proj\",\
         \"message\":{{\"model\":\"claude-sonnet-4-5-20250929\",\
         \"usage\":{{\"input_tokens\":100,\"output_tokens\":50,\
         \"cache_creation_input_tokens\":10,\"cache_read_input_tokens\":5}},\
         \"stop_reason\":\"{stop_reason}\"}}}}\n"
    )
}

fn aggregator(dir: &Path) -> Aggregator {
    Aggregator::new(dir, PriceTable::bundled(), PricingTier::Bundled)
}

// ============================================
// Fixture parsing
// ============================================

#[test]
fn test_parse_fixture_file() {
    let text = std::fs::read_to_string(fixture_path("agent-sample.jsonl")).unwrap();

    let mut records = Vec::new();
    let mut failures = Vec::new();
    for parsed in Records::new(&text, 0) {
        match parsed {
            Ok(r) => records.push(r),
            Err(f) => failures.push(f),
        }
    }

    // 4 valid records around 1 malformed line.
    assert_eq!(records.len(), 4);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].reason.contains("JSON parse error"));

    // Failure offset is file-absolute and points at the bad line.
    let bad = &text[failures[0].offset as usize..];
    assert!(bad.starts_with("this line is not valid json"));

    assert_eq!(records[0].agent_id.as_deref(), Some("a4767a09"));
    assert_eq!(
        records[1].model.as_deref(),
        Some("claude-sonnet-4-5-20250929")
    );
    assert_eq!(records[1].usage.unwrap().input_tokens, 100);
}

// ============================================
// End-to-end aggregation
// ============================================

#[test]
fn test_scan_two_agents_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let projects = agent_home(tmp.path());

    // alpha active, beta waiting (end_turn 10 minutes ago).
    std::fs::write(
        projects.join("agent-alpha.jsonl"),
        assistant_line(5, "alpha", "sess-1", "tool_use"),
    )
    .unwrap();
    std::fs::write(
        projects.join("agent-beta.jsonl"),
        assistant_line(600, "beta", "sess-2", "end_turn"),
    )
    .unwrap();

    let agg = aggregator(tmp.path());
    agg.scan_all();
    let snap = agg.current_snapshot();

    assert_eq!(snap.metrics.total_agents, 2);
    assert_eq!(snap.metrics.active_agents, 1);
    assert_eq!(snap.metrics.waiting_agents, 1);
    assert_eq!(snap.metrics.total_sessions, 2);
    assert_eq!(snap.agents["alpha"].status, AgentStatus::Active);
    assert_eq!(snap.agents["beta"].status, AgentStatus::WaitingForUser);

    // Bundled sonnet rates over (100, 50, 10, 5):
    // 300 + 750 + 37 + 1 micro-dollars per agent.
    assert_eq!(snap.agents["alpha"].usage.cost.micros(), 1088);
    assert_eq!(snap.metrics.total_cost.micros(), 2 * 1088);

    // Model normalized for pricing but stored raw.
    assert_eq!(
        snap.agents["alpha"].model.as_deref(),
        Some("claude-sonnet-4-5-20250929")
    );
}

#[test]
fn test_scan_all_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let projects = agent_home(tmp.path());
    std::fs::write(
        projects.join("agent-alpha.jsonl"),
        assistant_line(300, "alpha", "sess-1", "tool_use"),
    )
    .unwrap();

    let agg = aggregator(tmp.path());
    agg.scan_all();
    let first = agg.current_snapshot();
    agg.scan_all();
    let second = agg.current_snapshot();

    assert_eq!(*first, *second);
}

#[test]
fn test_incremental_equals_full_read() {
    let tmp = TempDir::new().unwrap();
    let projects = agent_home(tmp.path());
    let log = projects.join("agent-alpha.jsonl");

    let lines = [
        assistant_line(120, "alpha", "sess-1", "tool_use"),
        assistant_line(90, "alpha", "sess-1", "tool_use"),
        assistant_line(60, "alpha", "sess-1", "end_turn"),
    ];

    // Incremental: one line at a time through on_file_changed.
    std::fs::write(&log, &lines[0]).unwrap();
    let incremental = aggregator(tmp.path());
    incremental.scan_all();
    for line in &lines[1..] {
        let mut f = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
        f.write_all(line.as_bytes()).unwrap();
        drop(f);
        incremental.on_file_changed(&log);
    }

    // Full: a fresh aggregator over the complete file.
    let full = aggregator(tmp.path());
    full.scan_all();

    let a = incremental.current_snapshot().agents["alpha"].clone();
    let b = full.current_snapshot().agents["alpha"].clone();
    assert_eq!(a.usage, b.usage);
    assert_eq!(a.message_count, b.message_count);
    assert_eq!(a.created_at, b.created_at);
    assert_eq!(a.last_activity, b.last_activity);
    assert_eq!(a.last_stop_reason, b.last_stop_reason);
}

#[test]
fn test_rewritten_file_rebuilds_agent() {
    let tmp = TempDir::new().unwrap();
    let projects = agent_home(tmp.path());
    let log = projects.join("agent-alpha.jsonl");

    let two = format!(
        "{}{}",
        assistant_line(120, "alpha", "sess-1", "tool_use"),
        assistant_line(90, "alpha", "sess-1", "tool_use")
    );
    std::fs::write(&log, two).unwrap();

    let agg = aggregator(tmp.path());
    agg.scan_all();
    assert_eq!(agg.current_snapshot().agents["alpha"].message_count, 2);

    // Rewrite with a single, shorter record: offset resets, state rebuilds.
    std::fs::write(&log, assistant_line(30, "alpha", "sess-1", "end_turn")).unwrap();
    agg.scan_all();

    let agent = agg.current_snapshot().agents["alpha"].clone();
    assert_eq!(agent.message_count, 1);
    assert_eq!(agent.usage.input_tokens, 100);
}

#[test]
fn test_vanished_file_excluded_others_kept() {
    let tmp = TempDir::new().unwrap();
    let projects = agent_home(tmp.path());
    let alpha = projects.join("agent-alpha.jsonl");
    std::fs::write(&alpha, assistant_line(60, "alpha", "sess-1", "tool_use")).unwrap();
    std::fs::write(
        projects.join("agent-beta.jsonl"),
        assistant_line(60, "beta", "sess-2", "tool_use"),
    )
    .unwrap();

    let agg = aggregator(tmp.path());
    agg.scan_all();
    assert_eq!(agg.current_snapshot().agents.len(), 2);

    std::fs::remove_file(&alpha).unwrap();
    agg.scan_all();

    let snap = agg.current_snapshot();
    assert_eq!(snap.agents.len(), 1);
    assert!(snap.agents.contains_key("beta"));
}

#[test]
fn test_malformed_lines_survive_and_count() {
    let tmp = TempDir::new().unwrap();
    let projects = agent_home(tmp.path());
    let text = format!(
        "{}garbage\n{{\"truncated\":\n{}",
        assistant_line(90, "alpha", "sess-1", "tool_use"),
        assistant_line(60, "alpha", "sess-1", "tool_use")
    );
    std::fs::write(projects.join("agent-alpha.jsonl"), text).unwrap();

    let agg = aggregator(tmp.path());
    agg.scan_all();

    let snap = agg.current_snapshot();
    assert_eq!(snap.parse_failures, 2);
    assert_eq!(snap.agents["alpha"].message_count, 2);
    assert_eq!(snap.agents["alpha"].usage.input_tokens, 200);
}

#[test]
fn test_fallback_agent_id_from_file_name() {
    let tmp = TempDir::new().unwrap();
    let projects = agent_home(tmp.path());
    // No agentId anywhere in the records.
    let ts = (Utc::now() - chrono::Duration::seconds(60)).to_rfc3339_opts(SecondsFormat::Millis, true);
    std::fs::write(
        projects.join("agent-fa11bacc.jsonl"),
        format!("{{\"timestamp\":\"{ts}\",\"type\":\"user\",\"sessionId\":\"sess-9\"}}\n"),
    )
    .unwrap();

    let agg = aggregator(tmp.path());
    agg.scan_all();
    assert!(agg.current_snapshot().agents.contains_key("fa11bacc"));
}

#[test]
fn test_sorted_and_filtered_queries() {
    let tmp = TempDir::new().unwrap();
    let projects = agent_home(tmp.path());
    std::fs::write(
        projects.join("agent-alpha.jsonl"),
        assistant_line(600, "alpha", "sess-1", "tool_use"),
    )
    .unwrap();
    std::fs::write(
        projects.join("agent-beta.jsonl"),
        assistant_line(5, "beta", "sess-2", "tool_use"),
    )
    .unwrap();

    let agg = aggregator(tmp.path());
    agg.scan_all();

    let by_activity = agg.agents_sorted(SortKey::LastActivity);
    assert_eq!(by_activity[0].agent_id, "beta");
    assert_eq!(by_activity[1].agent_id, "alpha");

    let active = agg.agents_filtered(Some(AgentStatus::Active), SortKey::LastActivity);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].agent_id, "beta");
}
