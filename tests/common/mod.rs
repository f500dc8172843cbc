#![allow(dead_code)]

use chrono::Duration;
use quorum::agents::{Agent, AgentContext, RunSummary};
use quorum::core::config::Settings;
use quorum::core::error::QuorumError;
use quorum::core::oracle::ScriptedOracle;
use quorum::core::records::{self, Event, EventQuery, EventType};
use quorum::core::store::Store;
use quorum::core::time::FixedClock;
use std::sync::Arc;
use tempfile::TempDir;

/// 2026-01-15T12:00:00Z
pub const T0: i64 = 1_768_478_400;

pub struct Fixture {
    pub dir: TempDir,
    pub clock: Arc<FixedClock>,
    pub store: Store,
    pub settings: Settings,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock::at_epoch(T0));
        let store = Store::open_with_clock(dir.path(), clock.clone()).unwrap();
        Self {
            dir,
            clock,
            store,
            settings: Settings::default(),
        }
    }

    pub fn advance_hours(&self, hours: i64) {
        self.clock.advance(Duration::hours(hours));
    }

    pub fn advance_days(&self, days: i64) {
        self.clock.advance(Duration::days(days));
    }

    pub fn run(&self, agent: &dyn Agent, oracle: &ScriptedOracle) -> Result<RunSummary, QuorumError> {
        let ctx = AgentContext::new(&self.store, oracle, &self.settings);
        agent.run(&ctx)
    }

    pub fn events_by(&self, actor: &str, event_type: EventType) -> Vec<Event> {
        records::query_events(
            &self.store,
            &EventQuery {
                actors: vec![actor.to_string()],
                event_types: vec![event_type],
                ..EventQuery::default()
            },
        )
        .unwrap()
    }

    pub fn turn(&self, conversation: &str, content: &str) -> String {
        records::insert_turn(&self.store, conversation, "user", content)
            .unwrap()
            .id
    }
}

/// Parses the JSON payload of the `n`th oracle call.
pub fn payload(oracle: &ScriptedOracle, n: usize) -> serde_json::Value {
    let calls = oracle.calls();
    serde_json::from_str(&calls[n].payload).unwrap()
}
