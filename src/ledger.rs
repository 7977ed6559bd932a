use chrono::{DateTime, Utc};
use facegate_signature::Signature;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

use crate::store::{self, StoreError};

/// Newest events returned when no limit is asked for.
pub const DEFAULT_EVENT_LIMIT: usize = 100;
/// Hard cap on a single listing, whatever the caller asks for.
pub const MAX_EVENT_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Authorized,
    Unauthorized,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Authorized => "authorized",
            Outcome::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "authorized" => Ok(Outcome::Authorized),
            "unauthorized" => Ok(Outcome::Unauthorized),
            other => Err(format!(
                "unknown outcome {other:?}, expected authorized or unauthorized"
            )),
        }
    }
}

/// One identification decision, written exactly once per completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub id: u64,
    pub at: DateTime<Utc>,
    /// Camera or door that captured the probe.
    pub camera: Option<String>,
    /// Matched identity; `None` for unauthorized outcomes.
    pub identity: Option<Uuid>,
    pub outcome: Outcome,
    /// Best-candidate similarity, already rounded to four decimals.
    pub score: f64,
}

/// Probe signature kept back from a rejected scan, for manual review and
/// later enrollment. Tied to its event by id and stamped with the same
/// instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedProbe {
    pub event_id: u64,
    pub at: DateTime<Utc>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub outcome: Option<Outcome>,
    pub camera: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerState {
    next_event_id: u64,
    events: Vec<AccessEvent>,
    rejected: Vec<RejectedProbe>,
}

/// Append-only audit trail of identification decisions.
pub struct EventLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLedger {
    pub fn open(dir: &Path) -> Self {
        Self {
            path: dir.join("ledger.bin"),
            lock: Mutex::new(()),
        }
    }

    /// Persist one decision. For unauthorized outcomes the probe signature
    /// is retained in the same write, so event and probe land together or
    /// not at all.
    pub fn record(
        &self,
        outcome: Outcome,
        score: f64,
        identity: Option<Uuid>,
        camera: Option<&str>,
        probe: &Signature,
    ) -> Result<AccessEvent, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut state: LedgerState = store::load_state(&self.path)?;
        let id = state.next_event_id + 1;
        state.next_event_id = id;
        let event = AccessEvent {
            id,
            at: Utc::now(),
            camera: camera.map(str::to_string),
            identity,
            outcome,
            score,
        };
        state.events.push(event.clone());
        if outcome == Outcome::Unauthorized {
            state.rejected.push(RejectedProbe {
                event_id: id,
                at: event.at,
                signature: probe.to_bytes(),
            });
        }
        store::save_state(&self.path, &state)?;
        Ok(event)
    }

    /// Matching events, newest first. The limit defaults to 100 and is
    /// capped at 500.
    pub fn events(&self, filter: &EventFilter) -> Result<Vec<AccessEvent>, StoreError> {
        let state: LedgerState = store::load_state(&self.path)?;
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_EVENT_LIMIT)
            .min(MAX_EVENT_LIMIT);
        Ok(state
            .events
            .iter()
            .rev()
            .filter(|e| filter.outcome.map_or(true, |o| e.outcome == o))
            .filter(|e| {
                filter
                    .camera
                    .as_deref()
                    .map_or(true, |c| e.camera.as_deref() == Some(c))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn event(&self, id: u64) -> Result<Option<AccessEvent>, StoreError> {
        let state: LedgerState = store::load_state(&self.path)?;
        Ok(state.events.into_iter().find(|e| e.id == id))
    }

    /// Retained probes from rejected scans, newest first.
    pub fn rejected(&self) -> Result<Vec<RejectedProbe>, StoreError> {
        let state: LedgerState = store::load_state(&self.path)?;
        Ok(state.rejected.into_iter().rev().collect())
    }
}
