//! Observable dispatch runs.
//!
//! Start/retry requests return immediately while dispatch continues in the
//! background; the registry gives callers a status handle they can poll
//! instead of an unobservable detached task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Start,
    Retry,
    Followup,
}

/// Per-run counters, updated as candidates finish.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub processed: usize,
    pub connected: usize,
    pub pending: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub id: String,
    pub kind: RunKind,
    pub status: RunStatus,
    pub report: RunReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Shared registry of dispatch runs, newest first in listings.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<Mutex<HashMap<String, RunInfo>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, kind: RunKind) -> String {
        let id = Uuid::new_v4().to_string();
        let info = RunInfo {
            id: id.clone(),
            kind,
            status: RunStatus::Running,
            report: RunReport::default(),
            started_at: Utc::now(),
            finished_at: None,
        };
        self.lock().insert(id.clone(), info);
        id
    }

    pub fn update<F: FnOnce(&mut RunReport)>(&self, id: &str, f: F) {
        if let Some(info) = self.lock().get_mut(id) {
            f(&mut info.report);
        }
    }

    pub fn finish(&self, id: &str) {
        if let Some(info) = self.lock().get_mut(id) {
            info.status = RunStatus::Completed;
            info.finished_at = Some(Utc::now());
        }
    }

    pub fn get(&self, id: &str) -> Option<RunInfo> {
        self.lock().get(id).cloned()
    }

    pub fn list(&self) -> Vec<RunInfo> {
        let mut runs: Vec<RunInfo> = self.lock().values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RunInfo>> {
        self.runs.lock().unwrap_or_else(|e| e.into_inner())
    }
}
