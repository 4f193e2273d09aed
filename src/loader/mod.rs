// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Asynchronous, retrying resource loading.
//!
//! At most one load pass is active per document. A request arriving while one is active is
//! stored as the single pending "next" request; newer requests replace older pending ones, so
//! there is no unbounded queueing. Retry behavior is an explicit policy value and the backoff
//! timer goes through an injected clock, so both are testable without real time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::host::ReferenceSource;
use crate::model::{FileId, ResourceData};

/// Bounded-retry policy for resources that fail to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Whether a resource with the given attempt count gets another try.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Clock abstraction so retry backoff can be tested without timers.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// One unit of work in a load pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub file_id: FileId,
    /// Formula source for equation-kind resources; rendered instead of
    /// fetched.
    pub equation: Option<String>,
}

/// A coalesced load request for one theme variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub wanted: Vec<ResourceRequest>,
    pub dark: bool,
}

/// Result of a completed (non-terminated) load pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub loaded: Vec<(FileId, ResourceData)>,
    pub failed: Vec<FileId>,
    pub dark: bool,
}

#[derive(Debug, Default)]
struct GateState {
    active: bool,
    pending: Option<LoadRequest>,
}

/// Serializes load passes for one document.
///
/// `begin` either hands the request back for immediate execution or stashes
/// it as the pending pass; `finish` hands back the pending pass, if any, to
/// run next. The terminate flag is shared with in-flight passes and checked
/// before each unit of work.
#[derive(Debug, Clone, Default)]
pub struct LoaderGate {
    state: Arc<Mutex<GateState>>,
    terminate: Arc<AtomicBool>,
}

impl LoaderGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, request: LoadRequest) -> Option<LoadRequest> {
        let mut state = self.state.lock().expect("loader gate lock poisoned");
        if state.active {
            state.pending = Some(request);
            return None;
        }
        state.active = true;
        Some(request)
    }

    pub fn finish(&self) -> Option<LoadRequest> {
        let mut state = self.state.lock().expect("loader gate lock poisoned");
        match state.pending.take() {
            Some(next) => Some(next),
            None => {
                state.active = false;
                None
            }
        }
    }

    pub fn terminate_flag(&self) -> Arc<AtomicBool> {
        self.terminate.clone()
    }

    pub fn terminate(&self) {
        self.terminate.store(true, Ordering::SeqCst);
        let mut state = self.state.lock().expect("loader gate lock poisoned");
        state.pending = None;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }
}

/// Runs one load pass.
///
/// Returns `None` without producing an outcome when the terminate flag was
/// set; the caller must not notify anyone in that case.
pub async fn run_pass(
    request: LoadRequest,
    source: &dyn ReferenceSource,
    terminate: &AtomicBool,
) -> Option<LoadOutcome> {
    let mut loaded = Vec::new();
    let mut failed = Vec::new();

    for unit in &request.wanted {
        if terminate.load(Ordering::SeqCst) {
            debug!("load pass terminated before {}", unit.file_id);
            return None;
        }

        let fetched = match unit.equation.as_deref() {
            Some(formula) => source.render_equation(formula, request.dark).await,
            None => source.fetch_resource(&unit.file_id, request.dark).await,
        };

        match fetched {
            Some(data) => loaded.push((unit.file_id.clone(), data)),
            None => failed.push(unit.file_id.clone()),
        }
    }

    if terminate.load(Ordering::SeqCst) {
        return None;
    }

    Some(LoadOutcome {
        loaded,
        failed,
        dark: request.dark,
    })
}
