// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! The per-document save/reload state machine.
//!
//! One `DocumentEngine` instance owns one open document: its scene, its save state, its reload
//! suppression window, and its resource-load passes. All state lives behind a single async mutex;
//! no lock is ever held across a suspension point, and every task resuming after an await
//! re-validates the document generation and the element it intends to mutate.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::format::{
    generate_container, parse_container, peek_text_mode, FormatError, WriteOptions,
};
use crate::host::{ExportKind, HostHandles, RevisionStamp, SceneUpdate};
use crate::loader::{run_pass, Clock, LoadRequest, LoaderGate, ResourceRequest, RetryPolicy, TokioClock};
use crate::merge::reconcile;
use crate::model::{Element, ElementId, ExportPreference, TextMode};
use crate::resolve;
use crate::scene::Scene;

const WARN_PARSE_FAILED: &str =
    "The document could not be parsed. Restore an earlier version from file history before \
     editing further.";
const WARN_WRITE_FAILED: &str =
    "Saving the document failed. Keep a manual backup of your work; saving will be retried \
     automatically.";
const WARN_SAVE_INTERNAL: &str =
    "An unexpected error occurred while saving. Copy your work to a backup before doing \
     anything else.";
const WARN_SAVE_IN_PROGRESS: &str = "Save aborted because another save is in progress.";

/// Engine tuning knobs, one value per document.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    autosave_interval: Duration,
    autosave_retry: Duration,
    suppression_window: Duration,
    merge_wait_interval: Duration,
    merge_wait_attempts: u32,
    compress: bool,
    auto_export: ExportPreference,
    retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(15),
            autosave_retry: Duration::from_secs(1),
            suppression_window: Duration::from_secs(2),
            merge_wait_interval: Duration::from_millis(100),
            merge_wait_attempts: 30,
            compress: true,
            auto_export: ExportPreference::None,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    pub fn with_autosave_retry(mut self, retry: Duration) -> Self {
        self.autosave_retry = retry;
        self
    }

    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = window;
        self
    }

    pub fn with_merge_wait(mut self, interval: Duration, attempts: u32) -> Self {
        self.merge_wait_interval = interval;
        self.merge_wait_attempts = attempts;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_auto_export(mut self, preference: ExportPreference) -> Self {
        self.auto_export = preference;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }
}

/// Explicit save/reload state, one value per document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Clean,
    /// Unsaved changes exist; the path records which on-disk target they
    /// belong to, so a save after the document identity changed mid-flight
    /// is detected as stale.
    Dirty { path: PathBuf },
    Saving,
    Autosaving,
    ForceSaving,
    /// Terminal for this document instance.
    Unloading,
}

impl EngineState {
    pub fn is_saving(&self) -> bool {
        matches!(self, Self::Saving | Self::Autosaving | Self::ForceSaving)
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, Self::Dirty { .. })
    }
}

#[derive(Debug)]
pub enum EngineError {
    Format(FormatError),
    Read { path: PathBuf, source: io::Error },
    Write { path: PathBuf, source: io::Error },
    SaveInProgress,
    Unloading,
    MergeAbandoned,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(source) => write!(f, "container format error: {source}"),
            Self::Read { path, source } => write!(f, "cannot read {path:?}: {source}"),
            Self::Write { path, source } => write!(f, "cannot write {path:?}: {source}"),
            Self::SaveInProgress => f.write_str("a save is already in progress"),
            Self::Unloading => f.write_str("document is unloading"),
            Self::MergeAbandoned => {
                f.write_str("reconciliation abandoned: exclusive section unavailable")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Format(source) => Some(source),
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            Self::SaveInProgress | Self::Unloading | Self::MergeAbandoned => None,
        }
    }
}

impl From<FormatError> for EngineError {
    fn from(source: FormatError) -> Self {
        Self::Format(source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveMode {
    Explicit,
    Auto,
    Force,
}

#[derive(Debug)]
struct DocState {
    scene: Scene,
    state: EngineState,
    /// Edits that arrived while a save was running; the save returns to
    /// `Dirty` with this path instead of `Clean`.
    dirty_while_saving: Option<PathBuf>,
    suppress_until: Option<Instant>,
    last_save_stamp: Option<RevisionStamp>,
    export_override: Option<ExportPreference>,
    warned_write_failure: bool,
}

/// The document synchronization engine.
///
/// Hosts create one instance per open document and route storage change
/// notifications, surface change callbacks, and user commands through it.
pub struct DocumentEngine {
    path: PathBuf,
    config: EngineConfig,
    host: HostHandles,
    clock: Arc<dyn Clock>,
    state: Mutex<DocState>,
    loader: LoaderGate,
    /// Bumped whenever the document identity changes (replacement or
    /// unload); suspended tasks compare it before applying results.
    generation: AtomicU64,
}

impl DocumentEngine {
    pub fn new(path: impl Into<PathBuf>, host: HostHandles, config: EngineConfig) -> Arc<Self> {
        Self::with_clock(path, host, config, Arc::new(TokioClock))
    }

    pub fn with_clock(
        path: impl Into<PathBuf>,
        host: HostHandles,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            config,
            host,
            clock,
            state: Mutex::new(DocState {
                scene: Scene::new(),
                state: EngineState::Clean,
                dirty_while_saving: None,
                suppress_until: None,
                last_save_stamp: None,
                export_override: None,
                warned_write_failure: false,
            }),
            loader: LoaderGate::new(),
            generation: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn state(&self) -> EngineState {
        self.state.lock().await.state.clone()
    }

    pub async fn scene(&self) -> Scene {
        self.state.lock().await.scene.clone()
    }

    fn generation_now(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Replaces the document content from container text.
    ///
    /// On a parse error the user is warned to restore from history and the
    /// previous state is left untouched; the host presents the raw text in
    /// an inert view instead.
    pub async fn set_document(self: &Arc<Self>, text: &str) -> Result<(), EngineError> {
        let doc = match parse_container(text) {
            Ok(doc) => doc,
            Err(source) => {
                error!("document parse failed: {source}");
                self.host.surface.warn_user(WARN_PARSE_FAILED);
                return Err(source.into());
            }
        };

        self.bump_generation();
        {
            let mut st = self.state.lock().await;
            if st.state == EngineState::Unloading {
                return Err(EngineError::Unloading);
            }
            st.scene = doc.scene;
            st.export_override = doc.export_override;
            st.state = EngineState::Clean;
            st.dirty_while_saving = None;
            st.suppress_until = None;
            st.warned_write_failure = false;

            self.host.surface.apply_update(
                SceneUpdate {
                    elements: Some(st.scene.elements().to_vec()),
                    resources: Vec::new(),
                    view: Some(st.scene.view().clone()),
                },
                true,
            );
        }

        self.load_scene_resources().await;
        Ok(())
    }

    /// Current container text, after pulling the latest scene state from the
    /// rendering surface. Pull-based counterpart of the host's generic
    /// "read current content" call.
    pub async fn serialized_document(&self) -> Result<String, EngineError> {
        let mut st = self.state.lock().await;
        self.sync_from_surface(&mut st);
        self.serialize_locked(&st).map_err(EngineError::from)
    }

    /// Called by the surface after every user-driven mutation.
    pub async fn mark_dirty(&self) {
        let mut st = self.state.lock().await;
        match st.state {
            EngineState::Unloading => {}
            EngineState::Saving | EngineState::Autosaving | EngineState::ForceSaving => {
                st.dirty_while_saving = Some(self.path.clone());
            }
            EngineState::Clean | EngineState::Dirty { .. } => {
                st.state = EngineState::Dirty {
                    path: self.path.clone(),
                };
            }
        }
    }

    /// Periodic autosave entry point. Returns true when a save actually ran.
    pub async fn autosave_tick(self: &Arc<Self>) -> bool {
        {
            let st = self.state.lock().await;
            let dirty_here = matches!(&st.state, EngineState::Dirty { path } if *path == self.path);
            if !dirty_here || self.host.surface.is_editing() {
                return false;
            }
        }

        match self.save_inner(SaveMode::Auto, true).await {
            Ok(saved) => saved,
            Err(err) => {
                debug!("autosave failed, staying dirty: {err}");
                false
            }
        }
    }

    /// Spawns the autosave timer for this document. The task exits once the
    /// engine enters `Unloading`. When a tick is skipped while dirty, the
    /// next attempt runs after the short retry interval.
    pub fn spawn_autosave(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut delay = engine.config.autosave_interval;
            loop {
                engine.clock.sleep(delay).await;

                let (unloading, dirty) = {
                    let st = engine.state.lock().await;
                    (st.state == EngineState::Unloading, st.state.is_dirty())
                };
                if unloading {
                    return;
                }

                let saved = engine.autosave_tick().await;
                delay = if !saved && dirty {
                    engine.config.autosave_retry
                } else {
                    engine.config.autosave_interval
                };
            }
        })
    }

    /// Explicit user-requested save. Refused (with a notice unless silent)
    /// while another save is running, rather than queued.
    pub async fn force_save(self: &Arc<Self>, silent: bool) -> Result<(), EngineError> {
        {
            let mut st = self.state.lock().await;
            if st.state == EngineState::Unloading {
                return Err(EngineError::Unloading);
            }
            if st.state.is_saving() {
                if !silent {
                    self.host.surface.warn_user(WARN_SAVE_IN_PROGRESS);
                }
                return Err(EngineError::SaveInProgress);
            }
            // a stale suppression window must not mask the change
            // notification a later legitimate external write produces
            st.suppress_until = None;
        }

        self.save_inner(SaveMode::Force, false).await?;
        self.load_scene_resources().await;
        info!("force save completed for {:?}", self.path);
        Ok(())
    }

    /// Storage change notification from the host.
    ///
    /// A no-op while the suppression window is armed (the flag is consumed)
    /// or while a save is in progress; otherwise the on-disk content is
    /// re-read and reconciled.
    pub async fn notify_external_change(self: &Arc<Self>, path: &Path) {
        if path != self.path {
            return;
        }

        {
            let mut st = self.state.lock().await;
            if let Some(until) = st.suppress_until.take() {
                if Instant::now() < until {
                    debug!("suppressed reload caused by our own write to {path:?}");
                    return;
                }
            }
            if st.state.is_saving() || st.state == EngineState::Unloading {
                return;
            }
        }

        if let Err(err) = self.reload(true).await {
            warn!("external change reload failed: {err}");
        }
    }

    /// Re-reads the on-disk content.
    ///
    /// A full reload feeds the content through the merge engine inside the
    /// per-document exclusive section; the lighter path refreshes only the
    /// text-mode metadata.
    pub async fn reload(self: &Arc<Self>, full: bool) -> Result<(), EngineError> {
        let generation = self.generation_now();
        let text = self
            .host
            .files
            .read(&self.path)
            .await
            .map_err(|source| EngineError::Read {
                path: self.path.clone(),
                source,
            })?;

        if !full {
            let mode = peek_text_mode(&text)?;
            let current = { self.state.lock().await.scene.text_mode() };
            if current != mode {
                return self.set_text_mode(mode).await;
            }
            return Ok(());
        }

        let doc = match parse_container(&text) {
            Ok(doc) => doc,
            Err(source) => {
                error!("reload parse failed: {source}");
                self.host.surface.warn_user(WARN_PARSE_FAILED);
                return Err(source.into());
            }
        };

        let deleted_ids: BTreeSet<ElementId> = doc
            .scene
            .elements()
            .iter()
            .filter(|element| element.is_deleted())
            .map(|element| element.id().clone())
            .collect();

        // Saves and reconciliations for the same document are mutually
        // exclusive. The section is bounded: if it cannot be entered within
        // the configured number of attempts the merge is abandoned and the
        // next change notification retries.
        for _ in 0..self.config.merge_wait_attempts {
            if self.generation_now() != generation {
                debug!("reload abandoned: document replaced while waiting");
                return Ok(());
            }

            {
                let mut st = self.state.lock().await;
                if st.state == EngineState::Unloading {
                    return Err(EngineError::Unloading);
                }
                if !st.state.is_saving() {
                    let outcome = reconcile(&mut st.scene, &doc.scene, &deleted_ids);
                    st.export_override = doc.export_override;

                    if outcome.dirty {
                        st.state = EngineState::Dirty {
                            path: self.path.clone(),
                        };
                    }

                    self.host.surface.apply_update(
                        SceneUpdate {
                            elements: Some(st.scene.elements().to_vec()),
                            resources: Vec::new(),
                            view: None,
                        },
                        false,
                    );

                    drop(st);
                    self.load_scene_resources().await;
                    return Ok(());
                }
            }

            self.clock.sleep(self.config.merge_wait_interval).await;
        }

        error!(
            "abandoning reconciliation of {:?}: save kept the exclusive section busy",
            self.path
        );
        Err(EngineError::MergeAbandoned)
    }

    /// Switches the document-wide text mode, re-deriving every text
    /// element's display text without mutating raw text.
    pub async fn set_text_mode(self: &Arc<Self>, mode: TextMode) -> Result<(), EngineError> {
        // flush pending edits first so the mode switch starts from the
        // persisted state
        match self.save_inner(SaveMode::Explicit, true).await {
            Ok(_) => {}
            Err(EngineError::SaveInProgress) => return Err(EngineError::SaveInProgress),
            Err(err) => return Err(err),
        }

        let pending = {
            let mut st = self.state.lock().await;
            let pending = resolve::apply_text_mode(&mut st.scene, mode, self.host.references.as_ref());
            self.host.surface.apply_update(
                SceneUpdate {
                    elements: Some(st.scene.elements().to_vec()),
                    resources: Vec::new(),
                    view: None,
                },
                false,
            );
            // undo must not resurrect the other representation
            self.host.surface.clear_history();
            pending
        };

        self.resolve_pending(pending).await;
        // the persisted header records the mode, so the on-disk form is
        // stale until the next save
        self.mark_dirty().await;
        Ok(())
    }

    /// Marks the document as going away: one best-effort final save, then
    /// the terminal `Unloading` state. No further saves or reconciliations
    /// start afterwards, and in-flight load passes abort.
    pub async fn begin_unload(self: &Arc<Self>) {
        let dirty = {
            let st = self.state.lock().await;
            if st.state == EngineState::Unloading {
                return;
            }
            st.state.is_dirty()
        };

        if dirty {
            if let Err(err) = self.save_inner(SaveMode::Explicit, true).await {
                warn!("final save before unload failed: {err}");
            }
        }

        let mut st = self.state.lock().await;
        st.state = EngineState::Unloading;
        st.suppress_until = None;
        self.loader.terminate();
        self.bump_generation();
    }

    /// Requests materialization of every unresolved resource the scene
    /// references. At most one pass runs at a time; a request arriving while
    /// one is active replaces any previously pending request. Returns the
    /// pass task when one was started.
    pub async fn load_scene_resources(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let generation = self.generation_now();
        let request = {
            let mut st = self.state.lock().await;
            if st.state == EngineState::Unloading {
                return None;
            }
            let unresolved = st.scene.discover_resources();
            if unresolved.is_empty() {
                return None;
            }
            let wanted = unresolved
                .into_iter()
                .filter_map(|file_id| {
                    st.scene.resources().get(file_id.as_str()).map(|resource| ResourceRequest {
                        file_id,
                        equation: resource.equation().map(str::to_owned),
                    })
                })
                .collect();
            LoadRequest {
                wanted,
                dark: st.scene.view().theme().is_dark(),
            }
        };

        let request = self.loader.begin(request)?;
        let engine = Arc::clone(self);
        Some(tokio::spawn(async move {
            engine.run_loader(request, generation).await;
        }))
    }

    async fn run_loader(self: &Arc<Self>, mut request: LoadRequest, generation: u64) {
        let terminate = self.loader.terminate_flag();
        loop {
            let outcome = run_pass(request, self.host.references.as_ref(), &terminate).await;
            let Some(outcome) = outcome else {
                // terminated: abort without notifying anyone
                return;
            };

            let mut retry_wanted: Vec<ResourceRequest> = Vec::new();
            {
                let mut st = self.state.lock().await;
                if self.generation_now() != generation {
                    return;
                }

                for (file_id, data) in &outcome.loaded {
                    if let Some(resource) = st.scene.resources_mut().get_mut(file_id.as_str()) {
                        resource.set_data(data.clone());
                        resource.set_dark_variant(outcome.dark);
                    }
                }

                for file_id in &outcome.failed {
                    if let Some(resource) = st.scene.resources_mut().get_mut(file_id.as_str()) {
                        resource.record_attempt();
                        if self.config.retry.should_retry(resource.attempt_counter()) {
                            retry_wanted.push(ResourceRequest {
                                file_id: file_id.clone(),
                                equation: resource.equation().map(str::to_owned),
                            });
                        } else {
                            debug!(
                                "giving up on resource {file_id} after {} attempts",
                                resource.attempt_counter()
                            );
                        }
                    }
                }

                if !outcome.loaded.is_empty() {
                    self.host.surface.apply_update(
                        SceneUpdate {
                            elements: None,
                            resources: outcome.loaded.clone(),
                            view: None,
                        },
                        false,
                    );
                }
            }

            if let Some(next) = self.loader.finish() {
                request = next;
                continue;
            }

            if retry_wanted.is_empty() {
                return;
            }

            // fixed backoff before retrying, hoping the host's sync has
            // delivered the file in the mean time
            self.clock.sleep(self.config.retry.backoff()).await;
            if self.generation_now() != generation || self.loader.is_terminated() {
                return;
            }

            let dark = { self.state.lock().await.scene.view().theme().is_dark() };
            match self.loader.begin(LoadRequest {
                wanted: retry_wanted,
                dark,
            }) {
                Some(next) => request = next,
                None => return,
            }
        }
    }

    /// Runs the asynchronous resolution slow path for the given elements.
    ///
    /// Each result is applied only if the document generation, the element,
    /// and its raw text are unchanged since the lookup started; otherwise
    /// the result is discarded.
    pub async fn resolve_pending(self: &Arc<Self>, ids: Vec<ElementId>) {
        for id in ids {
            let generation = self.generation_now();
            let Some((raw, version)) = ({
                let st = self.state.lock().await;
                st.scene.get(&id).and_then(|element| {
                    if element.is_deleted() {
                        return None;
                    }
                    element
                        .text()
                        .map(|text| (text.raw().to_owned(), element.version()))
                })
            }) else {
                continue;
            };

            let display = resolve::resolve_text(&raw, self.host.references.as_ref()).await;

            let mut st = self.state.lock().await;
            if self.generation_now() != generation {
                return;
            }
            let Some(element) = st.scene.get_mut(&id) else {
                continue;
            };
            if element.version() != version
                || element.text().map(|text| text.raw()) != Some(raw.as_str())
            {
                // edited or replaced while we were suspended
                continue;
            }

            let link = resolve::extract_first_link(&raw);
            if let Some(text) = element.text_mut() {
                if text.display() == display {
                    continue;
                }
                text.set_display(display);
            }
            element.set_link(link);
            element.bump_version();

            self.host.surface.apply_update(
                SceneUpdate {
                    elements: Some(st.scene.elements().to_vec()),
                    resources: Vec::new(),
                    view: None,
                },
                false,
            );
            self.host.surface.clear_history();
        }
    }

    async fn save_inner(
        self: &Arc<Self>,
        mode: SaveMode,
        prevent_reload: bool,
    ) -> Result<bool, EngineError> {
        let generation = self.generation_now();

        let (text, allow_save) = {
            let mut st = self.state.lock().await;
            if st.state == EngineState::Unloading {
                return Err(EngineError::Unloading);
            }
            if st.state.is_saving() {
                return Err(EngineError::SaveInProgress);
            }

            let allow_save = st.state.is_dirty() || mode != SaveMode::Explicit;

            st.state = match mode {
                SaveMode::Explicit => EngineState::Saving,
                SaveMode::Auto => EngineState::Autosaving,
                SaveMode::Force => EngineState::ForceSaving,
            };
            // every save cycle starts with a fresh suppression window
            st.suppress_until = None;

            self.sync_from_surface(&mut st);

            let text = match self.serialize_locked(&st) {
                Ok(text) => text,
                Err(source) => {
                    error!("serialization failed: {source}");
                    st.state = EngineState::Dirty {
                        path: self.path.clone(),
                    };
                    self.host.surface.warn_user(WARN_SAVE_INTERNAL);
                    return Err(source.into());
                }
            };

            (text, allow_save)
        };

        if !allow_save {
            let mut st = self.state.lock().await;
            st.state = match st.dirty_while_saving.take() {
                Some(path) => EngineState::Dirty { path },
                None => EngineState::Clean,
            };
            return Ok(false);
        }

        if !self.host.files.exists(&self.path).await {
            // the file was deleted out from under us; keep the changes and
            // let a later cycle retry once it reappears
            debug!("skipping save: {:?} no longer exists", self.path);
            let mut st = self.state.lock().await;
            if self.generation_now() == generation {
                st.state = EngineState::Dirty {
                    path: self.path.clone(),
                };
            }
            return Ok(false);
        }

        let written = self.host.files.write(&self.path, &text).await;

        let mut st = self.state.lock().await;
        if self.generation_now() != generation {
            debug!("discarding stale save result for {:?}", self.path);
            return Ok(false);
        }

        let stamp = match written {
            Ok(stamp) => stamp,
            Err(source) => {
                error!("write failed for {:?}: {source}", self.path);
                st.state = EngineState::Dirty {
                    path: self.path.clone(),
                };
                if !st.warned_write_failure {
                    st.warned_write_failure = true;
                    self.host.surface.warn_user(WARN_WRITE_FAILED);
                }
                return Err(EngineError::Write {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        // a force save that changed nothing on disk will not produce a
        // change notification; trigger the reload by hand
        let trigger_reload = mode == SaveMode::Force
            && !prevent_reload
            && st.last_save_stamp == Some(stamp);

        st.last_save_stamp = Some(stamp);
        st.warned_write_failure = false;
        st.suppress_until = prevent_reload
            .then(|| Instant::now() + self.config.suppression_window);
        st.state = match st.dirty_while_saving.take() {
            Some(path) => EngineState::Dirty { path },
            None => EngineState::Clean,
        };
        let scene_for_export = (mode != SaveMode::Auto).then(|| st.scene.clone());
        let export_preference = st.export_override.unwrap_or(self.config.auto_export);
        drop(st);

        if let Some(scene) = scene_for_export {
            self.run_exports(export_preference, &scene).await;
        }

        if trigger_reload {
            if let Err(err) = Box::pin(self.reload(true)).await {
                warn!("post-save reload failed: {err}");
            }
        }

        Ok(true)
    }

    async fn run_exports(&self, preference: ExportPreference, scene: &Scene) {
        if preference.wants_svg() {
            if let Err(err) = self.host.exports.export(ExportKind::Svg, scene).await {
                warn!("svg export failed: {err}");
            }
        }
        if preference.wants_png() {
            if let Err(err) = self.host.exports.export(ExportKind::Png, scene).await {
                warn!("png export failed: {err}");
            }
        }
    }

    fn serialize_locked(&self, st: &DocState) -> Result<String, FormatError> {
        // a container co-edited as plain text elsewhere stays uncompressed
        // so the other editor keeps seeing readable content
        let compress = self.config.compress && !self.host.surface.plain_text_coedit();
        generate_container(
            &st.scene,
            &WriteOptions {
                compress,
                export_override: st.export_override,
            },
        )
    }

    /// Pulls the surface's current elements and view into the scene.
    ///
    /// In raw mode display edits flow straight into raw text. In resolved
    /// mode the stored raw text is preserved for known elements, except when
    /// it carried no references; then it follows the display edit.
    fn sync_from_surface(&self, st: &mut DocState) {
        let mode = st.scene.text_mode();
        let mut elements: Vec<Element> = self.host.surface.elements();

        for element in &mut elements {
            if !element.is_text() {
                continue;
            }
            let Some(display) = element.text().map(|text| text.display().to_owned()) else {
                continue;
            };

            let previous = st.scene.get(element.id()).and_then(|prev| prev.text().cloned());
            let raw = match (mode, previous) {
                (TextMode::Raw, _) => display.clone(),
                (TextMode::Resolved, Some(prev)) => {
                    if prev.raw() == prev.display() {
                        display.clone()
                    } else {
                        prev.raw().to_owned()
                    }
                }
                (TextMode::Resolved, None) => display.clone(),
            };

            if let Some(text) = element.text_mut() {
                text.set_raw(raw);
                text.set_display(display);
            }
        }

        st.scene.set_elements(elements);
        *st.scene.view_mut() = self.host.surface.view_state();
    }
}

impl fmt::Debug for DocumentEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentEngine")
            .field("path", &self.path)
            .field("generation", &self.generation_now())
            .finish_non_exhaustive()
    }
}
