//! One polling cycle: fetch issues, work out which ones need a fresh card,
//! render those into a single document, remember what was printed and hand
//! the document off.
//!
//! Stages run strictly in order and each returns a typed error; the first
//! failure ends the cycle and the scheduler tries again on a later tick.

pub mod scheduler;


use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::try_join_all;
use tracing::{debug, error, info, warn};

use crate::cache::lookups::LookupTables;
use crate::cache::users::UserCache;
use crate::config::AppConfig;
use crate::detect::{ChangeDetector, Classification, TriggerFieldSet};
use crate::errors::PipelineError;
use crate::history::{PrintLog, PrintRecord};
use crate::model::card::CardModel;
use crate::model::issue::{IssueSnapshot, StoredIssue};
use crate::model::user::UserProfile;
use crate::render::document::Document;
use crate::render::issue_card::IssueCardRenderer;
use crate::render::page::AssetCache;
use crate::source::{IssueSource, Session};
use crate::spool::Spooler;
use crate::store::IssueStore;

/// Backoff for store writes: `initial_delay * 2^attempt` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl RetryConfig {
    pub const DEFAULT: Self = Self {
        attempts: 3,
        initial_delay: Duration::from_millis(250),
    };

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub filter_id: String,
    pub output_dir: PathBuf,
    pub trigger_fields: TriggerFieldSet,
    pub user_ttl: Option<Duration>,
    /// Stored issues not seen for this long are dropped. `None` keeps them.
    pub prune_after: Option<chrono::Duration>,
    pub persist_retry: RetryConfig,
}

impl PipelineOptions {
    pub fn new(filter_id: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            filter_id: filter_id.into(),
            output_dir: output_dir.into(),
            trigger_fields: TriggerFieldSet::default(),
            user_ttl: None,
            prune_after: None,
            persist_retry: RetryConfig::DEFAULT,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let jira = config
            .jira
            .as_ref()
            .context("No [jira] section in ~/.cardpress/config.toml")?;
        Ok(Self {
            filter_id: jira.filter_id.clone(),
            output_dir: config.output.dir(),
            trigger_fields: config.poll.trigger_fields()?,
            user_ttl: config.poll.user_ttl(),
            prune_after: config
                .poll
                .prune_after_days
                .map(|days| chrono::Duration::days(days.into())),
            persist_retry: RetryConfig::DEFAULT,
        })
    }
}

/// What one cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub fetched: usize,
    /// Records dropped for having the wrong shape.
    pub skipped: usize,
    /// Issues classified new or changed.
    pub changed: usize,
    /// Cards that made it into the document, in fetch order.
    pub cards: Vec<CardModel>,
    /// Keys whose card could not be drawn; they are retried next cycle.
    pub failed: Vec<String>,
    pub document: Option<PathBuf>,
    pub job_id: Option<String>,
    pub pruned: usize,
}

impl CycleReport {
    pub fn rendered_keys(&self) -> Vec<&str> {
        self.cards.iter().map(|c| c.key.as_str()).collect()
    }
}

pub struct Pipeline {
    source: Box<dyn IssueSource>,
    store: IssueStore,
    detector: ChangeDetector,
    users: UserCache,
    lookups: Option<LookupTables>,
    renderer: IssueCardRenderer,
    assets: AssetCache,
    spooler: Option<Box<dyn Spooler>>,
    history: Option<PrintLog>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn IssueSource>,
        store: IssueStore,
        renderer: IssueCardRenderer,
        options: PipelineOptions,
    ) -> Self {
        Self {
            source,
            store,
            detector: ChangeDetector::new(options.trigger_fields.clone()),
            users: UserCache::new(options.user_ttl),
            lookups: None,
            renderer,
            assets: AssetCache::default(),
            spooler: None,
            history: None,
            options,
        }
    }

    pub fn with_spooler(mut self, spooler: Box<dyn Spooler>) -> Self {
        self.spooler = Some(spooler);
        self
    }

    pub fn with_history(mut self, history: PrintLog) -> Self {
        self.history = Some(history);
        self
    }

    pub fn store(&self) -> &IssueStore {
        &self.store
    }

    /// Force the type and priority tables to be fetched again next cycle.
    pub fn invalidate_lookups(&mut self) {
        self.lookups = None;
    }

    /// Authenticate and load the lookup tables before the first cycle. An
    /// error here means the service cannot start.
    pub async fn prepare(&mut self) -> Result<(), PipelineError> {
        let session = self.authenticate().await?;
        self.ensure_lookups(&session).await
    }

    async fn authenticate(&self) -> Result<Session, PipelineError> {
        self.source
            .authenticate()
            .await
            .map_err(PipelineError::Authenticate)
    }

    async fn ensure_lookups(&mut self, session: &Session) -> Result<(), PipelineError> {
        if self.lookups.is_none() {
            let tables = LookupTables::load(self.source.as_ref(), session)
                .await
                .map_err(PipelineError::LoadLookups)?;
            info!(
                types = tables.type_count(),
                priorities = tables.priority_count(),
                "Loaded lookup tables"
            );
            self.lookups = Some(tables);
        }
        Ok(())
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, PipelineError> {
        let mut report = CycleReport::default();

        let session = self.authenticate().await?;
        self.ensure_lookups(&session).await?;

        let raw = self
            .source
            .fetch_issues(&session, &self.options.filter_id)
            .await
            .map_err(|source| PipelineError::FetchIssues {
                filter: self.options.filter_id.clone(),
                source,
            })?;
        report.fetched = raw.len();

        let mut seen = HashSet::new();
        let mut changed = Vec::new();
        for record in raw {
            // Keys of malformed records still count as seen so their stored
            // entries survive pruning.
            if let Some(key) = record.key.as_deref() {
                if !seen.insert(key.to_string()) {
                    warn!(key, "Duplicate issue in fetch, keeping the first");
                    report.skipped += 1;
                    continue;
                }
            }
            let snapshot = match IssueSnapshot::try_from(record) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed issue");
                    report.skipped += 1;
                    continue;
                }
            };
            match self.detector.classify(&snapshot, self.store.get(&snapshot.key)) {
                Classification::Unchanged => {}
                Classification::New => {
                    debug!(key = %snapshot.key, "New issue");
                    changed.push(snapshot);
                }
                Classification::Changed(fields) => {
                    debug!(key = %snapshot.key, ?fields, "Issue changed");
                    changed.push(snapshot);
                }
            }
        }
        report.changed = changed.len();

        if changed.is_empty() {
            debug!(fetched = report.fetched, "No new or changed issues");
            report.pruned = self.housekeeping(&seen);
            return Ok(report);
        }

        let profiles = self.resolve_users(&session, &changed).await?;
        let (document, rendered) = self.render_cards(&changed, &profiles, &mut report);

        if !rendered.is_empty() {
            let previous = self.persist(&rendered).await?;
            let path = self.emit(&document, previous)?;
            let job_id = self.spool(&path, &report).await;
            report.job_id = job_id;
            self.record(&path, &report);
            report.document = Some(path);
        }

        report.pruned = self.housekeeping(&seen);
        info!(
            fetched = report.fetched,
            skipped = report.skipped,
            changed = report.changed,
            rendered = report.cards.len(),
            failed = report.failed.len(),
            "Cycle complete"
        );
        Ok(report)
    }

    /// One fetch per distinct reporter, all in flight together.
    async fn resolve_users(
        &self,
        session: &Session,
        changed: &[IssueSnapshot],
    ) -> Result<HashMap<String, UserProfile>, PipelineError> {
        let reporters: BTreeSet<&str> = changed.iter().map(|s| s.reporter.as_str()).collect();
        let source = self.source.as_ref();
        let users = &self.users;

        let resolved = try_join_all(reporters.into_iter().map(|id| async move {
            users
                .get_or_fetch(id, || source.fetch_user(session, id))
                .await
                .map(|profile| (id.to_string(), profile))
                .map_err(|e| PipelineError::ResolveUser {
                    user: id.to_string(),
                    source: e,
                })
        }))
        .await?;

        Ok(resolved.into_iter().collect())
    }

    /// Draw every changed issue. A card that fails is left out of both the
    /// document and the returned snapshots.
    fn render_cards(
        &self,
        changed: &[IssueSnapshot],
        profiles: &HashMap<String, UserProfile>,
        report: &mut CycleReport,
    ) -> (Document, Vec<IssueSnapshot>) {
        let empty = LookupTables::new(Vec::new(), Vec::new());
        let lookups = self.lookups.as_ref().unwrap_or(&empty);
        let mut document = Document::new();
        let mut rendered = Vec::new();

        for snapshot in changed {
            let Some(reporter) = profiles.get(&snapshot.reporter) else {
                warn!(key = %snapshot.key, reporter = %snapshot.reporter, "Reporter was not resolved");
                report.failed.push(snapshot.key.clone());
                continue;
            };
            let card = CardModel::build(snapshot, reporter, lookups, self.renderer.theme());
            match self.renderer.render_card(&card, &self.assets) {
                Ok(page) => {
                    document.push(page);
                    rendered.push(snapshot.clone());
                    report.cards.push(card);
                }
                Err(e) => {
                    error!(key = %snapshot.key, error = %e, "Failed to render card");
                    report.failed.push(snapshot.key.clone());
                }
            }
        }
        (document, rendered)
    }

    /// Store the rendered snapshots, retrying with backoff. Returns what the
    /// store held for those keys beforehand.
    async fn persist(
        &mut self,
        rendered: &[IssueSnapshot],
    ) -> Result<Vec<(String, Option<StoredIssue>)>, PipelineError> {
        let previous: Vec<_> = rendered
            .iter()
            .map(|s| (s.key.clone(), self.store.get(&s.key).cloned()))
            .collect();

        let retry = self.options.persist_retry;
        let mut attempt = 0;
        loop {
            match self.store.put_many(rendered.iter().cloned()) {
                Ok(count) => {
                    debug!(count, "Persisted snapshots");
                    return Ok(previous);
                }
                Err(e) if attempt + 1 < retry.attempts => {
                    let delay = retry.delay_for_attempt(attempt);
                    warn!(error = %e, attempt = attempt + 1, ?delay, "Store write failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PipelineError::Persist {
                        keys: rendered.iter().map(|s| s.key.clone()).collect(),
                        source: e,
                    })
                }
            }
        }
    }

    /// Write the document. On failure the store is put back the way it was so
    /// the same cards come round again.
    fn emit(
        &mut self,
        document: &Document,
        previous: Vec<(String, Option<StoredIssue>)>,
    ) -> Result<PathBuf, PipelineError> {
        let path = document_path(&self.options.output_dir);
        match document.save(&path) {
            Ok(()) => {
                info!(path = %path.display(), pages = document.len(), "Wrote card document");
                Ok(path)
            }
            Err(source) => {
                let keys: Vec<String> = previous.iter().map(|(key, _)| key.clone()).collect();
                if let Err(e) = self.store.restore(previous) {
                    error!(
                        error = %e,
                        keys = %keys.join(", "),
                        "Failed to roll back issue store after emit failure"
                    );
                }
                Err(PipelineError::Emit { path, keys, source })
            }
        }
    }

    async fn spool(&self, path: &Path, report: &CycleReport) -> Option<String> {
        let spooler = self.spooler.as_ref()?;
        let title = format!("cardpress: {}", report.rendered_keys().join(" "));
        match spooler.submit(path, &title).await {
            Ok(job_id) => {
                info!(%job_id, path = %path.display(), "Submitted to printer");
                Some(job_id)
            }
            Err(e) => {
                error!(error = %e, path = %path.display(), "Failed to submit to printer");
                None
            }
        }
    }

    fn record(&self, path: &Path, report: &CycleReport) {
        if let Some(history) = &self.history {
            let cards = report.cards.iter().map(|c| c.key.clone()).collect();
            if let Err(e) = history.append(&PrintRecord::new(path, cards, report.job_id.clone())) {
                warn!(error = %e, "Failed to append print history");
            }
        }
    }

    fn housekeeping(&mut self, seen: &HashSet<String>) -> usize {
        let Some(max_age) = self.options.prune_after else {
            return 0;
        };
        match self.store.prune(Utc::now() - max_age, seen) {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "Pruned stale issues from store");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "Failed to prune issue store");
                0
            }
        }
    }
}

/// `cards-YYYYmmdd-HHMMSS.pdf`, with a counter appended if that name is taken.
fn document_path(dir: &Path) -> PathBuf {
    let stem = format!("cards-{}", Utc::now().format("%Y%m%d-%H%M%S"));
    let mut path = dir.join(format!("{stem}.pdf"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}-{n}.pdf"));
        n += 1;
    }
    path
}
