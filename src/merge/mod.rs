// src/merge/mod.rs

//! Merge transactions
//!
//! A [`MergeEngine`] carries one install, uninstall or replace of a single
//! package through its mode's fixed hook sequence. At every hook the
//! registered [`Trigger`]s for that hook run in priority order against the
//! content sets they ask for.
//!
//! Content sets:
//! - `new_cset` / `old_cset`: supplied at construction
//! - `install`: always the same member as `new_cset`
//! - `uninstall`: `old_cset - install` when replacing, `old_cset` when
//!   uninstalling, empty when installing
//! - `replace`: `install & old_cset` when replacing, otherwise empty
//! - `install_existing` / `uninstall_existing`: what of `install` /
//!   `uninstall` is on the live filesystem right now
//!
//! The two `*_existing` sets are dropped at every hook boundary and probed
//! again on next use; every other set keeps its value once computed.
//!
//! Every engine owns a temporary working directory and optionally an
//! exclusive lock file. Both are released by [`MergeEngine::finish`], which
//! [`MergeEngine::run`] always calls; dropping an unfinished engine still
//! releases them and warns through the observer.

mod hooks;
mod ops;
pub mod triggers;

pub use hooks::{CsetName, Hook, MergeMode};
pub use ops::{merge_entry, unmerge_entry, FsChanges, LiveFsCounters};
pub use triggers::{register_default_triggers, Trigger, TriggerContext};

use crate::config::MergeConfig;
use crate::contents::{ContentSet, DiskLiveFs, LiveFs};
use crate::error::{Error, Result};
use crate::observer::{Observer, SharedObserver, TracingObserver};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Poll interval while another transaction holds the merge lock
const LOCK_POLL: Duration = Duration::from_millis(50);

/// Where and how a transaction touches the system
#[derive(Clone)]
pub struct MergeOptions {
    /// Root of the live filesystem
    pub offset: PathBuf,
    pub observer: SharedObserver,
    pub livefs: Arc<dyn LiveFs>,
    /// Parent of the working directory; system temp dir if unset
    pub temp_root: Option<PathBuf>,
    /// Lock file held for the whole transaction
    pub lock_path: Option<PathBuf>,
    /// How long to wait while another transaction holds `lock_path`
    pub lock_wait: Duration,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            offset: PathBuf::from("/"),
            observer: Arc::new(TracingObserver),
            livefs: Arc::new(DiskLiveFs::new()),
            temp_root: None,
            lock_path: None,
            lock_wait: Duration::ZERO,
        }
    }
}

impl MergeOptions {
    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            temp_root: config.temp_root.clone(),
            lock_path: config.lock_path.clone(),
            lock_wait: Duration::from_millis(config.lock_wait_ms),
            ..Self::default()
        }
    }

    pub fn with_offset(mut self, offset: impl Into<PathBuf>) -> Self {
        self.offset = offset.into();
        self
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_livefs(mut self, livefs: Arc<dyn LiveFs>) -> Self {
        self.livefs = livefs;
        self
    }
}

/// A trigger failure that was logged instead of aborting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerFailure {
    pub trigger: String,
    pub hook: Hook,
    pub message: String,
}

/// Outcome of a finished transaction
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub id: String,
    pub mode: MergeMode,
    pub hooks_run: Vec<Hook>,
    pub suppressed: Vec<TriggerFailure>,
    pub changes: FsChanges,
    pub started: DateTime<Utc>,
    pub duration_ms: u64,
    /// Every hook of the mode ran without a fatal error
    pub completed: bool,
}

/// One install, uninstall or replace transaction
pub struct MergeEngine {
    id: String,
    mode: MergeMode,
    offset: PathBuf,
    observer: SharedObserver,
    livefs: Arc<dyn LiveFs>,
    work_dir: Option<TempDir>,
    lock_file: Option<File>,
    triggers: Vec<Arc<dyn Trigger>>,
    csets: HashMap<CsetName, ContentSet>,
    next_hook: usize,
    hooks_run: Vec<Hook>,
    suppressed: Vec<TriggerFailure>,
    counters: LiveFsCounters,
    started: DateTime<Utc>,
    aborted: bool,
    finished: bool,
}

impl MergeEngine {
    /// Install `new` where nothing of the package is installed
    pub fn install(new: ContentSet, options: MergeOptions) -> Result<Self> {
        Self::create(MergeMode::Install, ContentSet::frozen(), new, options)
    }

    /// Remove the installed contents `old`
    pub fn uninstall(old: ContentSet, options: MergeOptions) -> Result<Self> {
        Self::create(MergeMode::Uninstall, old, ContentSet::frozen(), options)
    }

    /// Replace the installed contents `old` with `new`
    pub fn replace(old: ContentSet, new: ContentSet, options: MergeOptions) -> Result<Self> {
        Self::create(MergeMode::Replace, old, new, options)
    }

    fn create(
        mode: MergeMode,
        old: ContentSet,
        new: ContentSet,
        options: MergeOptions,
    ) -> Result<Self> {
        if !options.offset.is_absolute() {
            return Err(Error::InvalidPath(format!(
                "merge offset must be absolute: {}",
                options.offset.display()
            )));
        }
        let id = Uuid::new_v4().to_string();

        let lock_file = match &options.lock_path {
            Some(path) => Some(lock_merge_root(path, options.lock_wait, &options.observer)?),
            None => None,
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix("pkgmerge-");
        let work_dir = match &options.temp_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        fs::create_dir_all(work_dir.path().join("stage"))?;

        info!(
            "Starting {} transaction {} at {}",
            mode,
            id,
            options.offset.display()
        );

        let mut csets = HashMap::new();
        csets.insert(CsetName::OldCset, old.freeze());
        csets.insert(CsetName::NewCset, new.freeze());

        Ok(Self {
            id,
            mode,
            offset: options.offset,
            observer: options.observer,
            livefs: options.livefs,
            work_dir: Some(work_dir),
            lock_file,
            triggers: Vec::new(),
            csets,
            next_hook: 0,
            hooks_run: Vec::new(),
            suppressed: Vec::new(),
            counters: LiveFsCounters::default(),
            started: Utc::now(),
            aborted: false,
            finished: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    pub fn offset(&self) -> &Path {
        &self.offset
    }

    /// Working directory, until the transaction finishes
    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_ref().map(|d| d.path())
    }

    /// The hook `execute_hook` expects next
    pub fn next_hook(&self) -> Option<Hook> {
        self.mode.hooks().get(self.next_hook).copied()
    }

    pub fn hooks_run(&self) -> &[Hook] {
        &self.hooks_run
    }

    pub fn suppressed(&self) -> &[TriggerFailure] {
        &self.suppressed
    }

    pub fn changes(&self) -> FsChanges {
        self.counters.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Register a trigger; only allowed before the first hook runs
    pub fn add_trigger(&mut self, trigger: Arc<dyn Trigger>) -> Result<()> {
        if self.next_hook > 0 || self.finished {
            return Err(Error::InvalidState(format!(
                "cannot register trigger {} after the transaction started",
                trigger.name()
            )));
        }
        debug!("registered trigger {} for {:?}", trigger.name(), trigger.hooks());
        self.triggers.push(trigger);
        Ok(())
    }

    /// Register the standard trigger set for `config`
    pub fn add_default_triggers(&mut self, config: &MergeConfig) -> Result<()> {
        for trigger in register_default_triggers(config)? {
            self.add_trigger(trigger)?;
        }
        Ok(())
    }

    /// A named content set, computing it on first use
    pub fn cset(&mut self, name: CsetName) -> Result<&ContentSet> {
        let name = canonical(name);
        if !self.csets.contains_key(&name) {
            let value = self.generate(name)?;
            self.csets.insert(name, value.freeze());
        }
        self.csets
            .get(&name)
            .ok_or_else(|| Error::NotFound(format!("content set {}", name)))
    }

    fn generate(&mut self, name: CsetName) -> Result<ContentSet> {
        let empty = ContentSet::frozen();
        let value = match (name, self.mode) {
            (CsetName::Uninstall, MergeMode::Replace) => {
                let install = self.cset(CsetName::Install)?.clone();
                self.cset(CsetName::OldCset)?.difference(&install)
            }
            (CsetName::Uninstall, MergeMode::Uninstall) => self.cset(CsetName::OldCset)?.clone(),
            (CsetName::Replace, MergeMode::Replace) => {
                let old = self.cset(CsetName::OldCset)?.clone();
                self.cset(CsetName::Install)?.intersection(&old)
            }
            (CsetName::Uninstall | CsetName::Replace, _) => empty,
            (CsetName::InstallExisting, _) => {
                let install = self.cset(CsetName::Install)?.clone();
                self.probe_livefs(&install)?
            }
            (CsetName::UninstallExisting, _) => {
                let uninstall = self.cset(CsetName::Uninstall)?.clone();
                self.probe_livefs(&uninstall)?
            }
            // seeded at construction and never evicted
            (CsetName::NewCset | CsetName::OldCset | CsetName::Install, _) => {
                return Err(Error::NotFound(format!("content set {}", name)));
            }
        };
        Ok(value)
    }

    /// Live state of the members of `cset`, keyed by their unrooted paths
    fn probe_livefs(&self, cset: &ContentSet) -> Result<ContentSet> {
        let rooted = cset.insert_offset(&self.offset)?;
        self.livefs
            .intersect(&rooted)?
            .change_offset(&self.offset, "/")
    }

    /// Run every trigger bound to `hook`
    ///
    /// Hooks must be executed in the order of [`MergeMode::hooks`]. A
    /// blocking error, or any error from a trigger that does not suppress
    /// errors, aborts the transaction.
    pub fn execute_hook(&mut self, hook: Hook) -> Result<()> {
        if self.finished || self.aborted {
            return Err(Error::InvalidState(format!(
                "transaction {} is no longer running",
                self.id
            )));
        }
        match self.next_hook() {
            Some(expected) if expected == hook => {}
            Some(expected) => {
                return Err(Error::InvalidState(format!(
                    "{} transaction cannot run {} now, expected {}",
                    self.mode, hook, expected
                )));
            }
            None => {
                return Err(Error::InvalidState(format!(
                    "{} transaction has no hook {} left to run",
                    self.mode, hook
                )));
            }
        }
        self.next_hook += 1;
        self.csets.retain(|name, _| name.is_preserved());

        let mut bound: Vec<Arc<dyn Trigger>> = self
            .triggers
            .iter()
            .filter(|t| t.hooks().contains(&hook))
            .cloned()
            .collect();
        bound.sort_by_key(|t| t.priority());
        debug!("hook {}: {} trigger(s)", hook, bound.len());

        for trigger in bound {
            if let Err(e) = self.run_trigger(hook, trigger.as_ref()) {
                self.aborted = true;
                return Err(e);
            }
        }

        self.hooks_run.push(hook);
        Ok(())
    }

    fn run_trigger(&mut self, hook: Hook, trigger: &dyn Trigger) -> Result<()> {
        let names = trigger.required_csets(self.mode);
        let mut sets = Vec::with_capacity(names.len());
        for name in &names {
            sets.push(self.cset(*name)?.clone_with(true));
        }

        let work_dir = self
            .work_dir
            .as_ref()
            .map(|d| d.path().to_path_buf())
            .ok_or_else(|| Error::InvalidState("working directory already released".into()))?;
        let result = {
            let ctx = TriggerContext {
                mode: self.mode,
                hook,
                offset: &self.offset,
                work_dir: &work_dir,
                tag: &self.id,
                observer: &self.observer,
                livefs: self.livefs.as_ref(),
                counters: &self.counters,
            };
            trigger.run(&ctx, &mut sets)
        };

        match result {
            Ok(()) => {
                for (name, set) in names.into_iter().zip(sets) {
                    self.csets.insert(canonical(name), set.freeze());
                }
                Ok(())
            }
            Err(e) if e.is_blocking() => {
                self.observer
                    .error(&format!("{} blocked {}: {}", trigger.name(), hook, e));
                Err(e)
            }
            Err(e) if trigger.suppress_errors() => {
                self.observer.warn(&format!(
                    "trigger {} failed during {} (ignored): {}",
                    trigger.name(),
                    hook,
                    e
                ));
                self.suppressed.push(TriggerFailure {
                    trigger: trigger.name().to_string(),
                    hook,
                    message: e.to_string(),
                });
                Ok(())
            }
            Err(e) => {
                self.observer
                    .error(&format!("trigger {} failed during {}: {}", trigger.name(), hook, e));
                Err(Error::TriggerFailed {
                    trigger: trigger.name().to_string(),
                    hook: hook.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Run every remaining hook of the mode, then finish
    ///
    /// Cleanup runs even when a hook fails; the hook's error wins over any
    /// cleanup error.
    pub fn run(mut self) -> Result<MergeReport> {
        let hooks = self.mode.hooks();
        let start = self.next_hook;
        let mut outcome = Ok(());
        for hook in &hooks[start..] {
            outcome = self.execute_hook(*hook);
            if outcome.is_err() {
                break;
            }
        }
        let report = self.finish();
        outcome.and(report)
    }

    /// Release the working directory and lock and produce the report
    pub fn finish(&mut self) -> Result<MergeReport> {
        if self.finished {
            return Err(Error::InvalidState(format!(
                "transaction {} already finished",
                self.id
            )));
        }
        self.finished = true;

        let completed = !self.aborted && self.next_hook().is_none();
        if !completed {
            self.observer.warn(&format!(
                "{} transaction {} finished after {} of {} hooks",
                self.mode,
                self.id,
                self.hooks_run.len(),
                self.mode.hooks().len()
            ));
        }

        let cleanup = self.release();
        let duration_ms = Utc::now()
            .signed_duration_since(self.started)
            .num_milliseconds()
            .max(0) as u64;
        cleanup?;

        let report = MergeReport {
            id: self.id.clone(),
            mode: self.mode,
            hooks_run: self.hooks_run.clone(),
            suppressed: self.suppressed.clone(),
            changes: self.counters.snapshot(),
            started: self.started,
            duration_ms,
            completed,
        };
        info!(
            "Finished {} transaction {} in {}ms ({} filesystem operations)",
            report.mode,
            report.id,
            report.duration_ms,
            report.changes.total_operations()
        );
        Ok(report)
    }

    fn release(&mut self) -> Result<()> {
        let removed = match self.work_dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        };
        if let Some(lock) = self.lock_file.take() {
            lock.unlock()?;
        }
        removed?;
        Ok(())
    }
}

impl Drop for MergeEngine {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.observer.warn(&format!(
            "{} transaction {} dropped before finishing, releasing its resources",
            self.mode, self.id
        ));
        if let Err(e) = self.release() {
            warn!("cleanup of transaction {} failed: {}", self.id, e);
        }
    }
}

/// `install` is stored as `new_cset`
fn canonical(name: CsetName) -> CsetName {
    match name {
        CsetName::Install => CsetName::NewCset,
        other => other,
    }
}

/// Take the exclusive merge lock, polling until `wait` has passed
///
/// Only contention is retried; any other locking failure is returned at once.
fn lock_merge_root(path: &Path, wait: Duration, observer: &SharedObserver) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;

    let contended = fs2::lock_contended_error().raw_os_error();
    let deadline = Instant::now() + wait;
    let mut waiting = false;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(file),
            Err(e) if e.raw_os_error() != contended => return Err(e.into()),
            Err(_) if Instant::now() >= deadline => {
                return Err(Error::InvalidState(format!(
                    "merge lock {} is held by another transaction",
                    path.display()
                )));
            }
            Err(_) => {
                if !waiting {
                    observer.info(&format!("waiting for merge lock {}", path.display()));
                    waiting = true;
                }
                std::thread::sleep(LOCK_POLL.min(deadline.saturating_duration_since(Instant::now())));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contents::{DataSource, FsEntry};
    use crate::observer::{Level, NullObserver, RecordingObserver};
    use std::sync::Mutex;

    fn files(paths: &[&str]) -> ContentSet {
        ContentSet::from_entries(
            paths
                .iter()
                .map(|p| FsEntry::file(*p, DataSource::bytes(p.as_bytes().to_vec()))),
        )
        .unwrap()
    }

    fn options(root: &Path) -> MergeOptions {
        MergeOptions::default()
            .with_offset(root)
            .with_observer(Arc::new(NullObserver))
    }

    fn paths(cset: &ContentSet) -> Vec<String> {
        cset.paths().map(|p| p.display().to_string()).collect()
    }

    /// Records its runs and optionally fails
    struct Probe {
        name: &'static str,
        hooks: Vec<Hook>,
        priority: i32,
        suppress: bool,
        fail: Option<fn() -> Error>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Probe {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                hooks: vec![Hook::PreMerge],
                priority: 50,
                suppress: true,
                fail: None,
                log: Arc::clone(log),
            }
        }
    }

    impl Trigger for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn hooks(&self) -> &[Hook] {
            &self.hooks
        }

        fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
            vec![CsetName::Install]
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn suppress_errors(&self) -> bool {
            self.suppress
        }

        fn run(&self, ctx: &TriggerContext<'_>, _csets: &mut [ContentSet]) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}@{}", self.name, ctx.hook));
            match self.fail {
                Some(fail) => Err(fail()),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn test_replace_csets() {
        let root = tempfile::TempDir::new().unwrap();
        let mut engine = MergeEngine::replace(
            files(&["/etc/a", "/etc/b"]),
            files(&["/etc/b", "/etc/c"]),
            options(root.path()),
        )
        .unwrap();

        assert_eq!(paths(engine.cset(CsetName::Uninstall).unwrap()), vec!["/etc/a"]);
        assert_eq!(paths(engine.cset(CsetName::Replace).unwrap()), vec!["/etc/b"]);
        assert_eq!(
            paths(engine.cset(CsetName::Install).unwrap()),
            vec!["/etc/b", "/etc/c"]
        );
        engine.finish().unwrap();
    }

    #[test]
    fn test_install_mode_csets_are_empty_where_unused() {
        let root = tempfile::TempDir::new().unwrap();
        let mut engine = MergeEngine::install(files(&["/a"]), options(root.path())).unwrap();
        assert!(engine.cset(CsetName::Uninstall).unwrap().is_empty());
        assert!(engine.cset(CsetName::Replace).unwrap().is_empty());
        assert!(engine.cset(CsetName::OldCset).unwrap().is_empty());
        engine.finish().unwrap();
    }

    #[test]
    fn test_existing_csets_reprobed_per_hook() {
        let root = tempfile::TempDir::new().unwrap();
        let mut engine =
            MergeEngine::install(files(&["/a", "/b"]), options(root.path())).unwrap();
        engine.execute_hook(Hook::SanityCheck).unwrap();
        assert!(engine.cset(CsetName::InstallExisting).unwrap().is_empty());

        fs::write(root.path().join("a"), "live").unwrap();
        // cached within the hook
        assert!(engine.cset(CsetName::InstallExisting).unwrap().is_empty());

        engine.execute_hook(Hook::PreMerge).unwrap();
        assert_eq!(paths(engine.cset(CsetName::InstallExisting).unwrap()), vec!["/a"]);
        engine.finish().unwrap();
    }

    #[test]
    fn test_hook_order_enforced() {
        let root = tempfile::TempDir::new().unwrap();
        let mut engine = MergeEngine::install(files(&["/a"]), options(root.path())).unwrap();
        assert!(matches!(
            engine.execute_hook(Hook::Merge),
            Err(Error::InvalidState(_))
        ));
        engine.execute_hook(Hook::SanityCheck).unwrap();
        assert!(matches!(
            engine.execute_hook(Hook::Unmerge),
            Err(Error::InvalidState(_))
        ));
        assert_eq!(engine.next_hook(), Some(Hook::PreMerge));
        engine.finish().unwrap();
    }

    #[test]
    fn test_triggers_run_by_priority_then_registration() {
        let root = tempfile::TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = MergeEngine::install(files(&["/a"]), options(root.path())).unwrap();

        let mut late = Probe::new("late", &log);
        late.priority = 90;
        let mut early = Probe::new("early", &log);
        early.priority = 10;
        engine.add_trigger(Arc::new(late)).unwrap();
        engine.add_trigger(Arc::new(Probe::new("first", &log))).unwrap();
        engine.add_trigger(Arc::new(early)).unwrap();
        engine.add_trigger(Arc::new(Probe::new("second", &log))).unwrap();

        let report = engine.run().unwrap();
        assert!(report.completed);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["early@pre_merge", "first@pre_merge", "second@pre_merge", "late@pre_merge"]
        );
    }

    #[test]
    fn test_suppressed_failure_continues() {
        let root = tempfile::TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let observer = Arc::new(RecordingObserver::new());
        let mut engine = MergeEngine::install(
            files(&["/a"]),
            options(root.path()).with_observer(observer.clone()),
        )
        .unwrap();

        let mut broken = Probe::new("broken", &log);
        broken.fail = Some(|| Error::InvalidState("boom".into()));
        engine.add_trigger(Arc::new(broken)).unwrap();
        engine.add_trigger(Arc::new(Probe::new("after", &log))).unwrap();

        let report = engine.run().unwrap();
        assert!(report.completed);
        assert_eq!(report.suppressed.len(), 1);
        assert_eq!(report.suppressed[0].trigger, "broken");
        assert_eq!(report.suppressed[0].hook, Hook::PreMerge);
        assert!(log.lock().unwrap().contains(&"after@pre_merge".to_string()));
        assert!(observer.contains(Level::Warn, "boom"));
    }

    #[test]
    fn test_unsuppressed_failure_aborts() {
        let root = tempfile::TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = MergeEngine::install(files(&["/a"]), options(root.path())).unwrap();
        let work_dir = engine.work_dir().unwrap().to_path_buf();

        let mut strict = Probe::new("strict", &log);
        strict.suppress = false;
        strict.fail = Some(|| Error::InvalidState("bad input".into()));
        engine.add_trigger(Arc::new(strict)).unwrap();
        engine.add_trigger(Arc::new(Probe::new("never", &log))).unwrap();

        match engine.run() {
            Err(Error::TriggerFailed { trigger, hook, .. }) => {
                assert_eq!(trigger, "strict");
                assert_eq!(hook, "pre_merge");
            }
            other => panic!("expected trigger failure, got {:?}", other.map(|r| r.id)),
        }
        assert!(!log.lock().unwrap().contains(&"never@pre_merge".to_string()));
        assert!(!work_dir.exists());
    }

    #[test]
    fn test_blocking_error_ignores_suppression() {
        let root = tempfile::TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = MergeEngine::install(files(&["/a"]), options(root.path())).unwrap();

        let mut blocker = Probe::new("blocker", &log);
        blocker.fail = Some(|| Error::BlockModification {
            reason: "test".into(),
            paths: vec![PathBuf::from("/a")],
        });
        engine.add_trigger(Arc::new(blocker)).unwrap();
        engine.execute_hook(Hook::SanityCheck).unwrap();
        assert!(engine.execute_hook(Hook::PreMerge).unwrap_err().is_blocking());
        // the transaction is over
        assert!(engine.execute_hook(Hook::Merge).is_err());
        let report = engine.finish().unwrap();
        assert!(!report.completed);
        assert_eq!(report.hooks_run, vec![Hook::SanityCheck]);
    }

    #[test]
    fn test_trigger_registration_closes_after_start() {
        let root = tempfile::TempDir::new().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = MergeEngine::install(files(&["/a"]), options(root.path())).unwrap();
        engine.execute_hook(Hook::SanityCheck).unwrap();
        assert!(engine.add_trigger(Arc::new(Probe::new("late", &log))).is_err());
        engine.finish().unwrap();
        assert!(engine.finish().is_err());
    }

    #[test]
    fn test_mutations_written_back() {
        struct DropB;
        impl Trigger for DropB {
            fn name(&self) -> &str {
                "drop_b"
            }
            fn hooks(&self) -> &[Hook] {
                &[Hook::SanityCheck]
            }
            fn required_csets(&self, _mode: MergeMode) -> Vec<CsetName> {
                vec![CsetName::Install]
            }
            fn run(&self, _ctx: &TriggerContext<'_>, csets: &mut [ContentSet]) -> Result<()> {
                csets[0].remove("/b").map(|_| ())
            }
        }

        let root = tempfile::TempDir::new().unwrap();
        let mut engine =
            MergeEngine::replace(files(&["/b"]), files(&["/a", "/b"]), options(root.path()))
                .unwrap();
        engine.add_trigger(Arc::new(DropB)).unwrap();
        engine.execute_hook(Hook::SanityCheck).unwrap();
        assert_eq!(paths(engine.cset(CsetName::NewCset).unwrap()), vec!["/a"]);
        // /b is no longer overwritten, so it must be removed
        assert_eq!(paths(engine.cset(CsetName::Uninstall).unwrap()), vec!["/b"]);
        engine.finish().unwrap();
    }

    #[test]
    fn test_drop_unfinished_warns_and_cleans() {
        let root = tempfile::TempDir::new().unwrap();
        let observer = Arc::new(RecordingObserver::new());
        let engine = MergeEngine::install(
            files(&["/a"]),
            options(root.path()).with_observer(observer.clone()),
        )
        .unwrap();
        let work_dir = engine.work_dir().unwrap().to_path_buf();
        assert!(work_dir.join("stage").is_dir());
        drop(engine);
        assert!(!work_dir.exists());
        assert!(observer.contains(Level::Warn, "dropped before finishing"));
    }

    #[test]
    fn test_lock_held_for_transaction() {
        let root = tempfile::TempDir::new().unwrap();
        let lock_path = root.path().join("lock/pkgmerge.lock");
        let mut opts = options(root.path());
        opts.lock_path = Some(lock_path.clone());
        let mut engine = MergeEngine::install(files(&["/a"]), opts).unwrap();

        let other = File::open(&lock_path).unwrap();
        assert!(other.try_lock_exclusive().is_err());
        engine.finish().unwrap();
        assert!(other.try_lock_exclusive().is_ok());
    }

    #[test]
    fn test_held_lock_times_out() {
        let root = tempfile::TempDir::new().unwrap();
        let mut opts = options(root.path());
        opts.lock_path = Some(root.path().join("pkgmerge.lock"));
        let mut holder = MergeEngine::install(files(&["/a"]), opts.clone()).unwrap();

        let err = MergeEngine::install(files(&["/b"]), opts.clone()).err().unwrap();
        assert!(matches!(err, Error::InvalidState(ref msg) if msg.contains("held by another")));

        let observer = Arc::new(RecordingObserver::new());
        opts.lock_wait = Duration::from_millis(120);
        let opts = opts.with_observer(observer.clone());
        let started = Instant::now();
        assert!(MergeEngine::install(files(&["/b"]), opts.clone()).is_err());
        assert!(started.elapsed() >= Duration::from_millis(120));
        assert!(observer.contains(Level::Info, "waiting for merge lock"));

        holder.finish().unwrap();
        let mut next = MergeEngine::install(files(&["/b"]), opts).unwrap();
        next.finish().unwrap();
    }

    #[test]
    fn test_lock_wait_taken_from_config() {
        let config = MergeConfig {
            lock_wait_ms: 250,
            ..MergeConfig::default()
        };
        assert_eq!(MergeOptions::from_config(&config).lock_wait, Duration::from_millis(250));
        assert_eq!(MergeOptions::default().lock_wait, Duration::ZERO);
    }

    #[test]
    fn test_relative_offset_rejected() {
        let opts = MergeOptions::default().with_offset("relative/root");
        assert!(matches!(
            MergeEngine::install(ContentSet::new(), opts),
            Err(Error::InvalidPath(_))
        ));
    }
}
