//! The report lifecycle: load, build, gate, store, send.

use std::fmt;
use tracing::{debug, dispatcher, info};
use url::Url;

use crate::collectors::{self, default_probes, OsIdentity, Probe, ProbeContext};
use crate::config::Config;
use crate::consent::{Answer, ConsentGate, Prompter};
use crate::error::{Error, Result};
use crate::record::{DecisionKind, OutcomeRecord};
use crate::report::{Report, ReportBuilder};
use crate::sender::{report_url, DeliveryResult, HttpSender};
use crate::store::{CacheKey, FileStore, ReportStore};

/// Where a run is in its lifecycle. Used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    AlreadyDecided,
    Built,
    Gated,
    Stored,
    Sent,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::AlreadyDecided => "already-decided",
            Stage::Built => "built",
            Stage::Gated => "gated",
            Stage::Stored => "stored",
            Stage::Sent => "sent",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inputs for one run.
#[derive(Clone, Copy)]
pub struct RunOptions<'a> {
    /// What the user answered, if anything.
    pub answer: Answer,
    /// Treat an unset answer as yes.
    pub auto_confirm: bool,
    /// Ignore an existing decision and decide (and send) again.
    pub force: bool,
    /// Who to ask when the answer is unset.
    pub prompter: Option<&'a dyn Prompter>,
}

impl<'a> RunOptions<'a> {
    /// Options for a given answer, no forcing, no prompting.
    pub fn new(answer: Answer) -> Self {
        Self {
            answer,
            auto_confirm: false,
            force: false,
            prompter: None,
        }
    }

    /// Re-run even if a decision was already stored.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Treat an unset answer as yes.
    pub fn auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Ask `prompter` when the answer is unset.
    pub fn with_prompter(mut self, prompter: &'a dyn Prompter) -> Self {
        self.prompter = Some(prompter);
        self
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A decision was already stored for this key; nothing was built or sent.
    AlreadyDecided { key: CacheKey, kind: DecisionKind },
    /// A new decision was stored and, unless policy said otherwise, sent.
    Completed {
        key: CacheKey,
        kind: DecisionKind,
        /// `None` when the opt-out policy kept the decision local.
        delivery: Option<DeliveryResult>,
    },
}

impl RunOutcome {
    /// Cache key the run worked on.
    pub fn key(&self) -> &CacheKey {
        match self {
            RunOutcome::AlreadyDecided { key, .. } | RunOutcome::Completed { key, .. } => key,
        }
    }

    /// Decision that is now stored.
    pub fn kind(&self) -> DecisionKind {
        match self {
            RunOutcome::AlreadyDecided { kind, .. } | RunOutcome::Completed { kind, .. } => *kind,
        }
    }

    /// The delivery attempt made this run, if any.
    pub fn delivery(&self) -> Option<&DeliveryResult> {
        match self {
            RunOutcome::Completed { delivery, .. } => delivery.as_ref(),
            RunOutcome::AlreadyDecided { .. } => None,
        }
    }

    /// A failed delivery, worded for a warning. The stored decision stands.
    pub fn warning(&self) -> Option<String> {
        self.delivery()
            .filter(|delivery| !delivery.is_success())
            .map(|delivery| format!("Decision saved but {}", delivery))
    }
}

/// Runs the report lifecycle against a store and the configured server.
pub struct Pipeline<S> {
    config: Config,
    store: S,
    sender: HttpSender,
    probes: Vec<Probe>,
    builder: ReportBuilder,
}

impl Pipeline<FileStore> {
    /// Pipeline storing records under the configured cache directory.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = FileStore::new(&config.cache_dir);
        Self::new(config, store)
    }
}

impl<S: ReportStore> Pipeline<S> {
    /// Pipeline with every known probe.
    pub fn new(config: Config, store: S) -> Result<Self> {
        config.validate()?;
        let sender = HttpSender::new(config.timeout)?;

        Ok(Self {
            config,
            store,
            sender,
            probes: default_probes(),
            builder: ReportBuilder::new(),
        })
    }

    /// Replace the probe table.
    pub fn with_probes(mut self, probes: Vec<Probe>) -> Self {
        self.probes = probes;
        self
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn context(&self) -> ProbeContext {
        ProbeContext::new(&self.config.root)
    }

    /// Cache key for this host's current OS release.
    pub fn cache_key(&self) -> CacheKey {
        OsIdentity::detect(&self.context()).cache_key()
    }

    /// Build a fresh report without storing or sending it.
    pub fn show(&self) -> Report {
        let facts = collectors::collect(&self.probes, &self.context());
        self.builder.build(facts)
    }

    /// Run the probes on the blocking pool, keeping the caller's log subscriber.
    async fn build_detached(&self, ctx: &ProbeContext) -> Result<Report> {
        let probes = self.probes.clone();
        let ctx = ctx.clone();
        let dispatch = dispatcher::get_default(|current| current.clone());

        let facts = tokio::task::spawn_blocking(move || {
            dispatcher::with_default(&dispatch, || collectors::collect(&probes, &ctx))
        })
        .await
        .map_err(|e| Error::ProbeTask(e.to_string()))?;

        Ok(self.builder.build(facts))
    }

    fn endpoint(&self, identity: &OsIdentity) -> Result<Url> {
        report_url(&self.config.endpoint, &identity.id, &identity.version_id)
    }

    /// Run the full lifecycle once.
    ///
    /// Gate and store failures are returned as errors and nothing is sent.
    /// A failed delivery is not an error: the decision is already stored and
    /// the failure is reported in the outcome.
    pub async fn run(&self, options: RunOptions<'_>) -> Result<RunOutcome> {
        let ctx = self.context();
        let identity = OsIdentity::detect(&ctx);
        let key = identity.cache_key();
        let endpoint = self.endpoint(&identity)?;
        info!("{}: report run for {}", Stage::Start, key);

        if options.force {
            debug!("Forced run, not checking for an existing decision");
        } else if let Some(existing) = self.store.load(&key)? {
            info!(
                "{}: {} already recorded for {}, not sending again",
                Stage::AlreadyDecided,
                existing.kind(),
                key
            );
            return Ok(RunOutcome::AlreadyDecided {
                key,
                kind: existing.kind(),
            });
        }

        let report = self
            .build_detached(&ctx)
            .await
            .map_err(|e| failed(Stage::Built, e))?;
        info!(
            "{}: report version {} with {} categories",
            Stage::Built,
            report.version(),
            report.category_names().count()
        );

        let mut gate = ConsentGate::new().auto_confirm(options.auto_confirm);
        if let Some(prompter) = options.prompter {
            gate = gate.with_prompter(prompter);
        }
        let record = gate
            .resolve(options.answer, report)
            .map_err(|e| failed(Stage::Gated, e))?;
        info!("{}: decided on {}", Stage::Gated, record.kind());

        self.store
            .save(&key, &record)
            .map_err(|e| failed(Stage::Stored, e))?;
        info!("{}: {} recorded for {}", Stage::Stored, record.kind(), key);

        let delivery = if record.kind() == DecisionKind::OptOut && !self.config.send_opt_out {
            info!("Opt-out kept local, not notifying {}", endpoint);
            None
        } else {
            let result = self.sender.send(&endpoint, &record).await;
            info!("{}: {}", Stage::Sent, result);
            Some(result)
        };

        info!("{}: {} for {}", Stage::Done, record.kind(), key);
        Ok(RunOutcome::Completed {
            key,
            kind: record.kind(),
            delivery,
        })
    }
}

fn failed(stage: Stage, err: Error) -> Error {
    info!("{} before {}: {}", Stage::Failed, stage, err);
    err
}
