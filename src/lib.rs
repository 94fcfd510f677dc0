//! One-shot host telemetry reporter.
//!
//! Collects host facts (OS release, hardware, graphics, session, installer
//! history) into a versioned report, asks whether it may be shared, stores
//! the decision and sends it once to a collection server. Declining stores
//! and sends only `{"OptOut": true}`.
//!
//! # Lifecycle
//!
//! - **Collect**: [`collectors`] probes each return an optional blob; a probe
//!   with nothing to say is left out of the report.
//! - **Build**: [`report::ReportBuilder`] stamps the schema `Version`.
//! - **Gate**: [`consent::ConsentGate`] picks the report or the opt-out.
//! - **Store**: [`store::ReportStore`] keeps one record per OS release; a
//!   stored record makes later runs return early.
//! - **Send**: [`sender::HttpSender`] posts it once, with a deadline.
//!
//! # Example
//!
//! ```no_run
//! use hostreport::{Answer, Config, Pipeline, RunOptions};
//!
//! # async fn run() -> hostreport::Result<()> {
//! let pipeline = Pipeline::from_config(Config::load()?)?;
//! let outcome = pipeline.run(RunOptions::new(Answer::No)).await?;
//! if let Some(warning) = outcome.warning() {
//!     eprintln!("{}", warning);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collectors;
pub mod config;
pub mod consent;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod sender;
pub mod store;

pub use config::Config;
pub use consent::{Answer, ConsentGate, Prompter};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunOptions, RunOutcome};
pub use record::{DecisionKind, OutcomeRecord};
pub use report::{Report, ReportBuilder};
pub use store::{CacheKey, FileStore, MemoryStore, ReportStore};
