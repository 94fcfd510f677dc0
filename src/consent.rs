//! Consent resolution: turns the user's answer into the payload to keep.

use console::style;
use dialoguer::Select;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::OutcomeRecord;
use crate::report::Report;

/// The user's answer to "share this report?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Share the report.
    Yes,
    /// Opt out.
    No,
    /// Not answered yet.
    Unset,
}

impl FromStr for Answer {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" | "y" => Ok(Answer::Yes),
            "no" | "n" => Ok(Answer::No),
            "" => Ok(Answer::Unset),
            _ => Err(format!("Unknown answer: {} (expected yes or no)", s)),
        }
    }
}

/// Asks a person whether a report may be shared.
pub trait Prompter {
    /// Show `report` and return the answer. Must not return [`Answer::Unset`].
    fn ask(&self, report: &Report) -> Result<Answer>;
}

/// Resolves an [`Answer`] into exactly one [`OutcomeRecord`].
#[derive(Default)]
pub struct ConsentGate<'a> {
    auto_confirm: bool,
    prompter: Option<&'a dyn Prompter>,
}

impl<'a> ConsentGate<'a> {
    /// A gate that neither auto-confirms nor prompts.
    pub fn new() -> Self {
        Self {
            auto_confirm: false,
            prompter: None,
        }
    }

    /// Treat an unset answer as consent.
    pub fn auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    /// Ask this prompter when the answer is unset.
    pub fn with_prompter(mut self, prompter: &'a dyn Prompter) -> Self {
        self.prompter = Some(prompter);
        self
    }

    /// Decide what gets persisted and sent.
    ///
    /// `No` always wins and discards the report. `Unset` auto-confirms, then
    /// falls back to the prompter, and is an error if neither is available.
    pub fn resolve(&self, answer: Answer, report: Report) -> Result<OutcomeRecord> {
        let answer = match answer {
            Answer::Unset if self.auto_confirm => {
                debug!("No answer given, auto-confirming");
                Answer::Yes
            }
            Answer::Unset => match self.prompter {
                Some(prompter) => prompter.ask(&report)?,
                None => return Err(Error::AmbiguousConsent),
            },
            answer => answer,
        };

        match answer {
            Answer::Yes => {
                info!("Consent given, keeping report");
                Ok(OutcomeRecord::Report(report))
            }
            Answer::No => {
                info!("Opted out, discarding report content");
                Ok(OutcomeRecord::OptOut)
            }
            Answer::Unset => Err(Error::AmbiguousConsent),
        }
    }
}

/// Terminal prompter: prints the report and asks yes / no / cancel.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, report: &Report) -> Result<Answer> {
        println!("{}", style("=== Report Preview ===").bold().green());
        println!();
        println!("{}", report.to_json_pretty()?);
        println!();

        let choices = [
            "Yes, send this report",
            "No, send only an opt-out notice",
            "Cancel, decide later",
        ];
        let selection = Select::new()
            .with_prompt("Share this system report?")
            .items(&choices)
            .default(0)
            .interact_opt()
            .map_err(|e| Error::IoError {
                path: "terminal".to_string(),
                reason: e.to_string(),
            })?;

        match selection {
            Some(0) => Ok(Answer::Yes),
            Some(1) => Ok(Answer::No),
            _ => Err(Error::UserCancelled),
        }
    }
}
