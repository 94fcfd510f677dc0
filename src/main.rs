//! hostreport CLI
//!
//! Shows, records and sends the host report.

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use hostreport::{
    cli::{Cli, Commands, DeliveryArgs},
    consent::TerminalPrompter,
    logging::{self, Verbosity},
    Answer, Config, Pipeline, RunOptions, RunOutcome,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(Verbosity::from_count(cli.verbose));

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(root) = &cli.root {
        config = config.with_root(root);
    }

    match cli.command {
        Commands::Show => run_show(config),
        Commands::Send(args) => run_send(config, args.answer.into(), args.delivery, cli.quiet).await,
        Commands::Interactive(args) => run_send(config, Answer::Unset, args, cli.quiet).await,
    }
}

/// Run the show command.
fn run_show(config: Config) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("Invalid configuration")?;
    let report = pipeline.show();
    println!(
        "{}",
        report.to_json_pretty().context("Failed to render report")?
    );
    Ok(())
}

/// Run the send and interactive commands.
async fn run_send(
    mut config: Config,
    answer: Answer,
    args: DeliveryArgs,
    quiet: bool,
) -> Result<()> {
    if let Some(url) = args.url {
        config = config.with_endpoint(url);
    }
    let pipeline = Pipeline::from_config(config).context("Invalid configuration")?;

    let prompter = TerminalPrompter;
    let mut options = RunOptions::new(answer).force(args.force);
    if answer == Answer::Unset {
        options = options.with_prompter(&prompter);
    }

    let outcome = pipeline
        .run(options)
        .await
        .context("Failed to record report decision")?;

    if let Some(warning) = outcome.warning() {
        eprintln!("{}", style(warning).yellow());
    }

    if quiet {
        return Ok(());
    }

    let path = pipeline.store().path_for(outcome.key());
    match &outcome {
        RunOutcome::AlreadyDecided { kind, .. } => {
            eprintln!(
                "{}",
                style(format!(
                    "A {} was already recorded in {}; use --force to send again",
                    kind,
                    path.display()
                ))
                .dim()
            );
        }
        RunOutcome::Completed { kind, delivery, .. } => {
            eprintln!(
                "{}",
                style(format!("Saved {} to {}", kind, path.display())).green()
            );
            match delivery {
                Some(result) if result.is_success() => {
                    eprintln!("{}", style(format!("Server: {}", result)).green());
                }
                Some(_) => {}
                None => eprintln!("{}", style("Opt-out kept local, nothing sent").dim()),
            }
        }
    }

    Ok(())
}
