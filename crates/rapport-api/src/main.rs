//! rapport CLI entry point.
//!
//! Parses arguments, sets up tracing, wires the tracker service and
//! dispatches to the command handlers.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use rapport_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.otel, filter_for_verbosity(cli.verbose, cli.quiet)) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "rapport", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Track { target, transcript } => {
            cli::analyze::track(&state, &target, &transcript, cli.json).await?;
        }

        Commands::Analyze {
            target,
            transcript,
            start,
            end,
        } => {
            cli::analyze::analyze(&state, &target, &transcript, start, end, cli.json, cli.quiet)
                .await?;
        }

        Commands::Add {
            target,
            summary,
            importance,
            emotion,
            keywords,
            note,
            relationship,
            change,
            between,
            speaker,
        } => {
            let args = cli::memory::AddArgs {
                summary,
                importance,
                emotion,
                keywords,
                note,
                relationship,
                change: change.into(),
                between,
                speaker,
            };
            cli::memory::add(&state, &target, args, cli.json).await?;
        }

        Commands::Import {
            target,
            facts,
            importance,
            only,
        } => {
            cli::memory::import(&state, &target, &facts, importance, &only, cli.json).await?;
        }

        Commands::Export { target, out } => {
            cli::memory::export(&state, &target, &out, cli.json).await?;
        }

        Commands::Show { target, view } => {
            cli::show::show(&state, &target, view, cli.json).await?;
        }

        Commands::Search { target, query } => {
            cli::show::search(&state, &target, &query, cli.json).await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled in main"),
    }

    Ok(())
}
