// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`     — trains (or resumes) a model from a named config
//   2. `summarize` — loads a checkpoint and decodes one text
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, SummarizeArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "seq2seq-rl",
    version,
    about = "Train a GRU encoder-decoder with cross-entropy and self-critical ROUGE rewards."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)     => run_train(args),
            Commands::Summarize(args) => run_summarize(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let request = args.into_request()?;
    tracing::info!(
        "Loading data with configuration '{}'...",
        request.config.prefix.trim_end_matches('_')
    );

    let history = TrainUseCase::new(request).execute()?;

    match history.best_score() {
        Some(best) => println!(
            "Training complete after {} steps. Best held-out score: {:.4}",
            history.global_step, best
        ),
        None => println!("Training complete after {} steps.", history.global_step),
    }
    Ok(())
}

fn run_summarize(args: SummarizeArgs) -> Result<()> {
    use crate::application::summarize_use_case::SummarizeUseCase;

    let use_case = SummarizeUseCase::new(&args.model_path, &args.prefix)?;
    let summary  = use_case.summarize(&args.text, args.max_len, args.disable_cuda)?;
    println!("\nSummary: {}", summary);
    Ok(())
}
