// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `summarize`, and
// their flags.
//
// Boolean flags accept both forms:
//   --from-scratch            → true
//   --from-scratch false      → false
// and the underscore spellings (--from_scratch, --disable_cuda,
// --self_critical) are kept as aliases.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{ArgAction, ArgGroup, Args, Subcommand};

use crate::application::{
    config::TrainConfig,
    train_use_case::TrainRequest,
};
use crate::error::{Result, Seq2SeqError};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train (or resume training) an encoder-decoder model
    Train(TrainArgs),

    /// Summarise a text with a trained checkpoint
    Summarize(SummarizeArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["config", "config_file"])))]
pub struct TrainArgs {
    /// Named configuration (tiny, small, gigaword)
    #[arg(long)]
    pub config: Option<String>,

    /// JSON file with every TrainConfig key
    #[arg(long, alias = "config_file")]
    pub config_file: Option<std::path::PathBuf>,

    /// Ignore any saved checkpoint and initialise fresh weights
    #[arg(long, alias = "from_scratch", action = ArgAction::Set, num_args = 0..=1, default_value_t = false, default_missing_value = "true")]
    pub from_scratch: bool,

    /// Run on the CPU even when an accelerator is available
    #[arg(long, alias = "disable_cuda", action = ArgAction::Set, num_args = 0..=1, default_value_t = false, default_missing_value = "true")]
    pub disable_cuda: bool,

    /// Weight λ of the self-critical term, in [0, 1]
    #[arg(long, alias = "self_critical", default_value_t = 0.0)]
    pub self_critical: f64,
}

impl TrainArgs {
    /// Resolve the configuration source into a request for Layer 2.
    pub fn into_request(self) -> Result<TrainRequest> {
        let config = match (&self.config, &self.config_file) {
            (_, Some(path)) => TrainConfig::from_file(path)?,
            (Some(name), None) => TrainConfig::by_name(name)?,
            (None, None) => {
                return Err(Seq2SeqError::Configuration(
                    "either --config or --config-file is required".to_string(),
                ))
            }
        };
        Ok(TrainRequest {
            config,
            from_scratch:        self.from_scratch,
            disable_accelerator: self.disable_cuda,
            self_critical:       self.self_critical,
        })
    }
}

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Directory the training run saved into
    #[arg(long, alias = "model_path", default_value = "models/")]
    pub model_path: String,

    /// Artefact prefix of the run (e.g. small_)
    #[arg(long)]
    pub prefix: String,

    /// Text to summarise
    #[arg(long)]
    pub text: String,

    /// Cap on generated words (defaults to the run's max_decode_len)
    #[arg(long, alias = "max_len")]
    pub max_len: Option<usize>,

    /// Run on the CPU even when an accelerator is available
    #[arg(long, alias = "disable_cuda", action = ArgAction::Set, num_args = 0..=1, default_value_t = false, default_missing_value = "true")]
    pub disable_cuda: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train(args: &[&str]) -> TrainArgs {
        let argv = ["seq2seq-rl", "train"].into_iter().chain(args.iter().copied());
        let cli  = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Train(a) => a,
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_bool_flags_with_and_without_value() {
        let a = train(&["--config", "tiny", "--from-scratch", "--disable_cuda", "false"]);
        assert!(a.from_scratch);
        assert!(!a.disable_cuda);

        let b = train(&["--config", "tiny", "--from_scratch", "true", "--self_critical", "0.25"]);
        assert!(b.from_scratch);
        assert_eq!(b.self_critical, 0.25);
    }

    #[test]
    fn test_request_from_named_config() {
        let req = train(&["--config", "tiny"]).into_request().unwrap();
        assert_eq!(req.config.prefix, "tiny_");
        assert!(!req.from_scratch);
        assert_eq!(req.self_critical, 0.0);
    }

    #[test]
    fn test_unknown_config_name() {
        assert!(train(&["--config", "huge"]).into_request().is_err());
    }

    #[test]
    fn test_config_source_is_required() {
        assert!(Cli::try_parse_from(["seq2seq-rl", "train"]).is_err());
    }
}
