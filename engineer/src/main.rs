//! `engineer`: generate a codebase from the `prompt` file in a project directory.
//!
//! The selected preset decides which steps run: clarifying questions,
//! specification and test generation, code generation, and optionally
//! running the generated `run.sh`.

use std::env;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};

use engineer::core::preset::Preset;
use engineer::exit_codes;
use engineer::io::backend::OpenAiBackend;
use engineer::io::cancel::CancelToken;
use engineer::io::config::{EngineerConfig, load_config};
use engineer::io::console::TerminalConsole;
use engineer::io::conversation::Ai;
use engineer::io::preprompts::seed_missing;
use engineer::io::project::ProjectPaths;
use engineer::logging;
use engineer::pipeline::run_preset;
use engineer::steps::StepContext;

#[derive(Parser, Debug)]
#[command(
    name = "engineer",
    version,
    about = "Turn a natural-language prompt into a generated codebase"
)]
struct Cli {
    /// Project directory holding `prompt` (and optionally `feedback`, `engineer.toml`).
    #[arg(default_value = "example")]
    project: PathBuf,

    /// Remove the memory and workspace directories before running.
    #[arg(long)]
    delete_existing: bool,

    /// Model identifier (overrides `engineer.toml`).
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature (overrides `engineer.toml`).
    #[arg(long)]
    temperature: Option<f64>,

    /// Prefix for the memory and workspace directory names.
    #[arg(long, default_value = "")]
    run_prefix: String,

    /// Debug logging for this crate on stderr (unless `RUST_LOG` is set).
    #[arg(long)]
    verbose: bool,

    /// Preset to run: default, benchmark, simple, tdd, tdd+, clarify, respec,
    /// execute_only, evaluate, use_feedback.
    #[arg(short, long)]
    steps: Option<String>,

    /// Preprompt directory (default: `PROJECT/preprompts`).
    #[arg(long)]
    preprompts: Option<PathBuf>,
}

impl Cli {
    fn paths(&self) -> ProjectPaths {
        let paths = ProjectPaths::new(&self.project, &self.run_prefix);
        match &self.preprompts {
            Some(dir) => paths.with_preprompts_dir(dir),
            None => paths,
        }
    }

    /// Flags win over values from the config file.
    fn apply_overrides(&self, cfg: &mut EngineerConfig) -> Result<()> {
        if let Some(model) = &self.model {
            cfg.model.clone_from(model);
        }
        if let Some(temperature) = self.temperature {
            cfg.temperature = temperature;
        }
        if let Some(steps) = &self.steps {
            cfg.steps.clone_from(steps);
        }
        cfg.validate()
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        process::exit(exit_codes::FAILURE);
    }
    process::exit(exit_codes::OK);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let paths = cli.paths();

    let mut cfg = load_config(&paths.config_path)?;
    cli.apply_overrides(&mut cfg)?;
    let preset: Preset = cfg.steps.parse()?;

    logging::init(cli.verbose);
    debug!(?cfg, preset = %preset, project = %paths.root.display(), "resolved configuration");

    if cli.delete_existing {
        paths.reset()?;
    }

    let stores = paths.stores();
    seed_missing(&stores.preprompts)?;

    let api_key = env::var(&cfg.api_key_env).ok().filter(|key| !key.is_empty());
    if api_key.is_none() {
        warn!(var = %cfg.api_key_env, "no API key set; backend requests will be unauthenticated");
    }
    let backend = OpenAiBackend::new(&cfg.base_url, api_key)?;
    debug!(endpoint = backend.endpoint(), "chat backend ready");

    let console = TerminalConsole;
    let ai = Ai::new(Box::new(backend), cfg.model, cfg.temperature, Rc::new(console));
    info!(model = ai.model(), temperature = ai.temperature(), "using model");
    let cancel = CancelToken::ctrl_c();
    let ctx = StepContext {
        ai: &ai,
        stores: &stores,
        console: &console,
        cancel: &cancel,
    };

    let outcome = run_preset(preset, &ctx, |step| {
        info!(
            step = %step.step,
            index = step.index + 1,
            total = step.total,
            messages = step.messages,
            "step finished"
        );
    })?;
    info!(preset = %outcome.preset, steps = outcome.steps_executed, "pipeline finished");
    Ok(())
}
