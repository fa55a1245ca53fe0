use crate::config::EngineConfig;
use crate::interpreter::{Execution, Program, RunState};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Stepwise - run scripts in resumable, persistable slices", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a script and run it for a number of ticks
    Run {
        /// Script in JSON form
        script: PathBuf,

        /// Function to run
        #[arg(short = 'e', long = "entry", default_value = "main")]
        entry: String,

        /// Steps per tick (overrides config)
        #[arg(short = 'b', long = "budget")]
        budget: Option<i32>,

        /// Number of ticks before giving up
        #[arg(short = 't', long = "ticks", default_value = "1000")]
        ticks: usize,

        /// Where to save the state if the run is still suspended
        #[arg(short = 's', long = "save")]
        save: Option<PathBuf>,
    },

    /// Load a saved state and keep running it
    Resume {
        /// Script the state was saved from
        script: PathBuf,

        /// Saved state
        state: PathBuf,

        /// Steps per tick (overrides config)
        #[arg(short = 'b', long = "budget")]
        budget: Option<i32>,

        /// Number of ticks before giving up
        #[arg(short = 't', long = "ticks", default_value = "1000")]
        ticks: usize,

        /// Where to save the state if the run is still suspended
        #[arg(short = 's', long = "save")]
        save: Option<PathBuf>,
    },

    /// Show where a saved run stopped and what its blocks hold
    Inspect {
        /// Script the state was saved from
        script: PathBuf,

        /// Saved state
        state: PathBuf,
    },
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            script,
            entry,
            budget,
            ticks,
            save,
        } => {
            let config = load_config(cli.config, budget)?;
            let mut exec = Execution::new(load_program(&script)?, &config);
            let state = drive(&mut exec, Some(&entry), ticks)?;
            report(&exec, state, save.as_deref())
        }

        Commands::Resume {
            script,
            state,
            budget,
            ticks,
            save,
        } => {
            let config = load_config(cli.config, budget)?;
            let mut exec = Execution::new(load_program(&script)?, &config);
            load_state(&mut exec, &state)?;
            if !exec.is_running() {
                println!("Saved state has no run in progress");
                return Ok(());
            }
            let result = drive(&mut exec, None, ticks)?;
            report(&exec, result, save.as_deref())
        }

        Commands::Inspect { script, state } => {
            let config = load_config(cli.config, None)?;
            let mut exec = Execution::new(load_program(&script)?, &config);
            load_state(&mut exec, &state)?;
            inspect(&exec);
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>, budget: Option<i32>) -> Result<EngineConfig> {
    EngineConfig::builder()
        .config_path(path)
        .step_budget(budget)
        .build()
        .context("Failed to load configuration")
}

fn load_program(path: &Path) -> Result<Rc<Program>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let program = Program::from_json(&source)
        .with_context(|| format!("Failed to parse script {}", path.display()))?;
    Ok(Rc::new(program))
}

fn load_state(exec: &mut Execution, path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open state {}", path.display()))?;
    exec.load(BufReader::new(file))
        .with_context(|| format!("Failed to load state {}", path.display()))
}

/// Resumes up to `ticks` times, printing script output as it appears
fn drive(exec: &mut Execution, entry: Option<&str>, ticks: usize) -> Result<RunState> {
    for _ in 0..ticks {
        let state = match entry {
            Some(entry) => exec.resume_or_start(entry)?,
            None => exec.resume()?,
        };
        for line in exec.drain_output() {
            println!("{}", line);
        }
        if !matches!(state, RunState::Suspended) {
            return Ok(state);
        }
    }
    Ok(RunState::Suspended)
}

fn report(exec: &Execution, state: RunState, save: Option<&Path>) -> Result<()> {
    match state {
        RunState::Finished(value) => {
            let shown = value.map(|v| v.display()).unwrap_or_else(|| "void".to_string());
            println!("Finished: {}", shown);
            Ok(())
        }
        RunState::Failed(err) => Err(anyhow!("Script failed: {}", err)),
        RunState::Suspended => {
            match save {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    exec.save(BufWriter::new(file))
                        .with_context(|| format!("Failed to save state to {}", path.display()))?;
                    println!("Suspended, state saved to {}", path.display());
                }
                None => println!("Suspended"),
            }
            Ok(())
        }
    }
}

fn inspect(exec: &Execution) {
    let Some(entry) = exec.entry() else {
        println!("No run in progress");
        return;
    };
    println!("Entry: {}", entry);
    if let Some(pos) = exec.run_position() {
        println!("Position: {} at {}..{}", pos.function, pos.span.start, pos.span.end);
    }
    let mut level = 0;
    while let Some(block) = exec.stack_vars(level) {
        println!("\nBlock {} (in {}):", level, block.function);
        for var in &block.vars {
            let value = if var.is_initialized() {
                var.display()
            } else {
                "<undefined>".to_string()
            };
            println!("  {}: {} = {}", var.name, var.ty, value);
        }
        level -= 1;
    }
}
