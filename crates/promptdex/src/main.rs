//! Promptdex inspector
//!
//! Developer tool for looking at what the prompt index sees:
//! - `scan` builds one snapshot of a directory and prints it as a tree or JSON
//! - `watch` keeps an index live and prints a line per refresh

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use promptdex_index::{IndexConfig, IndexWatcher, PromptFile, PromptIndex, PromptStructure};
use promptdex_logging::{init_logging, LogConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "promptdex", about = "Inspect a prompt library index")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Append logs to this file as well
    #[arg(long, global = true, env = "PROMPTDEX_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index once and print it
    Scan {
        /// Prompt root directory
        path: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Index configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Watch a directory and report every index refresh until Ctrl-C
    Watch {
        /// Prompt root directory
        path: PathBuf,

        /// Index configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogConfig {
        app_name: "promptdex",
        verbose: cli.verbose,
        log_file: cli.log_file.clone(),
    }) {
        eprintln!("Warning: {:#}", e);
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Scan { path, json, config } => cmd_scan(&path, json, config.as_deref()).await,
        Commands::Watch { path, config } => cmd_watch(&path, config.as_deref()).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<IndexConfig> {
    match path {
        Some(path) => IndexConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(IndexConfig::default()),
    }
}

fn open_index(root: &Path, config: Option<&Path>) -> Result<(PathBuf, PromptIndex)> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Cannot access prompt root: {}", root.display()))?;
    let config = load_config(config)?;
    let index = PromptIndex::local(&root, config).context("Invalid index configuration")?;
    Ok((root, index))
}

async fn cmd_scan(root: &Path, json: bool, config: Option<&Path>) -> Result<()> {
    let (root, index) = open_index(root, config)?;
    let structure = index.get_structure().await;

    if json {
        let output = serde_json::to_string_pretty(structure.as_ref())
            .context("Failed to serialize prompt structure")?;
        println!("{}", output);
    } else {
        print_tree(&structure, &root);
    }

    let stats = index.stats();
    if stats.builds_failed > 0 {
        warn!(failed = stats.builds_failed, "Index build failed, output is empty");
    }
    Ok(())
}

async fn cmd_watch(root: &Path, config: Option<&Path>) -> Result<()> {
    let (root, index) = open_index(root, config)?;
    let mut refreshes = index.subscribe();
    let _watcher = IndexWatcher::start(index.clone(), &root)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    let structure = index.get_structure().await;
    println!("{}", summary_line("initial", &structure));
    info!(root = %root.display(), "Watching for changes, press Ctrl-C to stop");

    loop {
        tokio::select! {
            event = refreshes.recv() => match event {
                Ok(event) => {
                    let structure = index.get_structure().await;
                    println!("{}", summary_line(&format!("{:?}", event.reason), &structure));
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Refresh notifications dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
        }
    }

    index.shutdown();
    Ok(())
}

fn summary_line(label: &str, structure: &PromptStructure) -> String {
    format!(
        "[{}] {} prompts in {} folders",
        label,
        structure.prompt_count(),
        structure.folders.len()
    )
}

fn print_tree(structure: &PromptStructure, root: &Path) {
    println!("{}", root.display());
    for prompt in &structure.root_prompts {
        println!("  {}", prompt_line(prompt));
    }
    print_children(structure, root, 1);

    println!();
    println!(
        "{} prompts, {} folders",
        structure.prompt_count(),
        structure.folders.len()
    );
}

fn print_children(structure: &PromptStructure, parent: &Path, depth: usize) {
    let indent = "  ".repeat(depth);
    for folder in structure.child_folders(parent) {
        println!("{}{}/", indent, folder.name);
        for prompt in &folder.prompts {
            println!("{}  {}", indent, prompt_line(prompt));
        }
        print_children(structure, &folder.path, depth + 1);
    }
}

fn prompt_line(prompt: &PromptFile) -> String {
    let file_name = prompt
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| prompt.name.clone());
    let mut line = format!("{} ({})", prompt.title, file_name);
    if !prompt.tags.is_empty() {
        let tags: Vec<&str> = prompt.tags.iter().map(String::as_str).collect();
        line.push_str(&format!(" [{}]", tags.join(", ")));
    }
    line
}
