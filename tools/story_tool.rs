/// Story tool: generate or check vocabulary stories from the command line.
///
/// Usage:
///   story_tool generate --words harbor,meadow [--topic T] [--response FILE] [--config FILE] [--seed N]
///   story_tool check --words harbor,meadow FILE
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process;

use story_engine::core::pipeline::{
    GeneratorError, Inspection, StoryEngine, StoryRequest, TextGenerator,
};
use story_engine::core::prompt::{split_blank_lines, Prompt};
use story_engine::schema::Phase;

#[derive(Debug, Parser)]
#[command(name = "story_tool")]
#[command(about = "Generate and check vocabulary-practice stories")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the generation state machine and print the result as JSON
    Generate {
        /// Comma-separated target words (1-5)
        #[arg(long, value_delimiter = ',', required = true)]
        words: Vec<String>,

        /// Story topic passed to the generator
        #[arg(long)]
        topic: Option<String>,

        /// File with a canned generator reply to replay
        #[arg(long)]
        response: Option<PathBuf>,

        /// Engine configuration (RON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Validate a marked story file (paragraphs separated by blank lines)
    Check {
        /// Comma-separated target words (1-5)
        #[arg(long, value_delimiter = ',', required = true)]
        words: Vec<String>,

        /// Engine configuration (RON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Marked story file
        file: PathBuf,
    },
}

/// Replays one fixed reply for every request.
struct ReplayGenerator {
    reply: String,
}

impl TextGenerator for ReplayGenerator {
    fn complete(&self, _prompt: &Prompt) -> Result<String, GeneratorError> {
        Ok(self.reply.clone())
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    let outcome = match cli.command {
        Command::Generate {
            words,
            topic,
            response,
            config,
            seed,
        } => generate(words, topic, response.as_deref(), config.as_deref(), seed),
        Command::Check {
            words,
            config,
            file,
        } => check(&words, config.as_deref(), &file),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            process::exit(2);
        }
    }
}

fn engine(config: Option<&Path>, seed: Option<u64>, reply: Option<String>) -> Result<StoryEngine> {
    let mut builder = StoryEngine::builder();
    if let Some(path) = config {
        builder = builder.config_path(path);
    }
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    if let Some(reply) = reply {
        builder = builder.generator(ReplayGenerator { reply });
    }
    Ok(builder.build()?)
}

fn generate(
    words: Vec<String>,
    topic: Option<String>,
    response: Option<&Path>,
    config: Option<&Path>,
    seed: Option<u64>,
) -> Result<bool> {
    let reply = response
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read response file {}", path.display()))
        })
        .transpose()?;
    let engine = engine(config, seed, reply)?;

    let mut request = StoryRequest::new(words);
    request.topic = topic;
    let generated = engine.generate(&request)?;
    info!("story source: {:?}", generated.source);

    println!("{}", serde_json::to_string_pretty(&generated)?);
    Ok(true)
}

fn check(words: &[String], config: Option<&Path>, file: &Path) -> Result<bool> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read story file {}", file.display()))?;
    let paragraphs = split_blank_lines(&text);
    if paragraphs.is_empty() {
        bail!("story file {} has no paragraphs", file.display());
    }

    let engine = engine(config, None, None)?;
    let inspection = engine.inspect(words, &paragraphs)?;
    print_report(&inspection);
    Ok(inspection.verdict.ok)
}

fn print_report(inspection: &Inspection) {
    println!("=== Placement Report ===\n");
    if inspection.verdict.ok {
        println!("All placement rules hold.");
    }
    for violation in &inspection.verdict.violations {
        println!("VIOLATION: {}", violation);
    }

    println!("\n=== Noise ===\n");
    for occ in &inspection.story.noise_occurrences {
        println!("  {} ({})", occ.word, occ.key());
    }

    println!("\n=== Phase Schedule ===\n");
    for (word, placement) in &inspection.schedules {
        let positions: Vec<String> = placement
            .iter()
            .map(|(phase, key)| match key {
                Some(key) => format!("{}: {}", phase.name(), key),
                None if phase == Phase::Recall => format!("{}: from memory", phase.name()),
                None => format!("{}: unplaced", phase.name()),
            })
            .collect();
        println!("  {}: {}", word, positions.join(" | "));
    }

    println!(
        "\nSummary: {} violations, {} noise words",
        inspection.verdict.violations.len(),
        inspection.story.noise_occurrences.len()
    );
}
