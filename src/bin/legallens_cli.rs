use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use legallens::{
    analysis::{AnalysisApi, AnalysisService, SplitStrategy},
    config::Config,
    export::render_report,
    logging,
};

#[derive(Parser)]
#[command(
    name = "legallens-cli",
    about = "Analyze legal documents from the command line"
)]
struct Cli {
    /// Log pipeline progress to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify every clause and print the plain-text report.
    Analyze {
        #[command(flatten)]
        source: Source,
        /// Skip the remote model and use keyword classification only.
        #[arg(long)]
        offline: bool,
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },
    /// Print the sections the splitter produces, without classifying them.
    Split {
        #[command(flatten)]
        source: Source,
        #[arg(long, value_enum, default_value = "paragraph")]
        strategy: StrategyArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Blank-line paragraphs grouped under headings.
    Paragraph,
    /// Newline runs merged while a sentence continues.
    Continuation,
}

impl From<StrategyArg> for SplitStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Paragraph => SplitStrategy::Paragraph,
            StrategyArg::Continuation => SplitStrategy::Continuation,
        }
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Source {
    /// PDF or text file to read.
    path: Option<PathBuf>,
    /// Inline document text.
    #[arg(long)]
    text: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli_tracing(cli.verbose);

    match cli.command {
        Command::Analyze {
            source,
            offline,
            strategy,
        } => {
            let mut config = if offline {
                Config::offline()
            } else {
                let _ = dotenvy::dotenv();
                Config::from_env().context("failed to load configuration")?
            };
            if let Some(strategy) = strategy {
                config.split_strategy = strategy.into();
            }
            analyze(&config, source).await
        }
        Command::Split { source, strategy } => {
            let strategy = SplitStrategy::from(strategy);
            let text = read_source(source, &Config::offline()).await?;
            for (index, section) in strategy.split(&text).iter().enumerate() {
                println!("--- section {} ---\n{section}\n", index + 1);
            }
            Ok(())
        }
    }
}

async fn analyze(config: &Config, source: Source) -> Result<()> {
    let service = AnalysisService::new(config);
    let text = read_source(source, config).await?;
    let document = service.analyze_text(text).await?;

    let today = time::OffsetDateTime::now_utc().date();
    println!("{}", render_report(&document, today));

    let metrics = service.metrics_snapshot();
    if metrics.fallback_classifications > 0 {
        eprintln!(
            "note: {} of {} clauses were classified by keyword fallback",
            metrics.fallback_classifications, metrics.clauses_classified
        );
    }
    Ok(())
}

/// Read and validate document text with the same rules the upload endpoint applies.
async fn read_source(source: Source, config: &Config) -> Result<String> {
    match source {
        Source {
            path: Some(path), ..
        } => {
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            let kind = legallens::intake::detect_kind(file_name.as_deref(), None)?;
            let limit = config.max_upload_bytes;
            let text = tokio::task::spawn_blocking(move || {
                legallens::intake::extract_text(kind, &bytes, limit)
            })
            .await??;
            Ok(text)
        }
        Source {
            text: Some(text), ..
        } => Ok(legallens::intake::accept_pasted_text(&text, config.max_upload_bytes)?),
        Source { .. } => bail!("either a path or --text is required"),
    }
}
