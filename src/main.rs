use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use complaint_rag::application::services::{ComplaintService, ContextAssembler};
use complaint_rag::application::AskResponse;
use complaint_rag::domain::{DomainError, ResultBound};
use complaint_rag::{build_environment, init_tracing, AppHandles};

const GENERIC_FAILURE: &str = "Sorry, something went wrong while answering. Please try again.";

#[derive(Debug, Parser)]
#[command(
    name = "complaint-rag",
    about = "Ask questions about customer complaints",
    long_about = "Answer questions over the indexed complaints corpus. Filters on client name, \
                  region and complaint date are inferred from the question.",
    after_help = "Examples:\n  complaint-rag ask \"Show me all complaints in region MC\"\n  \
                  complaint-rag search \"card payments\" --filter '{\"client_region\": \"LC\"}' --k 5\n  \
                  complaint-rag chat"
)]
struct Cli {
    /// Emit machine-readable JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Answer one question through the tool-calling loop")]
    Ask { query: String },
    #[command(about = "Answer one question with the fixed extract, retrieve, answer pipeline")]
    Direct { query: String },
    #[command(about = "Interactive session; one question per line, empty line or EOF to quit")]
    Chat {
        #[arg(long, help = "Use the fixed pipeline instead of the tool-calling loop")]
        direct: bool,
    },
    #[command(about = "Retrieve matching complaints and print them as CSV context")]
    Search {
        query: String,
        #[arg(long, help = "Metadata filter as JSON, e.g. {\"client_region\": \"MC\"}")]
        filter: Option<String>,
        #[arg(long, help = "Maximum number of complaints to return")]
        k: Option<usize>,
    },
    #[command(about = "Check the index and print configuration details")]
    Health,
    #[command(about = "Print the effective configuration (token redacted)")]
    Config {
        #[arg(long, help = "Write the effective configuration to config.json")]
        write: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<DomainError>() {
                Some(domain) => report_failure(domain),
                None => {
                    error!(target: "complaint_rag::cli", error = ?err, "command failed");
                    eprintln!("{GENERIC_FAILURE}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let handles = build_environment().context("failed to bootstrap complaints environment")?;
    let json = cli.json;

    match cli.command {
        Command::Ask { query } => {
            let response = handles.service.ask(&query).map_err(into_anyhow)?;
            print_response(&response, json)
        }
        Command::Direct { query } => {
            let response = handles.service.ask_direct(&query).map_err(into_anyhow)?;
            print_response(&response, json)
        }
        Command::Chat { direct } => chat(&handles.service, direct, json),
        Command::Search { query, filter, k } => search(&handles, &query, filter, k),
        Command::Health => {
            let health = handles.service.health().map_err(into_anyhow)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!("{}: {}", health.message, health.details.unwrap_or_default());
                println!("data dir: {}", handles.data_dir.display());
            }
            Ok(())
        }
        Command::Config { write } => {
            if write {
                handles.config.persist().context("failed to write config file")?;
                eprintln!("wrote {}", handles.config.path().display());
            }
            let mut config = handles.config.current();
            if config.generation.bearer_token.is_some() {
                config.generation.bearer_token = Some("<redacted>".into());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn chat(service: &ComplaintService, direct: bool, json: bool) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            break;
        }

        let result = if direct {
            service.ask_direct(query)
        } else {
            service.ask(query)
        };
        match result {
            Ok(response) => print_response(&response, json)?,
            Err(err) => report_failure(&err),
        }
    }
    Ok(())
}

fn search(
    handles: &AppHandles,
    query: &str,
    filter: Option<String>,
    k: Option<usize>,
) -> Result<()> {
    let filter = filter
        .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
        .transpose()
        .context("--filter must be a JSON object")?;
    let bound = match k {
        Some(value) => ResultBound::new(value).ok_or_else(|| anyhow!("--k must be positive"))?,
        None => ResultBound::default(),
    };

    let documents = handles
        .service
        .retriever()
        .retrieve_raw(query, filter.as_ref(), bound)
        .map_err(into_anyhow)?;
    let context = ContextAssembler::new().assemble(&documents);

    print!("{}", context.to_csv());
    eprintln!("{} complaint(s)", context.len());
    Ok(())
}

fn print_response(response: &AskResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    match &response.answer {
        Some(answer) => println!("{answer}"),
        None => println!("(no answer)"),
    }
    if !response.is_complete() {
        eprintln!(
            "note: stopped after {} rounds before a final answer was reached",
            response.rounds
        );
    }
    Ok(())
}

/// Validation messages are shown as-is; other failures stay in the log.
fn report_failure(err: &DomainError) {
    if err.is_validation() {
        eprintln!("{err}");
    } else {
        error!(target: "complaint_rag::cli", error = %err, "question failed");
        eprintln!("{GENERIC_FAILURE}");
    }
}

fn into_anyhow(err: DomainError) -> anyhow::Error {
    anyhow!(err)
}
