use std::io::{BufRead, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use matlog_capture::{CaptureFlow, CapturePhase};
use matlog_extract::{Extractor, Lexicon};
use matlog_schema::{EvidenceChip, SavedSession, SessionRecord, TrainingType};
use matlog_store::SessionStore;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "matlog", version, about = "log training sessions from plain text")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.matlog/sessions.db",
        help = "Path to the session database"
    )]
    db: PathBuf,

    #[arg(long, help = "Lexicon YAML override (builtin tables by default)")]
    lexicon: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Capture one session from free-form text (argument or stdin)")]
    Log {
        text: Option<String>,
        #[arg(
            long,
            default_value = "350",
            help = "Simulated processing latency in milliseconds"
        )]
        delay_ms: u64,
        #[arg(long, short = 'y', help = "Save without the review prompt")]
        yes: bool,
    },
    #[command(about = "List recently saved sessions")]
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    #[command(about = "Print the active lexicon as YAML")]
    Lexicon,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.db.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.db = PathBuf::from(home).join(cli.db.strip_prefix("~").unwrap_or(&cli.db));
        }
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let lexicon = match &cli.lexicon {
        Some(path) => Lexicon::from_yaml_file(path)?,
        None => Lexicon::default(),
    };

    match cli.command {
        Commands::Log { text, delay_ms, yes } => {
            let text = match text {
                Some(text) => text,
                None => read_stdin()?,
            };
            let store = SessionStore::open(&cli.db)?;
            let extractor = Extractor::new(lexicon)?;
            let flow = CaptureFlow::new(
                extractor,
                Arc::new(store),
                Duration::from_millis(delay_ms),
            );
            run_capture(flow, &text, yes).await
        }
        Commands::Recent { limit } => {
            let store = SessionStore::open(&cli.db)?;
            for session in store.recent(limit).await? {
                print_saved(&session);
            }
            Ok(())
        }
        Commands::Lexicon => {
            print!("{}", serde_yaml::to_string(&lexicon)?);
            Ok(())
        }
    }
}

async fn run_capture(mut flow: CaptureFlow, text: &str, yes: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut phase = flow.submit(text, &cancel).await?;

    if phase == CapturePhase::GapFill {
        let question = flow
            .question()
            .context("gap phase without a question")?
            .clone();
        println!("{}", question.prompt);
        for (idx, option) in question.options.iter().enumerate() {
            println!("  {}. {}", idx + 1, option.label());
        }
        let choice = loop {
            let answer = prompt("> ")?;
            if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
                flow.cancel();
                println!("cancelled");
                return Ok(());
            }
            if let Ok(n) = answer.parse::<usize>() {
                if n >= 1 && n <= question.options.len() {
                    break question.options[n - 1];
                }
            }
            if let Some(parsed) = TrainingType::parse(&answer) {
                break parsed;
            }
            println!("pick 1-{} or a session type", question.options.len());
        };
        phase = flow.answer_gap(choice)?;
    }

    if phase == CapturePhase::Input {
        println!("cancelled");
        return Ok(());
    }

    if let Some(record) = flow.record() {
        print_record(record);
        print_chips(flow.chips());
    }

    if !yes {
        let answer = prompt("Save this session? [Y/n] ")?;
        if answer.eq_ignore_ascii_case("n") {
            flow.cancel();
            println!("cancelled");
            return Ok(());
        }
    }

    phase = flow.confirm(&cancel).await?;
    while phase == CapturePhase::Error {
        println!(
            "save failed: {}",
            flow.last_error().unwrap_or("unknown error")
        );
        let answer = prompt("Retry save? [r/a] ")?;
        if answer.eq_ignore_ascii_case("r") {
            phase = flow.retry(&cancel).await?;
        } else {
            flow.cancel();
            println!("abandoned");
            return Ok(());
        }
    }

    match phase {
        CapturePhase::Success => {
            let id = flow.saved_id().context("success without a saved id")?;
            println!("saved session {id}");
            Ok(())
        }
        CapturePhase::Input => {
            println!("cancelled");
            Ok(())
        }
        other => bail!("unexpected final phase: {}", other.as_str()),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read session text from stdin")?;
    if buf.trim().is_empty() {
        bail!("no session text given (pass it as an argument or on stdin)");
    }
    Ok(buf)
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_record(record: &SessionRecord) {
    println!();
    if let Some(training_type) = record.training_type {
        println!("Session:   {}", training_type.label());
    }
    if let Some(minutes) = record.duration_minutes {
        println!("Duration:  {minutes} min");
    }
    if let Some(rounds) = record.sparring_rounds {
        println!("Rounds:    {rounds}");
    }
    if !record.techniques_drilled.is_empty() {
        println!("Drilled:   {}", record.techniques_drilled.join(", "));
    }
    for result in &record.sparring_results {
        match result.direction {
            matlog_schema::SparringDirection::Given => {
                println!("Sub given: {}", result.technique)
            }
            matlog_schema::SparringDirection::Received => {
                println!("Sub taken: {}", result.technique)
            }
        }
    }
    for note in &record.positive_notes {
        println!("Win:       {note}");
    }
    for note in &record.struggle_notes {
        println!("Struggle:  {note}");
    }
}

fn print_chips(chips: &[EvidenceChip]) {
    if chips.is_empty() {
        println!("(nothing recognized in the text)");
        return;
    }
    println!();
    for chip in chips {
        println!("  [{}] {} = {}", chip.category.as_str(), chip.label, chip.value);
    }
}

fn print_saved(session: &SavedSession) {
    let record = &session.record;
    let training_type = record
        .training_type
        .map(|t| t.label())
        .unwrap_or("unknown");
    let duration = record
        .duration_minutes
        .map(|m| format!("{m} min"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {:<9} {:<8} subs {:+}  {}",
        session.created_at.format("%Y-%m-%d %H:%M"),
        training_type,
        duration,
        sub_balance(record),
        session.id
    );
}

fn sub_balance(record: &SessionRecord) -> i64 {
    record
        .sparring_results
        .iter()
        .map(|r| match r.direction {
            matlog_schema::SparringDirection::Given => 1,
            matlog_schema::SparringDirection::Received => -1,
        })
        .sum()
}
