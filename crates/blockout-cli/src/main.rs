use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use blockout_engine::{
    DayBuckets, EngineConfig, MemoryStore, Occurrence, OwnerId, Scheduler, VisibleWindow,
};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "blockouts",
    about = "Expand recurring blockouts and list them per calendar day",
    version
)]
struct Cli {
    /// TOML config file (timezone, week_start, pad_to_weeks)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Per-day segments for the window
    Agenda(WindowArgs),
    /// Concrete occurrences overlapping the window
    Expand(WindowArgs),
    /// Dates a month calendar should highlight
    Highlights(WindowArgs),
}

#[derive(Args)]
struct WindowArgs {
    /// JSON array of blockouts (use - for stdin)
    #[arg(short, long, default_value = "-")]
    file: String,

    /// Month to show, as YYYY-MM
    #[arg(long, conflicts_with_all = ["from", "to"])]
    month: Option<String>,

    /// First date to show (inclusive)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last date to show (inclusive)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Only show blockouts belonging to this owner
    #[arg(long)]
    owner: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref()).context("failed to load config")?;
    debug!(timezone = %config.timezone, "loaded config");

    let args = match &cli.command {
        Command::Agenda(args) | Command::Expand(args) | Command::Highlights(args) => args,
    };
    let window = resolve_window(&config, args)?;
    let store = MemoryStore::from_json_reader(open_input(&args.file)?)
        .with_context(|| format!("failed to read blockouts from {}", args.file))?;

    let mut scheduler = Scheduler::with_window(config, window);
    let owner = args.owner.clone().map(OwnerId::from);
    scheduler.load(&store, owner.as_ref())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &cli.command {
        Command::Agenda(_) => print_agenda(&scheduler, args.format, &mut out)?,
        Command::Expand(_) => print_occurrences(&scheduler, args.format, &mut out)?,
        Command::Highlights(_) => print_highlights(&scheduler, args.format, &mut out)?,
    }
    out.flush()?;
    Ok(())
}

fn open_input(path: &str) -> Result<Box<dyn Read>> {
    if path == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}

fn resolve_window(config: &EngineConfig, args: &WindowArgs) -> Result<VisibleWindow> {
    if let Some(month) = &args.month {
        let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
            .with_context(|| format!("invalid --month '{month}', expected YYYY-MM"))?;
        return Ok(config.month_window(first)?);
    }
    match (args.from, args.to) {
        (Some(from), Some(to)) => {
            if to < from {
                bail!("--to {to} is before --from {from}");
            }
            Ok(VisibleWindow::from_dates(from, to)?)
        }
        _ => Ok(config.initial_window(Utc::now())?),
    }
}

// ── Rendering ───────────────────────────────────────────────────────────────

fn print_agenda(scheduler: &Scheduler, format: Format, out: &mut dyn Write) -> Result<()> {
    let agenda = scheduler.agenda();
    match format {
        Format::Json => write_json(out, &agenda),
        Format::Text => write_agenda_text(out, &agenda),
    }
}

fn write_agenda_text(out: &mut dyn Write, agenda: &DayBuckets) -> Result<()> {
    if agenda.is_empty() {
        writeln!(out, "No blockouts in this window")?;
        return Ok(());
    }
    for (date, segments) in agenda.iter() {
        writeln!(out, "{}", date.format("%a %Y-%m-%d"))?;
        for s in segments {
            let marker = if s.recurring { " (recurring)" } else { "" };
            writeln!(out, "  {:<11}  {}{}", s.time_label(), s.blockout_id, marker)?;
        }
    }
    Ok(())
}

fn print_occurrences(scheduler: &Scheduler, format: Format, out: &mut dyn Write) -> Result<()> {
    let occurrences = scheduler.occurrences();
    match format {
        Format::Json => write_json(out, &occurrences),
        Format::Text => {
            for o in &occurrences {
                writeln!(out, "{}", occurrence_line(o))?;
            }
            Ok(())
        }
    }
}

fn occurrence_line(o: &Occurrence) -> String {
    format!(
        "{}  {}  {}",
        o.start().format("%Y-%m-%d %H:%M"),
        o.end().format("%Y-%m-%d %H:%M"),
        o.blockout_id
    )
}

fn print_highlights(scheduler: &Scheduler, format: Format, out: &mut dyn Write) -> Result<()> {
    let days = scheduler.agenda().highlighted_days();
    match format {
        Format::Json => write_json(out, &days),
        Format::Text => {
            for day in days {
                writeln!(out, "{day}")?;
            }
            Ok(())
        }
    }
}

fn write_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
