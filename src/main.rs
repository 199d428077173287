use anyhow::Result;
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use roster::{
    allocate, export_view, select, summarize, Config, QueryParameters, Record, RosterStore,
    SortDirection, SortKey,
};
use std::{fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./roster.json when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Roster CSV path or http(s) URL, overrides the configured source
    #[arg(short, long, global = true)]
    source: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct QueryArgs {
    /// Case-insensitive match on name, roll or email
    #[arg(long, default_value = "")]
    search: String,

    /// Keep records whose slot contains this text, e.g. "SLOT 3"
    #[arg(long, default_value = "")]
    slot: String,

    /// Keep records with exactly this duration
    #[arg(long, default_value = "")]
    duration: String,

    #[arg(long, value_enum)]
    sort: Option<SortKey>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    desc: bool,
}

impl From<QueryArgs> for QueryParameters {
    fn from(args: QueryArgs) -> Self {
        let mut params = QueryParameters::new(args.search, args.slot, args.duration, args.sort);
        if args.desc {
            params.sort_direction = SortDirection::Descending;
        }
        params
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the filtered and sorted roster
    List(QueryArgs),
    /// Print record counts per slot and per duration
    Summary,
    /// Write the filtered and sorted roster to a dated CSV file
    Export {
        #[command(flatten)]
        query: QueryArgs,

        /// Output directory, overrides the configured one
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Allocate applicants to slots from their ranked preferences
    Allocate {
        /// Applications CSV
        input: PathBuf,

        /// Where to write the allocated CSV (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn print_table(view: &[&Record]) {
    println!(
        "{:<28} {:<14} {:<32} {:<14} Slot",
        "Name", "Roll", "Email", "Duration"
    );
    for record in view {
        println!(
            "{:<28} {:<14} {:<32} {:<14} {}",
            record.name, record.roll, record.email, record.duration, record.slot
        );
    }
    println!("{} record(s)", view.len());
}

async fn load(cli_source: Option<&str>, config: &Config) -> Result<RosterStore> {
    let source = config.roster_source(cli_source)?;
    let store = RosterStore::new();
    store.load(&source).await?;
    Ok(store)
}

#[tokio::main]
async fn main() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env).with_writer(std::io::stderr).init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("Error \"{err:#}\" occurred");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let cli_source = cli.source.as_deref();

    match cli.command {
        Commands::List(query) => {
            let store = load(cli_source, &config).await?;
            let records = store.snapshot();
            print_table(&select(&records, &query.into()));
        }
        Commands::Summary => {
            let store = load(cli_source, &config).await?;
            let summary = summarize(&store.snapshot());
            println!("{} record(s)", summary.total);
            for bucket in summary.slots {
                println!("{:<12} {}", bucket.label, bucket.count);
            }
            for bucket in summary.durations {
                println!("{:<12} {}", bucket.label, bucket.count);
            }
        }
        Commands::Export { query, out_dir } => {
            let store = load(cli_source, &config).await?;
            let dir = out_dir.unwrap_or_else(|| config.export_dir.clone());
            let today = Local::now().date_naive();
            let path = export_view(&store.snapshot(), &query.into(), &dir, today)?;
            println!("Roster written to {:?}", path);
        }
        Commands::Allocate { input, output } => {
            let text = fs::read_to_string(&input)?;
            let (allocated, summary) = allocate(&text, &config.allocation)?;
            match output {
                Some(path) => {
                    fs::write(&path, allocated)?;
                    info!("allocation written to {}", path.display());
                }
                None => print!("{allocated}"),
            }
            eprintln!(
                "{} allocated, {} without a slot, {} rejected",
                summary.allocated, summary.unallocated, summary.rejected
            );
            for (slot, seats) in summary.remaining {
                eprintln!("{slot}: {seats} seat(s) left");
            }
        }
    }
    Ok(())
}
