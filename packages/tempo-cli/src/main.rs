mod scenarios;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scenarios::{ScenarioName, ScenarioReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Replay deterministic microtask/timer ordering scenarios", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario, or all of them
    Run {
        #[arg(long, value_enum)]
        scenario: Option<ScenarioName>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the available scenarios
    List,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &ScenarioReport) {
    println!("== {}", report.name);
    for event in &report.trace {
        println!("[{:>6}] {}", event.tick, event.message);
    }
    for inspected in &report.futures {
        println!("{}: {}", inspected.label, inspected.state);
    }
    for diagnostic in &report.diagnostics {
        println!("{}", diagnostic);
    }
    println!(
        "-- {} microtasks, {} timers, idle at tick {}",
        report.microtasks, report.timers, report.final_tick
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run { scenario, json } => {
            let names = match scenario {
                Some(name) => vec![*name],
                None => ScenarioName::ALL.to_vec(),
            };

            let mut reports = Vec::with_capacity(names.len());
            for name in names {
                reports.push(scenarios::run(name)?);
            }

            if *json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report);
                    println!();
                }
            }
        }
        Commands::List => {
            for name in ScenarioName::ALL {
                println!("{}", name.as_str());
            }
        }
    }

    Ok(())
}
