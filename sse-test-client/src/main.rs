use anyhow::Result;
use clap::Parser;
use colored::*;

mod output;
mod scenarios;
mod sse_client;

use output::print_test_summary;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "EventSource push server smoke tests")]
struct Cli {
    /// Base URL of the server (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum, default_value_t = ScenarioChoice::All)]
    scenario: ScenarioChoice,

    /// Messages the server's echo route was started with
    #[arg(long, value_delimiter = ',', default_value = "a,b")]
    echo_messages: Vec<String>,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum ScenarioChoice {
    /// Echo route: configured messages with the echoThis suffix
    Echo,
    /// Ticker route: three ticks, then the server closes the stream
    Ticker,
    /// Run every scenario
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    if matches!(cli.scenario, ScenarioChoice::Echo | ScenarioChoice::All) {
        results.push(scenarios::test_echo(&cli.base_url, &cli.echo_messages, cli.verbose).await?);
    }
    if matches!(cli.scenario, ScenarioChoice::Ticker | ScenarioChoice::All) {
        results.push(scenarios::test_ticker(&cli.base_url, cli.verbose).await?);
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
