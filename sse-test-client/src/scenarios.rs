use crate::output::{print_event, TestResult};
use crate::sse_client::{Connection, Event};
use anyhow::Result;
use colored::*;
use std::time::{Duration, Instant};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the echo stream and check that every configured message comes back
/// with the `echoThis` suffix, in order.
pub async fn test_echo(base_url: &str, messages: &[String], verbose: bool) -> Result<TestResult> {
    let start = Instant::now();
    let url = format!("{}/es/hello?echoThis=yo", base_url.trim_end_matches('/'));
    println!("\n{} Testing echo stream: {}", "→".blue(), url);

    let expected: Vec<String> = messages.iter().map(|m| format!("{m} yo")).collect();
    let mut connection = Connection::establish(&url, "echo".to_string())?;

    Ok(finish(
        "echo",
        collect(&mut connection, &expected, verbose).await,
        start,
    ))
}

/// Open a ticker stream limited to three ticks and check the counter.
pub async fn test_ticker(base_url: &str, verbose: bool) -> Result<TestResult> {
    let start = Instant::now();
    let url = format!("{}/ticker/demo?limit=3", base_url.trim_end_matches('/'));
    println!("\n{} Testing ticker stream: {}", "→".blue(), url);

    let expected: Vec<String> = (1..=3).map(|n| format!("tick {n}")).collect();
    let mut connection = Connection::establish(&url, "ticker".to_string())?;

    Ok(finish(
        "ticker",
        collect(&mut connection, &expected, verbose).await,
        start,
    ))
}

async fn collect(
    connection: &mut Connection,
    expected: &[String],
    verbose: bool,
) -> Result<Option<String>> {
    let events: Vec<Event> = connection
        .wait_for_events(expected.len(), EVENT_TIMEOUT)
        .await?;

    if verbose {
        for event in &events {
            print_event(&connection.label, event);
        }
    }

    let received: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
    if received == expected {
        Ok(None)
    } else {
        Ok(Some(format!(
            "Expected {:?} from {}, got {:?}",
            expected, connection.url, received
        )))
    }
}

fn finish(scenario: &str, outcome: Result<Option<String>>, start: Instant) -> TestResult {
    let (passed, message) = match outcome {
        Ok(None) => {
            println!("{} {} received the expected events", "✓".green(), scenario);
            (true, None)
        }
        Ok(Some(mismatch)) => {
            println!("{} {}", "✗".red(), mismatch);
            (false, Some(mismatch))
        }
        Err(e) => {
            println!("{} {} failed: {}", "✗".red(), scenario, e);
            (false, Some(e.to_string()))
        }
    };

    TestResult {
        scenario: scenario.to_string(),
        passed,
        message,
        duration: start.elapsed(),
    }
}
