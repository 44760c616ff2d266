//! Developer tool: run one live sentiment analysis and print the result as JSON
//!
//! Run with: cargo run --bin analyze_symbol -- TSLA [max_retries]
//! List models: cargo run --bin analyze_symbol -- --models

use anyhow::{Context, Result};
use sentiment_lib::ai::{available_models, normalize_symbol};
use sentiment_lib::{ErrorPayload, SentimentAnalyzer, SentimentConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let mut args = std::env::args().skip(1).peekable();
    if args.peek().map(String::as_str) == Some("--models") {
        println!("=== Available Models ===");
        println!("{}", serde_json::to_string_pretty(&available_models())?);
        return Ok(());
    }

    let symbol = normalize_symbol(&args.next().unwrap_or_else(|| "TSLA".to_string()));
    let max_retries: u32 = match args.next() {
        Some(n) => n.parse().context("max_retries must be a number")?,
        None => 0,
    };

    let config = SentimentConfig::from_env().context("configuration error")?;
    let analyzer = SentimentAnalyzer::from_config(&config).context("failed to set up the AI client")?;

    println!("=== Sentiment Analysis ===");
    println!("Symbol: {}", symbol);
    println!("Model:  {}\n", analyzer.model());

    match analyzer.analyze_with_retry(&symbol, max_retries).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!(
                "\nPositive {:.1}% | Negative {:.1}% | Neutral {:.1}%",
                report.positive_percent(),
                report.negative_percent(),
                report.neutral_percent()
            );
        }
        Err(e) => {
            let label = if e.is_validation_notice() { "Validation Failed" } else { "Error" };
            println!("{}: {}", label, e);
            println!("{}", serde_json::to_string_pretty(&ErrorPayload::from(&e))?);
            std::process::exit(1);
        }
    }

    Ok(())
}
