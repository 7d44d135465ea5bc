//! score-runner: headless analysis runner for the ShopLens engine.
//!
//! Usage:
//!   score-runner --seed 12345 --customers 200 --transactions 5000
//!   score-runner --config analytics.json --json report.json

use anyhow::Result;
use shoplens_core::{
    churn::labels_from_history,
    config::AnalyticsConfig,
    engine::AnalyticsEngine,
    sample,
};
use chrono::Duration;
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let customers = parse_arg(&args, "--customers", 200usize);
    let products = parse_arg(&args, "--products", 60usize);
    let transactions = parse_arg(&args, "--transactions", 5000usize);
    let json_out = args
        .windows(2)
        .find(|w| w[0] == "--json")
        .map(|w| w[1].clone());

    let config = match args.windows(2).find(|w| w[0] == "--config") {
        Some(w) => AnalyticsConfig::from_json_file(&w[1])?,
        None => AnalyticsConfig::default(),
    };

    println!("ShopLens — score-runner");
    println!("  seed:         {seed}");
    println!("  customers:    {customers}");
    println!("  transactions: {transactions}");
    println!();

    let dataset = sample::generate(seed, customers, products, transactions);

    // Labels come from replaying a snapshot one churn-horizon before the
    // as-of date against the rest of the history.
    let snapshot = dataset.as_of - Duration::days(config.churn.threshold_days);
    let labels = labels_from_history(
        &dataset.transactions,
        snapshot,
        config.churn.threshold_days,
    );
    log::info!("runner: built {} churn labels at snapshot {snapshot}", labels.len());

    let engine = AnalyticsEngine::new(config);
    let report = engine.run(&dataset.transactions, dataset.as_of, &labels)?;

    let insights = &report.insights;
    println!("Run complete — as of {}", report.as_of);
    println!("  customers scored:   {}", insights.total_customers);
    println!("  skipped:            {}", report.skipped.len());
    println!("  total revenue:      ${:.2}", insights.total_revenue);
    println!("  avg customer value: ${:.2}", insights.avg_customer_value);
    println!("  avg order value:    ${:.2}", insights.avg_order_value);
    println!();

    println!("Segments:");
    for (segment, count) in &insights.segment_breakdown {
        println!("  {segment:<12} {count}");
    }
    println!();

    println!("Churn risk tiers ({} degraded):", insights.degraded_scores);
    for (tier, count) in &insights.tier_breakdown {
        println!("  {tier:<12} {count}");
    }
    println!();

    println!("Retention:");
    for point in &report.retention {
        match point.retention_rate {
            Some(rate) => println!(
                "  {}  active={:<5} retention={rate:.1}%",
                point.period, point.active_customers
            ),
            None => println!(
                "  {}  active={:<5} retention=n/a",
                point.period, point.active_customers
            ),
        }
    }

    if let Some(path) = json_out {
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("\nFull report written to {path}");
    }

    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
