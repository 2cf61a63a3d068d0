use anyhow::Context;
use probe_http::{RequestConfig, RequestExecutor};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,probe_http=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let url = std::env::args()
        .nth(1)
        .context("usage: probe <url>")?;
    let executor = RequestExecutor::from_env()?;

    let (response, report) = executor
        .execute_with_report(&url, RequestConfig::new())
        .await?;

    println!("status: {}", response.status());
    for record in &report.attempts {
        println!(
            "attempt {}: {:?} in {} ms",
            record.attempt,
            record.classification,
            record.elapsed.as_millis()
        );
    }
    println!(
        "total: {} ms ({} retries, {} ms waiting)",
        report.elapsed.as_millis(),
        report.retries(),
        report.waited().as_millis()
    );

    Ok(())
}
