use clap::Parser;
use kbalance_cli::{Args, run, summarize};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging via tracing-subscriber; RUST_LOG overrides the -v level
    kbalance::telemetry::init(args.verbose);

    match run(&args).await {
        Ok(outcome) => {
            tracing::info!("{}", summarize(&outcome));
        }
        Err(e) => {
            tracing::error!("{e}");
            if e.is_retryable_by_repoll() {
                tracing::warn!("The reassignment may still be running; check again before retrying");
            }
            std::process::exit(e.exit_code());
        }
    }
}
