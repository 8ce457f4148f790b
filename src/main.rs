#![forbid(unsafe_code)]
mod cli;

use clap::Parser;
use cli::Cli;
use color_eyre::eyre;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use uploadflow::model::summary::UploadSummary;
use uploadflow::model::upload_file::UploadFile;
use uploadflow::model::upload_id::UploadId;
use uploadflow::model::upload_snapshot::UploadDetails;
use uploadflow::services::simulated_gateway::SimulatedGateway;
use uploadflow::services::upload_history::UploadHistory;
use uploadflow::services::upload_orchestrator::UploadOrchestrator;
use uploadflow::settings::uploader_config::load_config;
use uploadflow::utils::{
    format_bytes, format_duration, format_progress_bar, get_data_dir, initialize_logging,
    initialize_panic_handler,
};

const PROGRESS_BAR_WIDTH: usize = 20;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    initialize_logging()?;
    initialize_panic_handler()?;
    let args = Cli::parse();
    let config = load_config(args.config.clone())?;

    let mut files = Vec::new();
    for path in &args.files {
        match UploadFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(e) => eprintln!("Skipping {}: {}", path.display(), e),
        }
    }
    if files.is_empty() {
        return Err(eyre::eyre!("Nothing to upload"));
    }

    let gateway = Arc::new(SimulatedGateway::new(config.simulation.clone()));
    let orchestrator = UploadOrchestrator::new(gateway, config);
    let started = Instant::now();

    orchestrator.submit(files);
    if !orchestrator.config().auto_start {
        orchestrator.start_all();
    }
    let printer = tokio::spawn(print_summaries(orchestrator.summary_updates()));

    let mut interrupted = run_until_settled(&orchestrator).await;
    if !interrupted && !args.no_auto_retry && orchestrator.summary().has_failed_uploads() {
        let failed: Vec<UploadId> = orchestrator
            .all_details()
            .into_iter()
            .filter(|details| details.state.is_failed())
            .map(|details| details.id)
            .collect();
        println!("Retrying {} failed uploads", failed.len());
        if args.retry_step {
            for id in &failed {
                orchestrator.retry_step(id);
            }
        } else {
            orchestrator.retry_all();
        }
        interrupted = run_until_settled(&orchestrator).await;
    }
    printer.abort();

    print_report(&orchestrator.all_details(), started.elapsed());

    if args.history {
        let history = UploadHistory::new(get_data_dir());
        history.save(&orchestrator.snapshots()).await?;
        println!("History saved to {}", history.path().display());
    }

    orchestrator.shutdown();
    if interrupted {
        tracing::info!("exited per user request");
    }
    Ok(())
}

/// Wait for every upload to settle. Returns true if interrupted by the user,
/// in which case all in-flight uploads were cancelled.
async fn run_until_settled(orchestrator: &UploadOrchestrator) -> bool {
    tokio::select! {
        _ = orchestrator.wait_until_settled() => false,
        _ = tokio::signal::ctrl_c() => {
            let cancelled = orchestrator.cancel_all();
            eprintln!("Interrupted, cancelled {} uploads", cancelled);
            true
        }
    }
}

async fn print_summaries(mut updates: WatchStream<UploadSummary>) {
    while let Some(summary) = updates.next().await {
        println!(
            "{} {:>3.0}%  {} uploading, {} done, {} failed, {} cancelled",
            format_progress_bar(summary.finished_percentage(), PROGRESS_BAR_WIDTH),
            summary.finished_percentage(),
            summary.uploading,
            summary.success,
            summary.failure,
            summary.cancelled
        );
    }
}

fn print_report(uploads: &[UploadDetails], elapsed: Duration) {
    println!();
    for upload in uploads {
        let outcome = match (&upload.result, &upload.error) {
            (Some(result), _) => result.receipt.url.clone(),
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        };
        println!(
            "{:<32} {:>10}  {:<20} {}",
            upload.name,
            format_bytes(upload.size_bytes),
            upload.state.to_string(),
            outcome
        );
    }
    println!("\nFinished in {}", format_duration(elapsed.as_secs()));
}
