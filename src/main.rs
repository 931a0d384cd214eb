mod cli;
mod config;
mod logging;
mod render;

use crate::cli::{Args, Command};
use crate::config::Settings;
use crate::render::{print_result, TerminalRenderer};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use stream_core::recording::{APIRecorder, PlaybackState};
use stream_core::think::{split_think_segment, visible_body};
use stream_core::{
    run_pipeline, DeltaAggregator, DrawingRequest, GenerationClient, PipelineOptions,
    PlaybackChunkStream, PlaybackTiming, StreamOutcome, StreamSlot,
};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::setup_logging(args.verbose, args.log_file.as_deref())?;
    run(args).await
}

/// Dispatch a subcommand; settings are only loaded by the commands that use them
async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Generate {
            prompt,
            quantity,
            ratio,
            model,
            base_url,
            record,
        } => {
            let settings = load_settings(args.config.as_deref())?;
            let request = DrawingRequest {
                model: model.unwrap_or(settings.model.clone()),
                prompt,
                quantity: quantity.unwrap_or(settings.quantity),
                ratio: ratio.unwrap_or(settings.ratio.clone()),
            };
            run_generate(&settings, request, base_url, record).await
        }
        Command::Replay {
            file,
            chunk_size,
            realtime,
            quantity,
        } => {
            let settings = load_settings(args.config.as_deref())?;
            let quantity = quantity.unwrap_or(settings.quantity);
            run_replay(&settings, &file, chunk_size, realtime, quantity).await
        }
        Command::Split { file } => run_split(file),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = Settings::load(path)?;
    debug!(
        "Effective settings: base_url={}, model={}",
        settings.base_url, settings.model
    );
    Ok(settings)
}

/// Cancel the active stream of `slot` on Ctrl-C
fn cancel_on_ctrl_c(slot: &StreamSlot) {
    let slot = slot.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && slot.cancel() {
            info!("Cancelling active stream");
        }
    });
}

fn report(outcome: StreamOutcome) {
    match outcome {
        StreamOutcome::Completed(result) => print_result(&result),
        StreamOutcome::Cancelled => eprintln!("\nCancelled."),
    }
}

async fn run_generate(
    settings: &Settings,
    request: DrawingRequest,
    base_url: Option<String>,
    record: Option<PathBuf>,
) -> Result<()> {
    let mut client = GenerationClient::new(base_url.unwrap_or(settings.base_url.clone()))
        .with_api_key(settings.api_key.clone())
        .with_auth_scheme(settings.auth_scheme.clone())
        .with_max_images(settings.max_images);
    if let Some(path) = record {
        info!("Recording response stream to {}", path.display());
        client = client.with_recorder(APIRecorder::new(path));
    }

    let slot = StreamSlot::new();
    cancel_on_ctrl_c(&slot);

    let renderer = TerminalRenderer::new();
    let callback = renderer.callback();
    let outcome = client.draw(&request, &slot, Some(&callback)).await?;
    report(outcome);
    Ok(())
}

async fn run_replay(
    settings: &Settings,
    file: &Path,
    chunk_size: Option<usize>,
    realtime: bool,
    quantity: usize,
) -> Result<()> {
    let playback = PlaybackState::from_file(file)
        .with_context(|| format!("Failed to load recording: {}", file.display()))?;
    if playback.session_count() == 0 {
        anyhow::bail!("Recording file contains no sessions");
    }

    let slot = StreamSlot::new();
    cancel_on_ctrl_c(&slot);

    while let Some(session) = playback.next_session() {
        info!("Replaying session recorded at {}", session.timestamp);
        let timing = if realtime {
            PlaybackTiming::Recorded
        } else {
            PlaybackTiming::Immediate
        };
        let mut source = PlaybackChunkStream::new(session.chunks, timing);
        if let Some(size) = chunk_size {
            if realtime {
                warn!("Re-chunking drops the recorded timing");
            }
            source = source.rechunked(size);
        }

        let renderer = TerminalRenderer::new();
        let callback = renderer.callback();
        let aggregator = DeltaAggregator::new(settings.max_images).with_callback(&callback);

        let ticket = slot.begin();
        let outcome = run_pipeline(
            &mut source,
            aggregator,
            ticket.token(),
            PipelineOptions {
                quantity,
                recorder: None,
            },
        )
        .await;
        slot.release(&ticket);

        let outcome = outcome?;
        let cancelled = outcome.is_cancelled();
        report(outcome);
        if cancelled {
            break;
        }
    }
    Ok(())
}

fn run_split(file: Option<PathBuf>) -> Result<()> {
    let content = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read message: {}", path.display()))?,
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read message from stdin")?;
            content
        }
    };

    if let Some(segment) = split_think_segment(&content) {
        let status = if segment.is_complete {
            "complete"
        } else {
            "incomplete"
        };
        println!("Thinking ({status}):\n{}\n", segment.think_content);
    }
    println!("Body:\n{}", visible_body(&content).trim());
    Ok(())
}
