use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::{
    api::{CounterApi, HttpApi},
    compress::CompressionOptions,
    engine::{Command, SessionEvent, Source, SyncEngine},
    gallery::GalleryController,
    grid::{EggGrid, hidden},
    thresholds::ThresholdEvent,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader, stdin},
    sync::mpsc,
};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "EGGS_SERVER", default_value = "http://localhost:1111")]
    server: String,

    /// Counter poll interval in milliseconds
    #[arg(long, default_value_t = 1500)]
    poll_ms: u64,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print the current egg count
    Count,
    /// Overwrite the egg count
    Set { count: u64 },
    /// Live counter, `+` and `-` change it, `x <n>` takes egg n, `q` quits
    Watch,
    /// List gallery images
    Gallery,
    Upload {
        path: PathBuf,
        #[arg(long, default_value = "")]
        caption: String,
    },
    Caption { id: String, text: String },
    Delete { id: String },
    /// Save every gallery image into a directory
    Download { dir: PathBuf },
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Loaded { count, threshold } => {
            print_carton(*count);
            print_threshold(threshold.as_ref());
        }
        SessionEvent::Changed {
            count,
            source,
            threshold,
            state,
            ..
        } => {
            if *source == Source::Server {
                println!("Updated from another device");
            }
            print_carton(*count);
            println!("[{state}]");
            print_threshold(threshold.as_ref());
        }
        SessionEvent::SaveFailed { count } => {
            println!("(offline: {count} was not saved)");
        }
        SessionEvent::Saved { .. } | SessionEvent::Healed { .. } => {}
    }
}

fn print_carton(count: u64) {
    print!("{}", EggGrid::with_count(count));
    match hidden(count) {
        0 => println!("{count} eggs"),
        more => println!("{count} eggs ({more} not shown)"),
    }
}

fn print_threshold(threshold: Option<&ThresholdEvent>) {
    if let Some(ThresholdEvent::Show(message)) = threshold {
        println!(">> {message}");
    }
}

async fn watch(api: HttpApi, poll_interval: Duration) -> Result<()> {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();

    let engine = SyncEngine::new(Arc::new(api), poll_interval, event_tx);
    let session = tokio::spawn(engine.run(command_rx));

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.split_whitespace().collect::<Vec<_>>()[..] {
            ["+"] => Command::Increase,
            ["-"] => Command::Decrease,
            ["x", index] => match index.parse() {
                Ok(index) => Command::RemoveAt(index),
                Err(_) => continue,
            },
            ["q"] => Command::Shutdown,
            _ => continue,
        };

        let done = command == Command::Shutdown;
        command_tx.send(command)?;
        if done {
            break;
        }
    }
    drop(command_tx);

    let session = session.await?;
    println!("Final count: {}", session.count());
    if session.is_degraded() {
        println!("Last save failed, the server may be behind");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let api = HttpApi::new(&args.server);

    match args.command {
        Action::Count => println!("{}", api.fetch_count().await?),
        Action::Set { count } => println!("{}", api.save_count(count).await?),
        Action::Watch => watch(api, Duration::from_millis(args.poll_ms)).await?,
        Action::Gallery => {
            let mut gallery = GalleryController::new(Arc::new(api), CompressionOptions::default());
            print!("{}", gallery.load().await);
        }
        Action::Upload { path, caption } => {
            let mut gallery = GalleryController::new(Arc::new(api), CompressionOptions::default());
            let result = gallery.upload(&path, &caption).await;

            if let Some(status) = gallery.status() {
                println!("{status}");
            }
            let image = result?;
            println!("{} {}", image.id, image.url);
        }
        Action::Caption { id, text } => {
            let mut gallery = GalleryController::new(Arc::new(api), CompressionOptions::default());
            let result = gallery.edit_caption(&id, &text).await;

            if let Some(status) = gallery.status() {
                println!("{status}");
            }
            result?;
        }
        Action::Delete { id } => {
            let mut gallery = GalleryController::new(Arc::new(api), CompressionOptions::default());
            gallery.load().await;
            let result = gallery.delete(&id).await;

            if let Some(status) = gallery.status() {
                println!("{status}");
            }
            result?;
        }
        Action::Download { dir } => {
            let mut gallery = GalleryController::new(Arc::new(api), CompressionOptions::default());
            gallery.load().await;

            let saved = gallery.download_all(&dir).await?;
            println!("Saved {} images to {}", saved.len(), dir.display());
        }
    }

    Ok(())
}
