//! Notification Relay 命令行

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use notification_relay::pipeline::DEFAULT_CAPTURE_CAPACITY;
use notification_relay::{
    replay_feed, CommandServer, ConfigStore, FileConfigStore, FixedVolume, InvocationLog, LineSink, Pipeline,
};

#[derive(Parser)]
#[command(name = "nrelay")]
#[command(about = "Relay captured notifications and media sessions to a consumer over stdio")]
#[command(version)]
struct Cli {
    /// 配置文件（默认：~/.config/notification-relay/config.json）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 在 stdin/stdout 上提供 JSON-RPC 命令服务
    Serve {
        /// 回放录制的 JSON-lines 采集数据
        #[arg(long)]
        feed: Option<PathBuf>,
        /// 采集通道容量
        #[arg(long, default_value_t = DEFAULT_CAPTURE_CAPACITY)]
        capacity: usize,
        /// 随曲目上报的音乐流音量
        #[arg(long, default_value_t = 0)]
        volume_level: u32,
        /// 音乐流最大音量
        #[arg(long, default_value_t = 0)]
        volume_max: u32,
    },
    /// 保存消费端回调句柄
    Register {
        #[arg(long)]
        callback: i64,
        #[arg(long)]
        media_callback: i64,
    },
    /// 以 JSON 打印已保存的配置
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout 承载协议，日志写到 stderr
    // 例如 RUST_LOG=debug nrelay serve
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notification_relay=info,nrelay=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let store = Arc::new(match cli.config {
        Some(path) => FileConfigStore::new(path),
        None => FileConfigStore::default(),
    });

    match cli.command {
        Commands::Serve {
            feed,
            capacity,
            volume_level,
            volume_max,
        } => serve(store, feed, capacity, FixedVolume::new(volume_level, volume_max)).await?,
        Commands::Register {
            callback,
            media_callback,
        } => {
            store.register_event_handles(callback, media_callback)?;
            println!("Handles stored in {}", store.path().display());
        }
        Commands::Config => {
            let config = store.load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn serve(store: Arc<FileConfigStore>, feed: Option<PathBuf>, capacity: usize, volume: FixedVolume) -> Result<()> {
    info!(config = %store.path().display(), capacity, "Starting relay");

    let (pipeline, worker, tx) = Pipeline::builder()
        .config(store)
        .volume(Arc::new(volume))
        .capacity(capacity)
        .build();
    let worker_task = tokio::spawn(worker.run());

    let log = InvocationLog::default();
    let feed_task = feed.map(|path| {
        let tx = tx.clone();
        let log = log.clone();
        tokio::spawn(async move {
            match replay_feed(&path, &tx, &log).await {
                Ok(posted) => info!(posted, "Capture feed replayed"),
                Err(e) => warn!(error = %e, "Capture feed failed"),
            }
        })
    });

    let server = CommandServer::new(pipeline);
    server
        .run(BufReader::new(tokio::io::stdin()), Arc::new(LineSink::stdout()))
        .await?;

    if let Some(task) = feed_task {
        task.await.context("Feed task panicked")?;
    }
    drop(tx);
    worker_task.await.context("Capture worker panicked")?;
    info!(invocations = log.entries().len(), "Relay stopped");
    Ok(())
}
