use std::path::PathBuf;

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use chrono::Local;
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::{info, LevelFilter};

mod backup_command;
mod blob_store;
mod config;
mod datetime;
mod error;
mod lastfm;
mod play_record;
mod secrets;
mod sink;
mod time_entry;
mod toggl;
mod window;

use backup_command::BackupCommand;
use blob_store::S3BlobStore;
use config::BackupConfig;
use lastfm::LastFmClient;
use secrets::SecretsManagerProvider;
use sink::RecordSink;
use toggl::TogglClient;
use window::{parse_event, TimeWindow};

/// Last.fmの再生履歴とTogglのtime entryをS3にバックアップする。
///
/// 期間を指定しない場合は前月1ヶ月分をバックアップする。
///
/// # Examples
/// ```
/// $ cargo run -- --event '{"start": 1704067200, "end": 1706745599}'
/// $ cargo run -- --start 1704067200 --end 1706745599
/// $ cargo run
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'c',
        long = "config",
        env = "BACKUP_CONFIG",
        help = "Path to the JSON config file",
        parse(from_os_str)
    )]
    config: Option<PathBuf>,

    #[clap(
        long = "event",
        help = "Invocation event as JSON: {\"start\": <unix>, \"end\": <unix>}",
        parse(try_from_str = parse_event),
        conflicts_with_all = &["start", "end"],
    )]
    event: Option<TimeWindow>,

    #[clap(long = "start", help = "Start of the window in UTC unix seconds", requires = "end")]
    start: Option<i64>,

    #[clap(long = "end", help = "End of the window in UTC unix seconds", requires = "start")]
    end: Option<i64>,

    #[clap(short = 'v', long = "verbose", help = "Enable debug logging")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    setup_logger(level).context("Failed to set up logger")?;

    let config = BackupConfig::load(args.config.as_deref())?;
    let window = match (args.event, args.start, args.end) {
        (Some(window), _, _) => window,
        (None, Some(start), Some(end)) => {
            TimeWindow::new(start, end).context("Invalid --start and --end")?
        }
        _ => TimeWindow::last_month(datetime::now())
            .context("Failed to compute last month's window")?,
    };

    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    let aws_config = loader.load().await;

    let secrets = SecretsManagerProvider::new(
        aws_sdk_secretsmanager::Client::new(&aws_config),
        &config.secret_id,
    );
    let lastfm_client = LastFmClient::new(secrets.clone(), &config.username, config.max_pages)
        .context("Failed to new last fm client")?;
    let toggl_client =
        TogglClient::new(secrets, config.workspace_id).context("Failed to new toggl client")?;
    let sink = RecordSink::new(S3BlobStore::new(aws_sdk_s3::Client::new(&aws_config)));

    let command = BackupCommand::new(&lastfm_client, &toggl_client, &sink, &config.bucket_name);
    let summary = command.run(window).await?;

    for receipt in [&summary.lastfm, &summary.toggl] {
        info!(
            "s3://{}/{}: {} records, {} bytes (HTTP {})",
            receipt.bucket,
            receipt.key,
            receipt.record_count,
            receipt.compressed_bytes,
            receipt.status
        );
    }

    Ok(())
}

/// ログの出力先と書式を設定する。
fn setup_logger(level: LevelFilter) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("aws_config", LevelFilter::Warn)
        .level_for("aws_smithy_runtime", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()?;

    Ok(())
}
