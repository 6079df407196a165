use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use prometheus::Registry;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use blockvault_core::config::BucketConfig;
use blockvault_core::observability::{BlockMetrics, encode_text};
use blockvault_core::ports::{Bucket, SystemClock};
use blockvault_core::{BlockId, Context, app};

/// Upload, delete, mark and inspect blocks in an object store.
#[derive(Debug, Parser)]
#[command(name = "blockvault", version)]
struct Cli {
    /// Path to a YAML bucket configuration file.
    #[arg(long = "objstore.config-file", global = true, conflicts_with = "objstore_config")]
    objstore_config_file: Option<PathBuf>,

    /// Inline YAML bucket configuration.
    #[arg(long = "objstore.config", global = true)]
    objstore_config: Option<String>,

    /// Give up after this many seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Print the metrics registry to stdout before exiting.
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a local block directory (its name must be the block id).
    Upload { dir: PathBuf },
    /// Delete every object of a block except its audit copy.
    Delete { id: BlockId },
    /// Mark a block for deletion.
    Mark { id: BlockId },
    /// Download a block into DST.
    Download { id: BlockId, dst: PathBuf },
    /// List complete blocks.
    Ls,
}

impl Cli {
    fn bucket_config(&self) -> anyhow::Result<BucketConfig> {
        match (&self.objstore_config_file, &self.objstore_config) {
            (Some(path), _) => BucketConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display())),
            (None, Some(yaml)) => BucketConfig::from_yaml(yaml).context("parsing --objstore.config"),
            (None, None) => bail!("one of --objstore.config-file or --objstore.config is required"),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(
    ctx: &Context,
    bucket: &dyn Bucket,
    metrics: &BlockMetrics,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Upload { dir } => {
            app::upload(ctx, bucket, &dir).await?;
            metrics.uploaded.inc();
        }
        Command::Delete { id } => {
            app::delete(ctx, bucket, id).await?;
            metrics.deleted.inc();
        }
        Command::Mark { id } => {
            app::mark_for_deletion(ctx, bucket, &SystemClock, id, &metrics.marked_for_deletion)
                .await?;
        }
        Command::Download { id, dst } => {
            app::download(ctx, bucket, id, &dst).await?;
        }
        Command::Ls => {
            for id in app::list_complete_blocks(ctx, bucket).await? {
                match app::read_deletion_mark(ctx, bucket, id).await? {
                    Some(mark) => println!("{id}\tmarked-for-deletion={}", mark.deletion_time),
                    None => println!("{id}"),
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let bucket = cli.bucket_config()?.build()?;

    let root = Context::background();
    let ctx = match cli.timeout {
        Some(secs) => root.with_timeout(Duration::from_secs(secs)),
        None => root.child(),
    };

    // Ctrl-C で実行中の操作を打ち切る
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let registry = Registry::new();
    let metrics = BlockMetrics::register(&registry)?;

    let command = format!("{:?}", cli.command);
    run(&ctx, bucket.as_ref(), &metrics, cli.command).await?;
    info!(%command, "done");

    if cli.print_metrics {
        print!("{}", encode_text(&registry)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_download_with_inline_config() {
        let id = BlockId::from_parts(1, 0).to_string();
        let cli = Cli::try_parse_from([
            "blockvault",
            "--objstore.config",
            "type: IN_MEMORY",
            "download",
            id.as_str(),
            "/tmp/out",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Download { .. }));
        assert!(cli.bucket_config().is_ok());
    }

    #[test]
    fn rejects_invalid_block_id() {
        assert!(Cli::try_parse_from(["blockvault", "mark", "not-an-id"]).is_err());
    }

    #[test]
    fn requires_bucket_config() {
        let cli = Cli::try_parse_from(["blockvault", "ls"]).unwrap();
        assert!(cli.bucket_config().is_err());
    }

    #[tokio::test]
    async fn mark_command_counts_once() {
        let bucket = BucketConfig::in_memory().build().unwrap();
        let registry = Registry::new();
        let metrics = BlockMetrics::register(&registry).unwrap();
        let id = BlockId::from_parts(1, 0);

        for _ in 0..2 {
            run(&Context::background(), bucket.as_ref(), &metrics, Command::Mark { id })
                .await
                .unwrap();
        }
        assert_eq!(metrics.marked_for_deletion.get(), 1);
    }
}
