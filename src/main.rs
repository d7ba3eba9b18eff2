use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use faipart::{
    Config, Error,
    builder::{BuildRequest, IndexBuilder},
    config::{Command, StorageKind},
    executor::TokioExecutor,
    index::IndexReader,
    retry::RetryPolicy,
    storage::{LocalStorage, Storage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing; logs go to stderr so stdout stays JSON
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&config).await {
        let report = match e.downcast_ref::<Error>() {
            Some(error) => error.report(),
            None => faipart::error::ErrorReport {
                error: "InternalError",
                message: format!("{:#}", e),
            },
        };
        tracing::error!("{} failed: {}", command_name(&config.command), report.message);
        print_json(&report)?;
        std::process::exit(1);
    }

    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Build { .. } => "build",
        Command::Lookup { .. } => "lookup",
        Command::Range { .. } => "range",
        Command::Clean { .. } => "clean",
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(config).await?;
    let bucket = config.bucket.as_str();

    match &config.command {
        Command::Build {
            key,
            workers,
            index_prefix,
            allow_unresolved,
        } => {
            let builder = IndexBuilder::new(storage, TokioExecutor::new(config.concurrency))
                .with_retry(RetryPolicy::default().with_max_retries(config.max_retries))
                .allow_unresolved(*allow_unresolved);
            let summary = builder
                .build(&BuildRequest {
                    bucket: bucket.to_string(),
                    key: key.clone(),
                    partitions: *workers,
                    index_prefix: index_prefix.clone(),
                })
                .await?;
            print_json(&summary)?;
        }
        Command::Lookup {
            index,
            identifier,
            exact,
        } => {
            let reader = IndexReader::open(storage.as_ref(), bucket, index).await?;
            let info = if *exact {
                reader.lookup_exact(identifier)?
            } else {
                reader.lookup_by_identifier(identifier)?
            };
            print_json(&info)?;
        }
        Command::Range { index, min, max } => {
            let reader = IndexReader::open(storage.as_ref(), bucket, index).await?;
            print_json(&reader.lookup_by_range(*min, *max)?)?;
        }
        Command::Clean { prefix } => {
            let builder = IndexBuilder::new(storage, TokioExecutor::new(config.concurrency));
            let deleted = builder.clean(bucket, prefix).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
    }

    Ok(())
}

async fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    match config.storage {
        StorageKind::Local => {
            tracing::info!("Local storage root: {:?}", config.root);
            Ok(Arc::new(LocalStorage::new(config.root.clone())))
        }
        #[cfg(feature = "s3")]
        StorageKind::S3 => {
            let storage = faipart::storage::S3Storage::new(
                config.s3_region.clone(),
                config.s3_endpoint.clone(),
            )
            .await;
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "s3"))]
        StorageKind::S3 => anyhow::bail!("S3 storage requires the `s3` feature"),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
