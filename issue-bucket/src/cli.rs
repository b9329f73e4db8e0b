//! # issue-bucket CLI interface
//!
//! Command parsing and orchestration for the `issue-bucket` binary. Every
//! subcommand reads the same YAML config (see [`crate::load_config`]), builds
//! the connectors it needs and hands off to `issue-bucket-core`; nothing here
//! contains bucket or pipeline logic of its own.
//!
//! Call [`run`] with a constructed [`Cli`] for programmatic or test use.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use issue_bucket_core::bucket::{folders_with_multiple_files, Bucket, ListOptions, TransferOptions};
use issue_bucket_core::extract::extract_issues;
use issue_bucket_core::files::FileConnector;
use issue_bucket_core::query::{QueryRunner, QueryState};
use issue_bucket_core::tracker::JiraClient;

use crate::athena::AthenaService;
use crate::load_config::{load_config, AppConfig};
use crate::s3::S3Store;

/// CLI for issue-bucket: land tracker issues in an S3 data lake and manage its key space.
#[derive(Parser)]
#[clap(
    name = "issue-bucket",
    version,
    about = "Extract Jira issues into S3 and manage bucket folders, listings and queries"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search the tracker, write the issues to CSV and upload the file
    Extract {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// List the keys under a prefix
    List {
        #[clap(long)]
        config: PathBuf,
        prefix: String,
        /// Only keys ending in this string
        #[clap(long)]
        suffix: Option<String>,
        /// Stop after this many keys (a single request when at most 1000)
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Per-folder file counts and sizes for keys ending in an extension
    Stats {
        #[clap(long)]
        config: PathBuf,
        prefix: String,
        extension: String,
    },
    /// Immediate child folders of a prefix
    Subfolders {
        #[clap(long)]
        config: PathBuf,
        prefix: String,
    },
    /// Copy (or move) every key under a folder into another folder
    Copy {
        #[clap(long)]
        config: PathBuf,
        source: String,
        destination: String,
        #[clap(long)]
        destination_bucket: Option<String>,
        #[clap(long)]
        suffix: Option<String>,
        /// Remove the source folder after copying
        #[clap(long)]
        delete_source: bool,
    },
    /// Delete every key in a folder
    Delete {
        #[clap(long)]
        config: PathBuf,
        prefix: String,
    },
    /// Run a SQL script on the query service
    Query {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        script: PathBuf,
        #[clap(long)]
        database: String,
        /// Output location for query results, e.g. s3://bucket/prefix/
        #[clap(long)]
        output: String,
        /// Poll until the query finishes or times out
        #[clap(long)]
        wait: bool,
    },
}

async fn open_bucket(config: &AppConfig) -> Bucket<S3Store> {
    let store = S3Store::new(&config.connector).await;
    Bucket::new(store, config.connector.default_bucket.clone())
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Extract { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "extract", "Starting issue extraction");
            let tracker = JiraClient::new(config.tracker.clone());
            let files = FileConnector::new(&config.extract.working_dir);
            let bucket = open_bucket(&config).await;
            match extract_issues(&config.extract, &tracker, &files, &bucket).await {
                Ok(report) => {
                    tracing::info!(command = "extract", ?report, "Extraction complete");
                    println!(
                        "Extracted {} issues (run {})",
                        report.issue_count, report.run_id
                    );
                    for key in &report.listed_keys {
                        println!("{key}");
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "extract", error = %e, "Extraction failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::List {
            config,
            prefix,
            suffix,
            limit,
        } => {
            let config = load_config(config)?;
            let bucket = open_bucket(&config).await;
            let listing = bucket
                .list_keys(&prefix, &ListOptions { limit, suffix })
                .await?;
            for key in &listing.keys {
                println!("{key}");
            }
            tracing::info!(
                command = "list",
                prefix = %prefix,
                count = listing.keys.len(),
                total_size = listing.total_size,
                "Listing complete"
            );
            Ok(())
        }
        Commands::Stats {
            config,
            prefix,
            extension,
        } => {
            let config = load_config(config)?;
            let bucket = open_bucket(&config).await;
            let stats = bucket.aggregate_folder_stats(&prefix, &extension).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            tracing::info!(
                command = "stats",
                folders = stats.len(),
                multiple = ?folders_with_multiple_files(&stats),
                "Statistics complete"
            );
            Ok(())
        }
        Commands::Subfolders { config, prefix } => {
            let config = load_config(config)?;
            let bucket = open_bucket(&config).await;
            for folder in bucket.list_subfolders(&prefix).await? {
                println!("{folder}");
            }
            Ok(())
        }
        Commands::Copy {
            config,
            source,
            destination,
            destination_bucket,
            suffix,
            delete_source,
        } => {
            let config = load_config(config)?;
            let bucket = open_bucket(&config).await;
            let options = TransferOptions {
                destination_bucket,
                delete_source,
                suffix,
            };
            let copied = bucket.copy_folder(&source, &destination, &options).await?;
            tracing::info!(
                command = "copy",
                source = %source,
                destination = %destination,
                count = copied.len(),
                moved = delete_source,
                "Copy complete"
            );
            println!("Copied {} keys to {destination}", copied.len());
            Ok(())
        }
        Commands::Delete { config, prefix } => {
            let config = load_config(config)?;
            let bucket = open_bucket(&config).await;
            let deleted = bucket.delete_folder(&prefix).await?;
            println!("Deleted {deleted} keys under {prefix}");
            Ok(())
        }
        Commands::Query {
            config,
            script,
            database,
            output,
            wait,
        } => {
            let config = load_config(config)?;
            let service = AthenaService::new(&config.connector).await;
            let runner = QueryRunner::from_config(service, &config.connector);
            let outcome = runner.run_script(&script, &database, &output, wait).await?;
            println!("Execution {}: {:?}", outcome.execution_id, outcome.state);
            if let Some(results) = &outcome.results {
                println!("{}", results.columns.join(","));
                for row in &results.rows {
                    let cells: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("")).collect();
                    println!("{}", cells.join(","));
                }
            }
            match outcome.state {
                QueryState::Failed(reason) => Err(anyhow!("query {} failed: {reason}", outcome.execution_id)),
                QueryState::TimedOut => Err(anyhow!(
                    "query {} did not finish within {} seconds",
                    outcome.execution_id,
                    config.connector.query_timeout_seconds
                )),
                _ => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_copy_with_flags() {
        let cli = Cli::parse_from([
            "issue-bucket",
            "copy",
            "--config",
            "config.yaml",
            "raw/2024",
            "curated/2024",
            "--suffix",
            ".csv",
            "--delete-source",
        ]);
        match cli.command {
            Commands::Copy {
                source,
                destination,
                suffix,
                delete_source,
                destination_bucket,
                ..
            } => {
                assert_eq!(source, "raw/2024");
                assert_eq!(destination, "curated/2024");
                assert_eq!(suffix.as_deref(), Some(".csv"));
                assert!(delete_source);
                assert!(destination_bucket.is_none());
            }
            _ => panic!("expected copy command"),
        }
    }

    #[test]
    fn parses_list_limit() {
        let cli = Cli::parse_from(["issue-bucket", "list", "--config", "c.yaml", "raw/", "--limit", "10"]);
        assert!(matches!(cli.command, Commands::List { limit: Some(10), .. }));
    }
}
