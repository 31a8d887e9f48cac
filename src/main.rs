//! CLI entry point for vaultfetch.

use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info, warn};
use vaultfetch_core::api::DEFAULT_MAX_RETRIES;
use vaultfetch_core::{
    Document, DocumentStatus, MaterializeOutcome, Materializer, RetryPolicy, SyncOptions,
    VaultSession, load_config, sync_provider,
};

mod cli;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = load_config(args.config.as_deref())?;
    let vault_config = file_config.vault_config()?;
    debug!(config = ?vault_config, "session configuration resolved");

    // CLI > config file > default
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| file_config.output_dir.clone())
        .unwrap_or_else(std::env::temp_dir);
    let max_path_len = args
        .max_path_len
        .map(usize::from)
        .or(file_config.max_path_len)
        .unwrap_or(vaultfetch_core::materialize::DEFAULT_MAX_PATH_LEN);
    let max_retries = args
        .max_retries
        .map(u32::from)
        .or(file_config.max_retries)
        .unwrap_or(DEFAULT_MAX_RETRIES);

    let options = SyncOptions {
        folder_root: file_config
            .folder_root
            .clone()
            .unwrap_or_else(|| SyncOptions::default().folder_root),
        keep_going: args.keep_going,
        list_only: args.list_only,
    };

    info!(
        provider = %args.provider_id,
        output_dir = %output_dir.display(),
        "vaultfetch starting"
    );

    let session = VaultSession::login(vault_config)
        .await
        .context("Login failed")?
        .with_retry_policy(RetryPolicy::with_max_retries(max_retries));

    let materializer = Materializer::new(output_dir).with_max_path_len(max_path_len);

    let show_progress = !args.quiet && !args.json && io::stderr().is_terminal();
    let progress = progress::DocumentProgress::new(show_progress);
    let mut stdout = io::stdout().lock();
    let mut output_error = None;

    let result = sync_provider(
        &session,
        &materializer,
        &args.provider_id,
        &options,
        |doc, status| {
            progress.document_done(&doc.filename);
            let written = if args.json {
                write_json_line(&mut stdout, doc, status)
            } else if args.list_only {
                progress.suspend(|| write_listing(&mut stdout, doc))
            } else {
                Ok(())
            };
            if let Err(e) = written {
                output_error.get_or_insert(e);
            }
        },
    )
    .await;
    progress.finish();

    if let Some(e) = output_error {
        return Err(e).context("Failed to write to stdout");
    }
    let stats = result?;

    info!(
        found = stats.found,
        written = stats.written,
        replaced = stats.replaced,
        skipped = stats.skipped,
        no_content = stats.no_content,
        failed = stats.failed,
        "Mirror complete"
    );

    if stats.failed > 0 {
        warn!(failed = stats.failed, "some documents were not mirrored");
        bail!("{} of {} documents failed", stats.failed, stats.found);
    }

    Ok(())
}

#[derive(Serialize)]
struct DocumentLine<'a> {
    #[serde(flatten)]
    document: &'a Document,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> DocumentLine<'a> {
    fn new(document: &'a Document, status: &'a DocumentStatus) -> Self {
        let mut line = Self {
            document,
            status: "listed",
            path: None,
            bytes: None,
            error: None,
        };
        match status {
            DocumentStatus::Listed => {}
            DocumentStatus::Failed(message) => {
                line.status = "failed";
                line.error = Some(message.as_str());
            }
            DocumentStatus::Done(MaterializeOutcome::NoContent) => line.status = "no_content",
            DocumentStatus::Done(MaterializeOutcome::Skipped { path }) => {
                line.status = "skipped";
                line.path = Some(path.display().to_string());
            }
            DocumentStatus::Done(MaterializeOutcome::Written {
                path,
                bytes,
                replaced,
            }) => {
                line.status = if *replaced { "replaced" } else { "written" };
                line.path = Some(path.display().to_string());
                line.bytes = Some(*bytes);
            }
        }
        line
    }
}

fn write_json_line(out: &mut impl Write, doc: &Document, status: &DocumentStatus) -> Result<()> {
    serde_json::to_writer(&mut *out, &DocumentLine::new(doc, status))?;
    writeln!(out)?;
    Ok(())
}

/// Tab-separated: revision id, revision label, size, modified, remote path.
fn write_listing(out: &mut impl Write, doc: &Document) -> Result<()> {
    writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}/{}",
        doc.id,
        doc.revision,
        doc.file_size,
        doc.modify_date.to_rfc3339(),
        doc.folder_path.trim_end_matches('/'),
        doc.filename
    )?;
    Ok(())
}
