//! sp_linker CLI - SharePoint links and library exports via Microsoft Graph.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use sp_linker::export::{export_library, ExportOptions, DEFAULT_PAGE_SIZE};
use sp_linker::sharepoint::{self, DEFAULT_LIBRARY_NAMES};
use sp_linker::{GraphClient, Settings};

/// CLI tool for SharePoint file links and library metadata exports.
///
/// Reads TENANT_ID, CLIENT_ID, CLIENT_SECRET and AUTH_MODE from the environment.
#[derive(Parser)]
#[command(name = "sp_linker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the web URL of a file.
    Link {
        /// SharePoint hostname, e.g. contoso.sharepoint.com.
        #[arg(long)]
        hostname: String,

        /// Site path, e.g. sites/Finance.
        #[arg(long)]
        site_path: String,

        /// File path, relative to the library root or including the library name.
        #[arg(long)]
        path: String,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the site id and its document libraries.
    SiteInfo {
        /// SharePoint hostname, e.g. contoso.sharepoint.com.
        #[arg(long)]
        hostname: String,

        /// Site path, e.g. sites/Finance.
        #[arg(long)]
        site_path: String,
    },

    /// Export documents, metadata columns and web URLs of a library to CSV.
    Export {
        /// SharePoint hostname, e.g. contoso.sharepoint.com.
        #[arg(long)]
        hostname: String,

        /// Site path, e.g. sites/Finance (or teams/Finance).
        #[arg(long)]
        site_path: String,

        /// Library name; Documents or Shared Documents when omitted.
        #[arg(long)]
        list_name: Option<String>,

        /// Comma-separated field names to include, e.g. Verified,Accounts,Region.
        #[arg(long)]
        columns: Option<String>,

        /// OData filter on fields, e.g. "fields/Region eq 'EMEA'".
        #[arg(long)]
        filter: Option<String>,

        /// Items requested per page.
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,

        /// Output CSV path.
        #[arg(long)]
        out_csv: PathBuf,
    },

    /// Show the signed-in principal.
    Whoami,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkOutput {
    site_id: String,
    drive_id: String,
    drive_name: String,
    path: String,
    web_url: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env().context("Invalid configuration")?;

    let client = GraphClient::connect(&settings)
        .await
        .context("Failed to authenticate with Microsoft Graph")?;

    match cli.command {
        Commands::Link {
            hostname,
            site_path,
            path,
            json,
        } => {
            let site_id = sharepoint::resolve_site(&client, &hostname, &site_path)
                .await
                .with_context(|| format!("Failed to resolve site {}/{}", hostname, site_path))?;
            let drives = sharepoint::list_drives(&client, &site_id)
                .await
                .context("Failed to list drives")?;
            let (drive_id, drive_name) = sharepoint::pick_default_drive(&drives)?;

            let relative = sharepoint::normalize_path(&path, &drive_name);
            let web_url = sharepoint::get_file_web_url(&client, &drive_id, &relative)
                .await
                .with_context(|| format!("Failed to look up {}", relative))?;

            if json {
                let output = LinkOutput {
                    site_id,
                    drive_id,
                    drive_name,
                    path: relative,
                    web_url,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("SharePoint link:");
                println!("{}", web_url);
            }
        }

        Commands::SiteInfo {
            hostname,
            site_path,
        } => {
            let site_id = sharepoint::resolve_site(&client, &hostname, &site_path)
                .await
                .with_context(|| format!("Failed to resolve site {}/{}", hostname, site_path))?;
            println!("Site ID: {}", site_id);

            let drives = sharepoint::list_drives(&client, &site_id)
                .await
                .context("Failed to list drives")?;
            if drives.is_empty() {
                println!("No document libraries found.");
                return Ok(());
            }

            println!("\nDocument libraries on this site:");
            for drive in &drives {
                println!(" - {}", drive);
            }

            let (drive_id, drive_name) = sharepoint::pick_default_drive(&drives)?;
            println!("\nDefault library: {} (id: {})", drive_name, drive_id);
        }

        Commands::Export {
            hostname,
            site_path,
            list_name,
            columns,
            filter,
            page_size,
            out_csv,
        } => {
            let site_id = sharepoint::resolve_site(&client, &hostname, &site_path)
                .await
                .with_context(|| format!("Failed to resolve site {}/{}", hostname, site_path))?;

            let mut preferred: Vec<String> = list_name
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            preferred.extend(DEFAULT_LIBRARY_NAMES.iter().map(|n| n.to_string()));

            let lists = sharepoint::list_lists(&client, &site_id)
                .await
                .context("Failed to list site lists")?;
            let library = sharepoint::pick_document_library(&lists, preferred.as_slice())?;
            println!("Using library: {} (id: {})", library.label(), library.id);

            let options = ExportOptions {
                filter: filter.filter(|f| !f.trim().is_empty()),
                columns: columns.as_deref().map(split_columns).filter(|c| !c.is_empty()),
                page_size,
                ..ExportOptions::default()
            };

            let file = File::create(&out_csv)
                .with_context(|| format!("Failed to create {:?}", out_csv))?;
            let summary = export_library(&client, &site_id, &library.id, &options, file)
                .await
                .with_context(|| format!("Export to {:?} failed", out_csv))?;

            println!("Wrote CSV: {} ({} rows)", out_csv.display(), summary.rows);
            println!("   Columns: {}", summary.columns.join(", "));
        }

        Commands::Whoami => {
            let me = client.me().await.context("Failed to fetch /me")?;
            println!(
                "{} <{}>",
                me.display_name.as_deref().unwrap_or("-"),
                me.user_principal_name
                    .as_deref()
                    .or(me.mail.as_deref())
                    .unwrap_or("-")
            );
        }
    }

    Ok(())
}

/// Split a comma-separated column list, dropping blanks.
fn split_columns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
