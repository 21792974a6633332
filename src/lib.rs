//! sp_linker - Scripted access to SharePoint through Microsoft Graph.
//!
//! This library provides functionality to:
//! - Sign in with the device-code flow (with an on-disk token cache) or with
//!   application credentials
//! - Resolve a site, its drives and its document libraries
//! - Look up the shareable web URL of a file by path
//! - Export a library's items and metadata columns to CSV
//!
//! # Example
//!
//! ```no_run
//! use sp_linker::{sharepoint, GraphClient, Settings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::from_env()?;
//!     let client = GraphClient::connect(&settings).await?;
//!
//!     let site_id = sharepoint::resolve_site(&client, "contoso.sharepoint.com", "sites/Finance").await?;
//!     let drives = sharepoint::list_drives(&client, &site_id).await?;
//!     let (drive_id, drive_name) = sharepoint::pick_default_drive(&drives)?;
//!
//!     let path = sharepoint::normalize_path("Shared Documents/Reports/Budget.xlsx", &drive_name);
//!     println!("{}", sharepoint::get_file_web_url(&client, &drive_id, &path).await?);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod fields;
pub mod graph;
pub mod models;
pub mod sharepoint;
pub mod token_cache;

// Re-exports for convenience
pub use auth::Authenticator;
pub use config::{AuthMode, Settings};
pub use error::{GraphError, Result};
pub use export::{export_library, iterate_items, ExportOptions, ExportSummary, ItemCursor};
pub use fields::{normalize_value, FieldValue};
pub use graph::GraphClient;
pub use models::{Drive, ListItem, SiteList};
