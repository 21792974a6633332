//! SharePoint site, drive and library resolution.

use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::graph::GraphClient;
use crate::models::{Drive, DriveItem, Page, Site, SiteList};

/// Drive names preferred by [`pick_default_drive`], compared case-insensitively.
pub const DEFAULT_DRIVE_NAMES: [&str; 2] = ["documents", "shared documents"];

/// Library names tried after any user-supplied one.
pub const DEFAULT_LIBRARY_NAMES: [&str; 2] = ["Documents", "Shared Documents"];

/// Template discriminator of document libraries.
pub const DOCUMENT_LIBRARY_TEMPLATE: &str = "documentLibrary";

/// Resolve a site id from a hostname and a site path such as `sites/Finance`.
pub async fn resolve_site(client: &GraphClient, hostname: &str, site_path: &str) -> Result<String> {
    let path = format!("sites/{}:/{}", hostname.trim(), encode_path(site_path));

    let site: Site = client
        .get_json(&path, &[("$select", "id,name,displayName")])
        .await
        .map_err(|e| match e {
            e if e.is_not_found() => {
                GraphError::NotFound(format!("site '{}' on {}", site_path, hostname))
            }
            e => e,
        })?;

    info!(site_id = %site.id, "resolved site");
    Ok(site.id)
}

/// List the drives of a site.
pub async fn list_drives(client: &GraphClient, site_id: &str) -> Result<Vec<Drive>> {
    let page: Page<Drive> = client
        .get_json(&format!("sites/{}/drives", site_id), &[])
        .await?;
    debug!(count = page.value.len(), "listed drives");
    Ok(page.value)
}

/// List the lists of a site, including their template facet.
pub async fn list_lists(client: &GraphClient, site_id: &str) -> Result<Vec<SiteList>> {
    let page: Page<SiteList> = client
        .get_json(
            &format!("sites/{}/lists", site_id),
            &[("$select", "id,name,displayName,webUrl,list")],
        )
        .await?;
    debug!(count = page.value.len(), "listed lists");
    Ok(page.value)
}

/// Pick the drive to use when none was named.
///
/// Prefers `Documents` or `Shared Documents` wherever they appear, otherwise
/// the first drive. Returns `(id, name)`.
pub fn pick_default_drive(drives: &[Drive]) -> Result<(String, String)> {
    let preferred = drives.iter().find(|d| {
        d.name
            .as_deref()
            .map(|n| DEFAULT_DRIVE_NAMES.contains(&n.trim().to_lowercase().as_str()))
            .unwrap_or(false)
    });

    let chosen = preferred.or_else(|| drives.first()).ok_or_else(|| {
        GraphError::NotFound("no document libraries (drives) found on the site".to_string())
    })?;

    Ok((
        chosen.id.clone(),
        chosen.name.clone().unwrap_or_else(|| "Documents".to_string()),
    ))
}

/// Pick a document library, trying `preferred_names` in order.
///
/// Only lists with the `documentLibrary` template qualify. Falls back to the
/// first qualifying list when no name matches.
pub fn pick_document_library<'a, S: AsRef<str>>(
    lists: &'a [SiteList],
    preferred_names: &[S],
) -> Result<&'a SiteList> {
    let libraries: Vec<&SiteList> = lists
        .iter()
        .filter(|l| l.template() == Some(DOCUMENT_LIBRARY_TEMPLATE))
        .collect();

    for wanted in preferred_names {
        let wanted = wanted.as_ref().trim().to_lowercase();
        if let Some(found) = libraries.iter().find(|l| {
            l.name
                .as_deref()
                .map(|n| n.trim().to_lowercase() == wanted)
                .unwrap_or(false)
        }) {
            return Ok(*found);
        }
    }

    libraries.first().copied().ok_or_else(|| {
        GraphError::NotFound(format!(
            "no document libraries (list.template == '{}') found on this site",
            DOCUMENT_LIBRARY_TEMPLATE
        ))
    })
}

/// Turn a user path into a path relative to the container root.
///
/// Accepts `Reports/Budget.xlsx` as well as `Shared Documents/Reports/Budget.xlsx`.
pub fn normalize_path(user_path: &str, container_name: &str) -> String {
    let path = user_path.replace('\\', "/");
    let path = path.trim_start_matches('/');

    let container = container_name.trim_matches('/');
    let prefix_len = container.len() + 1;

    if !container.is_empty()
        && path.len() > container.len()
        && path.as_bytes()[container.len()] == b'/'
        && path
            .get(..container.len())
            .map(|head| head.to_lowercase() == container.to_lowercase())
            .unwrap_or(false)
    {
        return path[prefix_len..].to_string();
    }

    path.to_string()
}

/// Fetch the web URL of the file at `relative_path` in a drive.
pub async fn get_file_web_url(
    client: &GraphClient,
    drive_id: &str,
    relative_path: &str,
) -> Result<String> {
    let path = format!("drives/{}/root:/{}", drive_id, encode_path(relative_path));

    let item: DriveItem = client.get_json(&path, &[]).await.map_err(|e| match e {
        e if e.is_not_found() => GraphError::NotFound(format!("file '{}'", relative_path)),
        e => e,
    })?;

    Ok(item.web_url)
}

/// Percent-encode each segment of a slash path, keeping the separators.
pub fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("sites/Finance"), "sites/Finance");
        assert_eq!(
            encode_path("/Reports/Q1 Budget & Plan.xlsx"),
            "Reports/Q1%20Budget%20%26%20Plan.xlsx"
        );
    }

    #[test]
    fn test_normalize_path_strips_container() {
        assert_eq!(
            normalize_path("Shared Documents/Reports/Budget.xlsx", "Shared Documents"),
            "Reports/Budget.xlsx"
        );
        assert_eq!(
            normalize_path("\\shared documents\\Reports\\Budget.xlsx", "Shared Documents"),
            "Reports/Budget.xlsx"
        );
    }

    #[test]
    fn test_normalize_path_keeps_relative() {
        assert_eq!(
            normalize_path("Reports/Budget.xlsx", "Shared Documents"),
            "Reports/Budget.xlsx"
        );
        assert_eq!(normalize_path("/Documents", "Documents"), "Documents");
        assert_eq!(
            normalize_path("DocumentsArchive/a.txt", "Documents"),
            "DocumentsArchive/a.txt"
        );
    }

    #[test]
    fn test_normalize_path_non_ascii() {
        assert_eq!(normalize_path("Dokumente/ä.txt", "Dokumente"), "ä.txt");
        assert_eq!(normalize_path("é/x.txt", "Documents"), "é/x.txt");
    }
}
