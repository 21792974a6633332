//! Library metadata export: paged list items streamed to CSV.
//!
//! Items are fetched lazily one page at a time through [`ItemCursor`]. The
//! first [`ExportOptions::sample_size`] items are buffered to decide the
//! output columns, written, and then the same cursor is drained for the rest,
//! so the initial request is never repeated and API order is kept.

use std::collections::{BTreeSet, VecDeque};
use std::io::Write;

use tracing::{debug, info};

use crate::error::Result;
use crate::fields::normalize_value;
use crate::graph::GraphClient;
use crate::models::{ListItem, Page};

/// Field holding the document's file name.
pub const FILE_NAME_FIELD: &str = "FileLeafRef";

/// Header of the trailing web URL column.
pub const WEB_URL_COLUMN: &str = "webUrl";

/// Columns exported by default when present in the data, in output order.
pub const DEFAULT_COLUMNS: [&str; 7] = [
    "FileLeafRef",
    "Title",
    "Verified",
    "Accounts",
    "Region",
    "Modified",
    "Editor",
];

/// Maximum number of items inspected when inferring columns.
pub const COLUMN_INFERENCE_LIMIT: usize = 100;

/// Number of items buffered before the header is written.
pub const SAMPLE_SIZE: usize = 50;

/// Page size hint sent with each list item request.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Options for [`export_library`].
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Server-side filter expression, passed through verbatim.
    pub filter: Option<String>,
    /// Explicit output columns; inferred from the sample when `None`.
    pub columns: Option<Vec<String>>,
    pub page_size: usize,
    pub sample_size: usize,
    pub inference_limit: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            filter: None,
            columns: None,
            page_size: DEFAULT_PAGE_SIZE,
            sample_size: SAMPLE_SIZE,
            inference_limit: COLUMN_INFERENCE_LIMIT,
        }
    }
}

/// Result of a finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Header written, web URL column included.
    pub columns: Vec<String>,
    pub rows: usize,
    pub pages: usize,
}

enum CursorState {
    Initial,
    Next(String),
    Done,
}

/// Lazy cursor over the items of a list, one page per request.
///
/// Once exhausted, or after a failed request, it yields nothing more.
pub struct ItemCursor<'a> {
    client: &'a GraphClient,
    items_path: String,
    query: Vec<(&'static str, String)>,
    state: CursorState,
    buffer: VecDeque<ListItem>,
    pages_fetched: usize,
}

/// Start a cursor over the items of `list_id` with fields and file URLs expanded.
pub fn iterate_items<'a>(
    client: &'a GraphClient,
    site_id: &str,
    list_id: &str,
    filter: Option<&str>,
    page_size: usize,
) -> ItemCursor<'a> {
    let mut query = vec![
        ("$expand", "fields,driveItem($select=webUrl)".to_string()),
        ("$select", "id,fields,driveItem".to_string()),
        ("$top", page_size.to_string()),
    ];
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        query.push(("$filter", filter.to_string()));
    }

    ItemCursor {
        client,
        items_path: format!("sites/{}/lists/{}/items", site_id, list_id),
        query,
        state: CursorState::Initial,
        buffer: VecDeque::new(),
        pages_fetched: 0,
    }
}

impl<'a> ItemCursor<'a> {
    /// Fetch the next page. `None` once the last page has been returned.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ListItem>>> {
        let page: Page<ListItem> = match std::mem::replace(&mut self.state, CursorState::Done) {
            CursorState::Initial => {
                let query: Vec<(&str, &str)> =
                    self.query.iter().map(|(k, v)| (*k, v.as_str())).collect();
                self.client.get_json(&self.items_path, &query).await?
            }
            CursorState::Next(path) => self.client.get_json(&path, &[]).await?,
            CursorState::Done => return Ok(None),
        };

        self.pages_fetched += 1;
        debug!(
            page = self.pages_fetched,
            items = page.value.len(),
            more = page.next_link.is_some(),
            "fetched list item page"
        );

        if let Some(link) = page.next_link {
            self.state = CursorState::Next(self.client.relative_to_base(&link).to_string());
        }

        Ok(Some(page.value))
    }

    /// Next item in API order, fetching pages as needed.
    pub async fn next_item(&mut self) -> Result<Option<ListItem>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            match self.next_page().await? {
                Some(items) => self.buffer.extend(items),
                None => return Ok(None),
            }
        }
    }

    /// Take up to `n` items.
    pub async fn take(&mut self, n: usize) -> Result<Vec<ListItem>> {
        let mut items = Vec::with_capacity(n);
        while items.len() < n {
            match self.next_item().await? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    /// Drain every remaining item.
    pub async fn collect_all(&mut self) -> Result<Vec<ListItem>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

/// Decide the output columns from a sample, using [`COLUMN_INFERENCE_LIMIT`].
pub fn choose_columns(sample: &[ListItem], requested: Option<&[String]>) -> Vec<String> {
    choose_columns_within(sample, requested, COLUMN_INFERENCE_LIMIT)
}

/// Decide the output columns from the first `limit` items of a sample.
///
/// An explicit, non-empty `requested` list is used as given. Otherwise the
/// observed keys that appear in [`DEFAULT_COLUMNS`] are kept in that order.
/// Either way the file name field leads when the sample has it.
pub fn choose_columns_within(
    sample: &[ListItem],
    requested: Option<&[String]>,
    limit: usize,
) -> Vec<String> {
    let observed: BTreeSet<&str> = sample
        .iter()
        .take(limit)
        .flat_map(|item| item.fields.keys().map(String::as_str))
        .collect();

    let mut columns: Vec<String> = match requested {
        Some(cols) if !cols.is_empty() => cols.to_vec(),
        _ => DEFAULT_COLUMNS
            .iter()
            .filter(|c| observed.contains(*c))
            .map(|c| c.to_string())
            .collect(),
    };

    if observed.contains(FILE_NAME_FIELD) && !columns.iter().any(|c| c == FILE_NAME_FIELD) {
        columns.insert(0, FILE_NAME_FIELD.to_string());
    }

    columns
}

/// One CSV row: normalized values for `columns`, then the file's web URL.
pub fn build_row(item: &ListItem, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|col| item.fields.get(col).map(normalize_value).unwrap_or_default())
        .chain(std::iter::once(item.web_url().to_string()))
        .collect()
}

/// Export a list's items and metadata to CSV on `writer`.
///
/// Rows already produced are flushed to `writer` before an error is returned.
pub async fn export_library<W: Write>(
    client: &GraphClient,
    site_id: &str,
    list_id: &str,
    options: &ExportOptions,
    writer: W,
) -> Result<ExportSummary> {
    let mut cursor = iterate_items(
        client,
        site_id,
        list_id,
        options.filter.as_deref(),
        options.page_size,
    );

    let sample = cursor.take(options.sample_size).await?;
    let columns = choose_columns_within(&sample, options.columns.as_deref(), options.inference_limit);

    let mut header = columns.clone();
    header.push(WEB_URL_COLUMN.to_string());

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&header)?;

    let mut rows = 0;
    for item in &sample {
        wtr.write_record(build_row(item, &columns))?;
        rows += 1;
    }

    let drained = drain(&mut cursor, &mut wtr, &columns, &mut rows).await;
    wtr.flush()?;
    drained?;

    info!(rows, pages = cursor.pages_fetched(), "export finished");
    Ok(ExportSummary {
        columns: header,
        rows,
        pages: cursor.pages_fetched(),
    })
}

async fn drain<W: Write>(
    cursor: &mut ItemCursor<'_>,
    wtr: &mut csv::Writer<W>,
    columns: &[String],
    rows: &mut usize,
) -> Result<()> {
    while let Some(item) = cursor.next_item().await? {
        wtr.write_record(build_row(&item, columns))?;
        *rows += 1;
    }
    Ok(())
}
