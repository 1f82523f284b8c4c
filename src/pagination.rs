use bson::{Document, doc};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_RECORDS_PER_PAGE: u64 = 10;

/// PageQuery
///
/// Raw `page` / `recordsPerPage` query parameters for GET /users. Values that
/// are missing, unparsable or below one fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<String>,
    /// Page size (default 10).
    pub records_per_page: Option<String>,
}

fn parse_at_least_one(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 1)
        .map(|v| v as u64)
        .unwrap_or(default)
}

/// PageWindow
///
/// Offset/limit over the insertion order of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start_index: u64,
    pub page_size: u64,
}

impl PageWindow {
    /// `page_size` is clamped to at least one.
    pub fn new(start_index: u64, page_size: u64) -> Self {
        Self {
            start_index,
            page_size: page_size.max(1),
        }
    }

    /// `start_index = (page - 1) * records_per_page`.
    pub fn from_query(query: &PageQuery) -> Self {
        let page = parse_at_least_one(query.page.as_deref(), DEFAULT_PAGE);
        let per_page = parse_at_least_one(
            query.records_per_page.as_deref(),
            DEFAULT_RECORDS_PER_PAGE,
        );
        Self::new((page - 1).saturating_mul(per_page), per_page)
    }

    /// aggregation_pipeline
    ///
    /// match everything, fold the matches into one array while counting them,
    /// then project the requested slice. The count and the page come back in a
    /// single document, or no document at all when the collection is empty.
    pub fn aggregation_pipeline(&self) -> Vec<Document> {
        let start = i64::try_from(self.start_index).unwrap_or(i64::MAX);
        let size = i64::try_from(self.page_size).unwrap_or(i64::MAX);

        vec![
            doc! { "$match": {} },
            doc! {
                "$group": {
                    "_id": bson::Bson::Null,
                    "total_count": { "$sum": 1 },
                    "data": { "$push": "$$ROOT" },
                }
            },
            doc! {
                "$project": {
                    "_id": 0,
                    "total_count": 1,
                    "items": { "$slice": ["$data", start, size] },
                }
            },
        ]
    }

    /// The same window applied to an in-memory sequence.
    pub fn apply<T: Clone>(&self, all: &[T]) -> Page<T> {
        let items = all
            .iter()
            .skip(usize::try_from(self.start_index).unwrap_or(usize::MAX))
            .take(usize::try_from(self.page_size).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Page {
            items,
            total_count: all.len() as u64,
        }
    }
}

/// Page
///
/// One window of results plus the size of the whole collection. An empty
/// `items` is a normal result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }
}
