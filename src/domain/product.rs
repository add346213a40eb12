use serde::{Deserialize, Serialize};

/// A product record as it travels through the export pipeline.
///
/// `long_article_id` is the stable merge key; every other field is
/// descriptive text. Records are immutable value objects; stamping a
/// freshness timestamp produces a new value (see `codec::stamp_freshness`).
///
/// Wire names are the camelCase column names of the warehouse tables, so
/// serializing a record yields exactly one NDJSON staging row.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub long_article_id: String,
    pub title: String,
    pub article: String,
    pub description_content: String,
    pub main_category_title: String,
    pub category_tree: String,
    pub image: String,
    pub producer_title: String,
    pub modified: String,
}
