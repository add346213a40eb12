//! Conversions between domain records and warehouse storage rows.
//!
//! The codec owns the freshness stamp and the record ⇄ row mapping. Both
//! directions are total: every domain field maps to exactly one storage
//! column and back, so the column list here is the single source of truth
//! for the merge statement as well.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::domain::ProductRecord;

/// A single warehouse row keyed by wire column name.
pub type StorageRow = Map<String, Value>;

/// Merge key column.
pub const KEY_COLUMN: &str = "longArticleId";

/// All wire columns, in staging/target table order.
pub const COLUMNS: [&str; 9] = [
    "longArticleId",
    "title",
    "article",
    "descriptionContent",
    "mainCategoryTitle",
    "categoryTree",
    "image",
    "producerTitle",
    "modified",
];

const MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Returns a copy of `record` with `modified` set to the current UTC wall
/// clock. The input record keeps whatever timestamp it carried at read time.
pub fn stamp_freshness(record: &ProductRecord) -> ProductRecord {
    ProductRecord {
        modified: Utc::now().format(MODIFIED_FORMAT).to_string(),
        ..record.clone()
    }
}

/// Converts a record into its storage row. Pure; no omissions, no renames.
pub fn to_storage_row(record: &ProductRecord) -> StorageRow {
    let mut row = Map::new();
    row.insert(
        "longArticleId".to_string(),
        Value::String(record.long_article_id.clone()),
    );
    row.insert("title".to_string(), Value::String(record.title.clone()));
    row.insert("article".to_string(), Value::String(record.article.clone()));
    row.insert(
        "descriptionContent".to_string(),
        Value::String(record.description_content.clone()),
    );
    row.insert(
        "mainCategoryTitle".to_string(),
        Value::String(record.main_category_title.clone()),
    );
    row.insert(
        "categoryTree".to_string(),
        Value::String(record.category_tree.clone()),
    );
    row.insert("image".to_string(), Value::String(record.image.clone()));
    row.insert(
        "producerTitle".to_string(),
        Value::String(record.producer_title.clone()),
    );
    row.insert(
        "modified".to_string(),
        Value::String(record.modified.clone()),
    );
    row
}

/// Inverse of [`to_storage_row`]. Backends may hand back natively typed
/// values (numbers, bools, nulls); every column is coerced to text.
pub fn from_storage_row(row: &StorageRow) -> ProductRecord {
    ProductRecord {
        long_article_id: column_text(row, "longArticleId"),
        title: column_text(row, "title"),
        article: column_text(row, "article"),
        description_content: column_text(row, "descriptionContent"),
        main_category_title: column_text(row, "mainCategoryTitle"),
        category_tree: column_text(row, "categoryTree"),
        image: column_text(row, "image"),
        producer_title: column_text(row, "producerTitle"),
        modified: column_text(row, "modified"),
    }
}

/// Text coercion for a single column. Missing and null both become "".
pub fn column_text(row: &StorageRow, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Encodes one record as one NDJSON staging line (without the newline).
pub fn encode_line(record: &ProductRecord) -> serde_json::Result<String> {
    serde_json::to_string(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> ProductRecord {
        ProductRecord {
            long_article_id: "100001".to_string(),
            title: "Cordless drill".to_string(),
            article: "DRL-18V".to_string(),
            description_content: "18V cordless drill with two batteries".to_string(),
            main_category_title: "Tools".to_string(),
            category_tree: "Tools > Power Tools > Drills".to_string(),
            image: "https://img.example.com/drl-18v.jpg".to_string(),
            producer_title: "Acme".to_string(),
            modified: "2020-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn round_trip_preserves_every_field_except_modified() {
        let record = make_record();
        let before = Utc::now().format(MODIFIED_FORMAT).to_string();

        let stamped = stamp_freshness(&record);
        let restored = from_storage_row(&to_storage_row(&stamped));

        assert_eq!(restored.long_article_id, record.long_article_id);
        assert_eq!(restored.title, record.title);
        assert_eq!(restored.article, record.article);
        assert_eq!(restored.description_content, record.description_content);
        assert_eq!(restored.main_category_title, record.main_category_title);
        assert_eq!(restored.category_tree, record.category_tree);
        assert_eq!(restored.image, record.image);
        assert_eq!(restored.producer_title, record.producer_title);
        assert_ne!(restored.modified, record.modified);
        assert!(restored.modified >= before);
    }

    #[test]
    fn stamp_does_not_mutate_the_input() {
        let record = make_record();
        let _ = stamp_freshness(&record);
        assert_eq!(record.modified, "2020-01-01T00:00:00.000Z");
    }

    #[test]
    fn storage_row_covers_every_column_exactly_once() {
        let row = to_storage_row(&make_record());
        assert_eq!(row.len(), COLUMNS.len());
        for column in COLUMNS {
            assert!(row.contains_key(column), "missing column {column}");
        }
    }

    #[test]
    fn from_storage_row_coerces_typed_values_to_text() {
        let mut row = to_storage_row(&make_record());
        row.insert("longArticleId".to_string(), Value::from(100_001));
        row.insert("title".to_string(), Value::Bool(true));
        row.insert("image".to_string(), Value::Null);
        row.remove("producerTitle");

        let record = from_storage_row(&row);
        assert_eq!(record.long_article_id, "100001");
        assert_eq!(record.title, "true");
        assert_eq!(record.image, "");
        assert_eq!(record.producer_title, "");
    }

    #[test]
    fn encode_line_is_single_line_json() {
        let line = encode_line(&make_record()).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"longArticleId\":\"100001\""));
    }
}
