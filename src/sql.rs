//! Validated identifiers and statement rendering for the warehouse SQL
//! surface.
//!
//! Dataset and table names are interpolated into statement text, so they are
//! restricted to ASCII alphanumerics and underscores up front instead of
//! trusting free-form strings.

use std::fmt;

use thiserror::Error;

use crate::codec;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid identifier {0:?}: only ASCII alphanumerics and underscores are allowed")]
pub struct InvalidIdentifier(pub String);

/// A dataset or table name that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: &str) -> Result<Self, InvalidIdentifier> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(InvalidIdentifier(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A (dataset, table) pair identifying one warehouse table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub dataset: Identifier,
    pub table: Identifier,
}

impl TableRef {
    pub fn new(dataset: &str, table: &str) -> Result<Self, InvalidIdentifier> {
        Ok(Self {
            dataset: Identifier::new(dataset)?,
            table: Identifier::new(table)?,
        })
    }

    /// Backtick-quoted `dataset.table` form used in statement text.
    pub fn qualified(&self) -> String {
        format!("`{}.{}`", self.dataset, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// Key-matched upsert from staging into target: matched rows have every
/// non-key column overwritten, unmatched staging rows are inserted, target
/// rows absent from staging are left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeStatement {
    pub target: TableRef,
    pub staging: TableRef,
    pub key: &'static str,
    pub columns: &'static [&'static str],
}

impl MergeStatement {
    /// Merge statement over the product column set.
    pub fn products(target: TableRef, staging: TableRef) -> Self {
        Self {
            target,
            staging,
            key: codec::KEY_COLUMN,
            columns: &codec::COLUMNS,
        }
    }

    pub fn render(&self) -> String {
        let updates = self
            .columns
            .iter()
            .filter(|c| **c != self.key)
            .map(|c| format!("t.{c} = s.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_columns = self.columns.join(", ");
        let insert_values = self
            .columns
            .iter()
            .map(|c| format!("s.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "MERGE {target} t USING {staging} s ON t.{key} = s.{key} \
             WHEN MATCHED THEN UPDATE SET {updates} \
             WHEN NOT MATCHED THEN INSERT ({insert_columns}) VALUES ({insert_values})",
            target = self.target.qualified(),
            staging = self.staging.qualified(),
            key = self.key,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncateStatement {
    pub table: TableRef,
}

impl TruncateStatement {
    pub fn render(&self) -> String {
        format!("TRUNCATE TABLE {}", self.table.qualified())
    }
}

/// Statements the pipeline issues against the backend. Carrying the
/// structured form (rather than rendered text) lets non-SQL backends
/// interpret them semantically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Merge(MergeStatement),
    Truncate(TruncateStatement),
}

impl Statement {
    pub fn render(&self) -> String {
        match self {
            Statement::Merge(m) => m.render(),
            Statement::Truncate(t) => t.render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_accepts_alphanumerics_and_underscores() {
        assert!(Identifier::new("products").is_ok());
        assert!(Identifier::new("tmp_merge_1").is_ok());
        assert!(Identifier::new("Dataset2").is_ok());
    }

    #[test]
    fn identifier_rejects_injection_shaped_input() {
        assert!(Identifier::new("").is_err());
        assert!(Identifier::new("products; DROP TABLE users").is_err());
        assert!(Identifier::new("data-set").is_err());
        assert!(Identifier::new("tbl`").is_err());
        assert!(Identifier::new("a b").is_err());
    }

    #[test]
    fn merge_statement_updates_every_non_key_column() {
        let statement = MergeStatement::products(
            TableRef::new("shop", "products").unwrap(),
            TableRef::new("shop", "products_staging").unwrap(),
        );
        let sql = statement.render();

        assert!(sql.starts_with("MERGE `shop.products` t USING `shop.products_staging` s"));
        assert!(sql.contains("ON t.longArticleId = s.longArticleId"));
        assert!(sql.contains("t.title = s.title"));
        assert!(sql.contains("t.modified = s.modified"));
        // The key is matched on, never assigned.
        assert!(!sql.contains("t.longArticleId = s.longArticleId,"));
        assert!(sql.contains("WHEN NOT MATCHED THEN INSERT (longArticleId, title"));
    }

    #[test]
    fn truncate_statement_renders_qualified_name() {
        let statement = TruncateStatement {
            table: TableRef::new("shop", "products_staging").unwrap(),
        };
        assert_eq!(
            statement.render(),
            "TRUNCATE TABLE `shop.products_staging`"
        );
    }
}
