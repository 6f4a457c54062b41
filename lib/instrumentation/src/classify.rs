//! Statement classification by leading keyword.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Truncate,
    Other,
}

impl QueryType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Other => "OTHER",
        }
    }

    /// Returns true for statements that only read.
    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Select)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies `query` by its first keyword, ignoring case and leading
/// whitespace. `CREATE INDEX` and `DROP INDEX` fall under `Create`/`Drop`.
#[must_use]
pub fn classify(query: &str) -> QueryType {
    let keyword: String = query
        .trim_start()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    match keyword.as_str() {
        "SELECT" => QueryType::Select,
        "INSERT" => QueryType::Insert,
        "UPDATE" => QueryType::Update,
        "DELETE" => QueryType::Delete,
        "CREATE" => QueryType::Create,
        "ALTER" => QueryType::Alter,
        "DROP" => QueryType::Drop,
        "TRUNCATE" => QueryType::Truncate,
        _ => QueryType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_keyword_any_case() {
        assert_eq!(classify("  SeLeCt 1"), QueryType::Select);
        assert_eq!(classify("insert into t values (1)"), QueryType::Insert);
        assert_eq!(classify("\n\tUPDATE t SET a = 1"), QueryType::Update);
        assert_eq!(classify("delete from t"), QueryType::Delete);
        assert_eq!(classify("alter table t add c int"), QueryType::Alter);
        assert_eq!(classify("truncate t"), QueryType::Truncate);
    }

    #[test]
    fn index_statements_use_their_verb() {
        assert_eq!(classify("CREATE INDEX idx ON t (a)"), QueryType::Create);
        assert_eq!(classify("create table t (a int)"), QueryType::Create);
        assert_eq!(classify("DROP INDEX x"), QueryType::Drop);
    }

    #[test]
    fn keyword_followed_by_punctuation() {
        assert_eq!(classify("select(1)"), QueryType::Select);
    }

    #[test]
    fn unknown_or_empty_is_other() {
        assert_eq!(classify("EXPLAIN SELECT 1"), QueryType::Other);
        assert_eq!(classify("with x as (select 1) select * from x"), QueryType::Other);
        assert_eq!(classify(""), QueryType::Other);
        assert_eq!(classify("   "), QueryType::Other);
        assert_eq!(classify("SELECTED"), QueryType::Other);
    }

    #[test]
    fn display_is_uppercase_keyword() {
        assert_eq!(QueryType::Drop.to_string(), "DROP");
        assert_eq!(
            serde_json::to_value(QueryType::Other).expect("serialize"),
            "OTHER"
        );
    }
}
