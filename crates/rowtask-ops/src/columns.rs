//! Option types shared by several operations.

use rowtask::Row;
use serde::{Deserialize, Deserializer};

/// A list of column names.
///
/// Accepts either a list (`[a, b]`) or a comma-separated string (`"a,b"`),
/// which is what `--set columns=a,b` produces on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnList(pub Vec<String>);

impl<'de> Deserialize<'de> for ColumnList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<String>),
            Joined(String),
        }

        let columns = match Raw::deserialize(deserializer)? {
            Raw::List(list) => list,
            Raw::Joined(s) => s
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        };
        Ok(ColumnList(columns))
    }
}

/// True if `row` has a non-empty value in `column`.
pub fn has_value(row: &Row, column: &str) -> bool {
    row.get(column).is_some_and(|v| !v.is_empty())
}

/// Lenient boolean: accepts `true`/`false` and the strings command lines produce.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Text(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got '{other}'"
            ))),
        },
    }
}
