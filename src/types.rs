//! Common pagination types

use std::fmt;
use std::str::FromStr;

use async_graphql::Enum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::GraphQLError;

/// Name of the count hint a data layer may attach to the first record.
pub const COUNT_HINT_FIELD: &str = "fullCount";

/// Sort direction
#[derive(Enum, Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    /// The opposite direction, used when paginating backward.
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderDirection {
    type Err = GraphQLError;

    fn from_str(s: &str) -> crate::Result<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(GraphQLError::InvalidOrder(format!(
                "unknown direction '{}'",
                s
            )))
        }
    }
}

impl TryFrom<String> for OrderDirection {
    type Error = GraphQLError;

    fn try_from(s: String) -> crate::Result<Self> {
        s.parse()
    }
}

/// A `[field, direction]` sort key
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "(String, OrderDirection)", into = "(String, OrderDirection)")]
pub struct OrderPair {
    pub field: String,
    pub direction: OrderDirection,
}

impl OrderPair {
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, OrderDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, OrderDirection::Desc)
    }
}

impl From<(String, OrderDirection)> for OrderPair {
    fn from((field, direction): (String, OrderDirection)) -> Self {
        Self { field, direction }
    }
}

impl From<OrderPair> for (String, OrderDirection) {
    fn from(pair: OrderPair) -> Self {
        (pair.field, pair.direction)
    }
}

/// `orderBy` argument as sent by a client
///
/// Either the symbolic name of a configured order enum value or a literal list
/// of sort keys, primary key first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum OrderBy {
    Named(String),
    Pairs(Vec<OrderPair>),
}

/// A record that can sit behind an edge
pub trait Node {
    /// Identifier written into the cursor.
    fn cursor_id(&self) -> String;

    /// Total match count the data layer attached to this record, if any.
    fn count_hint(&self) -> Option<u64> {
        None
    }
}

impl Node for Value {
    fn cursor_id(&self) -> String {
        match self.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    fn count_hint(&self) -> Option<u64> {
        match self.get(COUNT_HINT_FIELD)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_parse_ignores_case() {
        assert_eq!("asc".parse::<OrderDirection>().unwrap(), OrderDirection::Asc);
        assert_eq!("DESC".parse::<OrderDirection>().unwrap(), OrderDirection::Desc);
        assert!("sideways".parse::<OrderDirection>().is_err());
    }

    #[test]
    fn test_order_by_deserializes_name_or_pairs() {
        let named: OrderBy = serde_json::from_value(json!("NAME")).unwrap();
        assert_eq!(named, OrderBy::Named("NAME".into()));

        let pairs: OrderBy = serde_json::from_value(json!([["createdAt", "desc"]])).unwrap();
        assert_eq!(pairs, OrderBy::Pairs(vec![OrderPair::desc("createdAt")]));
    }

    #[test]
    fn test_value_node_reads_id_and_count_hint() {
        let record = json!({"id": 42, "fullCount": "17"});
        assert_eq!(record.cursor_id(), "42");
        assert_eq!(record.count_hint(), Some(17));

        let bare = json!({"id": "a"});
        assert_eq!(bare.cursor_id(), "a");
        assert_eq!(bare.count_hint(), None);
    }
}
