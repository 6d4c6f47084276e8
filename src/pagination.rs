//! Relay-style cursor pagination

use async_graphql::{InputObject, Object, SimpleObject};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{Node, OrderBy};
use crate::GraphQLError;

/// Fixed cursor prefix
pub const CURSOR_PREFIX: &str = "arrayconnection";

/// Separator between prefix, id and index
pub const CURSOR_SEPARATOR: char = '$';

/// Page information
#[derive(SimpleObject, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Edge in a connection
#[derive(Debug, Clone)]
pub struct Edge<T, S = ()> {
    pub cursor: String,
    pub node: T,
    pub source: S,
}

#[Object]
impl<T: async_graphql::OutputType, S: Send + Sync> Edge<T, S> {
    async fn cursor(&self) -> &str {
        &self.cursor
    }

    async fn node(&self) -> &T {
        &self.node
    }
}

/// Connection (paginated result)
#[derive(Debug, Clone)]
pub struct Connection<T, S = ()> {
    pub edges: Vec<Edge<T, S>>,
    pub page_info: PageInfo,
}

#[Object]
impl<T: async_graphql::OutputType, S: Send + Sync> Connection<T, S> {
    async fn edges(&self) -> &[Edge<T, S>] {
        &self.edges
    }

    async fn page_info(&self) -> &PageInfo {
        &self.page_info
    }
}

impl<T, S> Connection<T, S> {
    /// Create connection from already resolved edges
    pub fn new(edges: Vec<Edge<T, S>>, has_next: bool, has_previous: bool) -> Self {
        let start_cursor = edges.first().map(|e| e.cursor.clone());
        let end_cursor = edges.last().map(|e| e.cursor.clone());

        Self {
            edges,
            page_info: PageInfo {
                has_next_page: has_next,
                has_previous_page: has_previous,
                start_cursor,
                end_cursor,
            },
        }
    }
}

impl<T: Node> Connection<T> {
    /// Slice a fully materialized array into a connection.
    ///
    /// `after`/`before` are read as absolute positions in `items`, then `first`
    /// trims from the front and `last` from the back. Cursors encode each
    /// node's absolute position; nothing is carried over between requests.
    pub fn from_array(items: Vec<T>, args: &ConnectionArgs) -> crate::Result<Self> {
        let length = items.len() as i64;
        let after = args.after.as_deref().map(array_offset).transpose()?;
        let before = args.before.as_deref().map(array_offset).transpose()?;

        let before_offset = before.unwrap_or(length);
        let after_offset = after.unwrap_or(-1);

        let mut start = after_offset.max(-1) + 1;
        let mut end = before_offset.min(length);

        if let Some(first) = args.first {
            if first < 0 {
                return Err(GraphQLError::Pagination(
                    "'first' must be non-negative".to_string(),
                ));
            }
            end = end.min(start.saturating_add(first));
        }
        if let Some(last) = args.last {
            if last < 0 {
                return Err(GraphQLError::Pagination(
                    "'last' must be non-negative".to_string(),
                ));
            }
            start = start.max(end.saturating_sub(last));
        }

        let lower_bound = if after.is_some() { after_offset + 1 } else { 0 };
        let upper_bound = if before.is_some() { before_offset } else { length };
        let has_previous = args.last.is_some() && start > lower_bound;
        let has_next = args.first.is_some() && end < upper_bound;

        let start = start.clamp(0, length) as usize;
        let end = (end.max(0) as usize).clamp(start, length as usize);

        let edges = items
            .into_iter()
            .enumerate()
            .skip(start)
            .take(end - start)
            .map(|(position, node)| Edge {
                cursor: CursorCodec::encode(&node.cursor_id(), position),
                node,
                source: (),
            })
            .collect();

        Ok(Self::new(edges, has_next, has_previous))
    }
}

/// Position a cursor points at, as a signed array offset.
fn array_offset(cursor: &str) -> crate::Result<i64> {
    let index = CursorCodec::decode(cursor)?.index;
    i64::try_from(index)
        .map_err(|_| GraphQLError::MalformedCursor(format!("index {} is out of range", index)))
}

/// Cursor contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCursor {
    pub id: String,
    pub index: usize,
}

/// Cursor encoding/decoding
pub struct CursorCodec;

impl CursorCodec {
    /// Encode node id and position into an opaque cursor
    pub fn encode(id: &str, index: usize) -> String {
        let raw = format!(
            "{prefix}{sep}{id}{sep}{index}",
            prefix = CURSOR_PREFIX,
            sep = CURSOR_SEPARATOR,
        );
        BASE64.encode(raw.as_bytes())
    }

    /// Decode a cursor produced by [`CursorCodec::encode`]
    pub fn decode(cursor: &str) -> crate::Result<DecodedCursor> {
        let bytes = BASE64
            .decode(cursor.as_bytes())
            .map_err(|e| GraphQLError::MalformedCursor(e.to_string()))?;
        let raw = String::from_utf8(bytes)
            .map_err(|e| GraphQLError::MalformedCursor(e.to_string()))?;

        let payload = raw
            .strip_prefix(CURSOR_PREFIX)
            .and_then(|rest| rest.strip_prefix(CURSOR_SEPARATOR))
            .ok_or_else(|| GraphQLError::MalformedCursor(format!("missing prefix in '{}'", raw)))?;

        let mut fields = payload.split(CURSOR_SEPARATOR);
        let (id, index) = match (fields.next(), fields.next(), fields.next()) {
            (Some(id), Some(index), None) => (id, index),
            _ => {
                return Err(GraphQLError::MalformedCursor(format!(
                    "expected id and index in '{}'",
                    raw
                )))
            }
        };

        let index = index
            .parse::<usize>()
            .map_err(|_| GraphQLError::MalformedCursor(format!("index '{}' is not an integer", index)))?;

        Ok(DecodedCursor {
            id: id.to_string(),
            index,
        })
    }
}

/// Accepts `5` as well as `"5"`.
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(i64),
        Text(String),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Number(n)) => Ok(Some(n)),
        Some(Count::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Connection arguments
///
/// `first`/`last` may arrive as numbers or numeric strings.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionArgs {
    #[serde(deserialize_with = "deserialize_count")]
    pub first: Option<i64>,
    #[serde(deserialize_with = "deserialize_count")]
    pub last: Option<i64>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub order_by: Option<OrderBy>,
}

impl ConnectionArgs {
    /// Forward window of `n` records
    pub fn first(n: i64) -> Self {
        Self {
            first: Some(n),
            ..Self::default()
        }
    }

    /// Backward window of `n` records
    pub fn last(n: i64) -> Self {
        Self {
            last: Some(n),
            ..Self::default()
        }
    }

    pub fn with_after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn with_before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    /// Reject negative window sizes
    pub fn validate(&self) -> crate::Result<()> {
        if self.first.is_some_and(|n| n < 0) {
            return Err(GraphQLError::Pagination(
                "'first' must be non-negative".to_string(),
            ));
        }
        if self.last.is_some_and(|n| n < 0) {
            return Err(GraphQLError::Pagination(
                "'last' must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Requested window size; zero counts as not requested
    pub fn window_size(&self) -> Option<usize> {
        let positive = |n: &i64| *n > 0;
        self.first
            .filter(positive)
            .or_else(|| self.last.filter(positive))
            .map(|n| n as usize)
    }

    /// Backward pagination: `last` without `first`
    pub fn is_backward(&self) -> bool {
        self.first.filter(|n| *n > 0).is_none() && self.last.is_some_and(|n| n > 0)
    }

    /// Anchor cursor, `after` taking precedence over `before`
    pub fn cursor(&self) -> Option<&str> {
        self.after
            .as_deref()
            .filter(|c| !c.is_empty())
            .or_else(|| self.before.as_deref().filter(|c| !c.is_empty()))
    }
}

/// Pagination input for GraphQL queries
///
/// Follows the Relay Cursor Connections Specification:
/// https://relay.dev/graphql/connections.htm
#[derive(InputObject, Debug, Clone, Default)]
pub struct PaginationInput {
    /// Number of items to return (forward pagination)
    pub first: Option<i32>,

    /// Cursor to start from (forward pagination)
    pub after: Option<String>,

    /// Number of items to return (backward pagination)
    pub last: Option<i32>,

    /// Cursor to start from (backward pagination)
    pub before: Option<String>,

    /// Name of a configured order
    pub order_by: Option<String>,
}

impl From<PaginationInput> for ConnectionArgs {
    fn from(input: PaginationInput) -> Self {
        Self {
            first: input.first.map(i64::from),
            last: input.last.map(i64::from),
            before: input.before,
            after: input.after,
            order_by: input.order_by.map(OrderBy::Named),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn letters() -> Vec<Value> {
        ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| json!({ "id": id }))
            .collect()
    }

    #[test]
    fn test_cursor_codec() {
        let encoded = CursorCodec::encode("user-7", 12);
        let decoded = CursorCodec::decode(&encoded).unwrap();
        assert_eq!(
            decoded,
            DecodedCursor {
                id: "user-7".into(),
                index: 12
            }
        );
    }

    #[test]
    fn test_cursor_wire_format() {
        let raw = BASE64.decode(CursorCodec::encode("42", 3)).unwrap();
        assert_eq!(String::from_utf8(raw).unwrap(), "arrayconnection$42$3");
    }

    #[test]
    fn test_rejects_malformed_cursor() {
        let not_base64 = CursorCodec::decode("not-a-cursor");
        assert!(matches!(not_base64, Err(GraphQLError::MalformedCursor(_))));

        let wrong_prefix = BASE64.encode("connection$1$2");
        assert!(CursorCodec::decode(&wrong_prefix).is_err());

        let extra_field = BASE64.encode("arrayconnection$1$2$3");
        assert!(CursorCodec::decode(&extra_field).is_err());

        let bad_index = BASE64.encode("arrayconnection$1$two");
        assert!(CursorCodec::decode(&bad_index).is_err());
    }

    proptest! {
        #[test]
        fn prop_cursor_round_trip(id in "[a-zA-Z0-9_:-]{0,24}", index in 0usize..1_000_000) {
            let decoded = CursorCodec::decode(&CursorCodec::encode(&id, index)).unwrap();
            prop_assert_eq!(decoded.id, id);
            prop_assert_eq!(decoded.index, index);
        }
    }

    #[test]
    fn test_connection_creation() {
        let edges = vec![
            Edge {
                cursor: CursorCodec::encode("1", 0),
                node: json!({"id": "1"}),
                source: (),
            },
            Edge {
                cursor: CursorCodec::encode("2", 1),
                node: json!({"id": "2"}),
                source: (),
            },
        ];
        let conn = Connection::new(edges, true, false);
        assert_eq!(conn.edges.len(), 2);
        assert!(conn.page_info.has_next_page);
        assert!(!conn.page_info.has_previous_page);
        assert_eq!(conn.page_info.start_cursor, Some(CursorCodec::encode("1", 0)));
        assert_eq!(conn.page_info.end_cursor, Some(CursorCodec::encode("2", 1)));
    }

    #[test]
    fn test_from_array_first_then_after() {
        let page = Connection::from_array(letters(), &ConnectionArgs::first(2)).unwrap();
        assert_eq!(page.edges.len(), 2);
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);

        let end = page.page_info.end_cursor.unwrap();
        let next = Connection::from_array(letters(), &ConnectionArgs::first(2).with_after(end)).unwrap();
        let ids: Vec<_> = next.edges.iter().map(|e| e.node.cursor_id()).collect();
        assert_eq!(ids, ["c", "d"]);
        assert!(next.page_info.has_next_page);
    }

    #[test]
    fn test_from_array_last() {
        let page = Connection::from_array(letters(), &ConnectionArgs::last(2)).unwrap();
        let ids: Vec<_> = page.edges.iter().map(|e| e.node.cursor_id()).collect();
        assert_eq!(ids, ["d", "e"]);
        assert!(page.page_info.has_previous_page);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn test_from_array_huge_first_after_cursor() {
        let args = ConnectionArgs::first(i64::MAX).with_after(CursorCodec::encode("c", 0));
        let page = Connection::from_array(letters(), &args).unwrap();
        let ids: Vec<_> = page.edges.iter().map(|e| e.node.cursor_id()).collect();
        assert_eq!(ids, ["b", "c", "d", "e"]);
        assert!(!page.page_info.has_next_page);
    }

    #[test]
    fn test_from_array_rejects_out_of_range_cursor() {
        let args = ConnectionArgs::first(2).with_after(CursorCodec::encode("a", usize::MAX));
        assert!(matches!(
            Connection::from_array(letters(), &args),
            Err(GraphQLError::MalformedCursor(_))
        ));
    }

    #[test]
    fn test_from_array_empty() {
        let page = Connection::<Value>::from_array(Vec::new(), &ConnectionArgs::first(3)).unwrap();
        assert!(page.edges.is_empty());
        assert_eq!(page.page_info, PageInfo::default());
    }

    #[test]
    fn test_args_accept_numeric_strings() {
        let args: ConnectionArgs =
            serde_json::from_value(json!({"first": "10", "after": "abc", "orderBy": "NAME"})).unwrap();
        assert_eq!(args.first, Some(10));
        assert_eq!(args.window_size(), Some(10));
        assert_eq!(args.cursor(), Some("abc"));
        assert_eq!(args.order_by, Some(OrderBy::Named("NAME".into())));
    }

    #[test]
    fn test_args_window_and_direction() {
        assert_eq!(ConnectionArgs::first(0).window_size(), None);
        assert!(ConnectionArgs::last(5).is_backward());
        assert!(!ConnectionArgs::first(5).is_backward());
        assert!(ConnectionArgs::first(-1).validate().is_err());
        assert!(ConnectionArgs::last(3).validate().is_ok());
    }

    #[test]
    fn test_pagination_input_into_args() {
        let input = PaginationInput {
            last: Some(4),
            before: Some("c".into()),
            order_by: Some("ID".into()),
            ..PaginationInput::default()
        };
        let args = ConnectionArgs::from(input);
        assert_eq!(args.last, Some(4));
        assert_eq!(args.cursor(), Some("c"));
        assert_eq!(args.order_by, Some(OrderBy::Named("ID".into())));
    }
}
