//! Query filter builder
//!
//! Accumulates limit, order and equality filters, then materializes them
//! against JSON records. Every builder method takes the filter by value and
//! returns the updated one, so a partially built filter can be cloned and
//! continued down separate branches without aliasing.

use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::config::FilteringConfig;
use crate::pagination::{Connection, ConnectionArgs};
use crate::types::{OrderDirection, OrderPair};
use crate::GraphQLError;

/// Default maximum window size
pub const DEFAULT_LIMIT: usize = 40;

/// Accumulated limit/order/filter intent
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub limit: usize,
    /// Sort keys in priority order, one entry per field.
    pub order_by: Vec<OrderPair>,
    /// Equality predicates, AND-combined.
    pub filter: Map<String, Value>,
    /// Absolute upper bound of the window.
    pub offset: Option<usize>,
    /// Position in the full ordered set the window starts at.
    pub index: usize,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            order_by: Vec::new(),
            filter: Map::new(),
            offset: None,
            index: 0,
        }
    }
}

impl FilterSpec {
    pub fn from_config(config: &FilteringConfig) -> Self {
        Self {
            limit: config.limit,
            ..Self::default()
        }
    }

    /// Number of records kept after ordering and filtering.
    ///
    /// `offset - index` once a window is set, `limit` otherwise.
    pub fn window(&self) -> usize {
        match self.offset {
            Some(offset) => offset.saturating_sub(self.index),
            None => self.limit,
        }
    }
}

/// Node arguments understood by [`QueryFilter::from_args`]
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterArgs {
    pub filter: Value,
    pub order_by: Option<OrderPair>,
    pub offset: Option<usize>,
}

/// Fluent filter over a record or a list of records
#[derive(Debug, Clone)]
pub struct QueryFilter {
    results: Value,
    spec: FilterSpec,
}

impl QueryFilter {
    pub fn new(results: Value) -> Self {
        Self::with_spec(results, FilterSpec::default())
    }

    pub fn with_spec(results: Value, spec: FilterSpec) -> Self {
        Self { results, spec }
    }

    pub fn from_records(records: Vec<Value>) -> Self {
        Self::new(Value::Array(records))
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn into_spec(self) -> FilterSpec {
        self.spec
    }

    /// Set the limit; `None` and `Some(0)` keep the current one.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit.filter(|n| *n > 0) {
            self.spec.limit = limit;
        }
        self
    }

    /// Add a sort key, replacing an existing key on the same field in place.
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        let field = field.into();
        match self.spec.order_by.iter_mut().find(|pair| pair.field == field) {
            Some(pair) => pair.direction = direction,
            None => self.spec.order_by.push(OrderPair::new(field, direction)),
        }
        self
    }

    /// Merge equality predicates; later keys win. Non-object values merge nothing.
    pub fn filter(mut self, predicates: Value) -> Self {
        if let Value::Object(predicates) = predicates {
            self.spec.filter.extend(predicates);
        }
        self
    }

    pub fn filter_if(self, condition: bool, predicates: Value) -> Self {
        if condition {
            self.filter(predicates)
        } else {
            self
        }
    }

    /// Apply `f` only when `value` was provided.
    ///
    /// `Some(0)`, `Some(false)` and empty collections are provided values.
    pub fn when<V, F>(self, value: Option<V>, f: F) -> Self
    where
        F: FnOnce(Self, V) -> Self,
    {
        match value {
            Some(value) => f(self, value),
            None => self,
        }
    }

    /// Restrict materialization to `offset - index` records.
    pub fn window(mut self, offset: usize, index: usize) -> Self {
        self.spec.offset = Some(offset);
        self.spec.index = index;
        self
    }

    /// Apply node arguments.
    ///
    /// The limit is taken from `args.offset`, which callers historically relied
    /// on; new call sites should set `limit` explicitly instead.
    pub fn from_args(self, args: &FilterArgs) -> Self {
        self.filter(args.filter.clone())
            .when(args.order_by.clone(), |q, pair| {
                q.order_by(pair.field, pair.direction)
            })
            .limit(args.offset)
    }

    /// Ordered, filtered and truncated records. The backing value is untouched.
    pub fn to_array(&self) -> Vec<Value> {
        let mut records = match &self.results {
            Value::Array(records) => records.clone(),
            other => vec![other.clone()],
        };

        if !self.spec.order_by.is_empty() {
            records.sort_by(|a, b| compare_records(a, b, &self.spec.order_by));
        }

        if !self.spec.filter.is_empty() {
            records.retain(|record| matches_filter(record, &self.spec.filter));
        }

        let window = self.spec.window();
        records.truncate(window);
        trace!(records = records.len(), window, "materialized query filter");
        records
    }

    /// Single record view of the results
    pub fn to_object(&self) -> crate::Result<Value> {
        match &self.results {
            Value::Object(_) => Ok(self.results.clone()),
            Value::Array(_) => Ok(self
                .to_array()
                .into_iter()
                .next()
                .unwrap_or_else(|| Value::Object(Map::new()))),
            other => Err(GraphQLError::Transform(format!(
                "expected a record or a list of records, got {}",
                other
            ))),
        }
    }

    /// Materialized records sliced into a connection
    pub fn to_connection_array(&self, args: &ConnectionArgs) -> crate::Result<Connection<Value>> {
        Connection::from_array(self.to_array(), args)
    }
}

fn matches_filter(record: &Value, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(field, expected)| record.get(field) == Some(expected))
}

fn compare_records(a: &Value, b: &Value, order: &[OrderPair]) -> Ordering {
    order
        .iter()
        .map(|pair| {
            let ordering = compare_values(a.get(&pair.field), b.get(&pair.field));
            match pair.direction {
                OrderDirection::Asc => ordering,
                OrderDirection::Desc => ordering.reverse(),
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Ascending comparison; missing and null values sort last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            Some(Value::Bool(_)) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Array(_)) => 3,
            Some(Value::Object(_)) => 4,
            Some(Value::Null) | None => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(records: &[Value], field: &str) -> Vec<Value> {
        records.iter().map(|r| r[field].clone()).collect()
    }

    #[test]
    fn test_defaults_return_everything() {
        let filter = QueryFilter::new(json!([{"a": 1}, {"a": 2}, {"a": 3}]));
        assert_eq!(filter.spec().limit, DEFAULT_LIMIT);
        assert_eq!(filter.to_array().len(), 3);
    }

    #[test]
    fn test_order_by_sorts_ascending() {
        let filter = QueryFilter::new(json!([
            {"n": "a", "v": 3},
            {"n": "b", "v": 1},
            {"n": "c", "v": 2}
        ]))
        .order_by("v", "asc".parse().unwrap());

        assert_eq!(values(&filter.to_array(), "v"), [json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_order_filter_and_window_compose() {
        let records = json!([
            {"id": 1, "team": "red", "score": 10},
            {"id": 2, "team": "blue", "score": 30},
            {"id": 3, "team": "red", "score": 20},
            {"id": 4, "team": "red", "score": 40}
        ]);
        let filter = QueryFilter::new(records)
            .order_by("score", OrderDirection::Desc)
            .filter(json!({"team": "red"}))
            .window(2, 0);

        assert_eq!(values(&filter.to_array(), "id"), [json!(4), json!(3)]);
    }

    #[test]
    fn test_order_by_keeps_priority_and_replaces_same_field() {
        let filter = QueryFilter::new(Value::Null)
            .order_by("team", OrderDirection::Asc)
            .order_by("score", OrderDirection::Asc)
            .order_by("team", OrderDirection::Desc);

        assert_eq!(
            filter.spec().order_by,
            vec![OrderPair::desc("team"), OrderPair::asc("score")]
        );
    }

    #[test]
    fn test_secondary_key_breaks_ties() {
        let filter = QueryFilter::new(json!([
            {"id": 1, "team": "red", "score": 1},
            {"id": 2, "team": "blue", "score": 2},
            {"id": 3, "team": "red", "score": 3}
        ]))
        .order_by("team", OrderDirection::Asc)
        .order_by("score", OrderDirection::Desc);

        assert_eq!(values(&filter.to_array(), "id"), [json!(2), json!(3), json!(1)]);
    }

    #[test]
    fn test_missing_fields_sort_last() {
        let filter = QueryFilter::new(json!([{"id": 1}, {"id": 2, "v": 5}, {"id": 3, "v": 1}]))
            .order_by("v", OrderDirection::Asc);
        assert_eq!(values(&filter.to_array(), "id"), [json!(3), json!(2), json!(1)]);
    }

    #[test]
    fn test_filter_merges_and_overrides() {
        let filter = QueryFilter::new(Value::Null)
            .filter(json!({"team": "red", "active": true}))
            .filter(json!({"team": "blue"}));

        assert_eq!(filter.spec().filter.get("team"), Some(&json!("blue")));
        assert_eq!(filter.spec().filter.get("active"), Some(&json!(true)));
    }

    #[test]
    fn test_filter_if() {
        let skipped = QueryFilter::new(Value::Null).filter_if(false, json!({"a": 1}));
        assert!(skipped.spec().filter.is_empty());

        let applied = QueryFilter::new(Value::Null).filter_if(true, json!({"a": 1}));
        assert_eq!(applied.spec().filter.len(), 1);
    }

    #[test]
    fn test_when_only_skips_absent_values() {
        let mut called = false;
        let base = QueryFilter::new(json!([{"a": 1}]));
        let unchanged = base.clone().when(None::<i64>, |q, _| {
            called = true;
            q.limit(Some(1))
        });
        assert!(!called);
        assert_eq!(unchanged.spec(), base.spec());

        let zero = base.clone().when(Some(0), |q, v| q.filter(json!({"a": v})));
        assert_eq!(zero.spec().filter.get("a"), Some(&json!(0)));

        let falsy = base.when(Some(false), |q, v| q.filter(json!({"archived": v})));
        assert_eq!(falsy.spec().filter.get("archived"), Some(&json!(false)));
    }

    #[test]
    fn test_limit_ignores_zero_and_none() {
        let filter = QueryFilter::new(Value::Null).limit(None).limit(Some(0));
        assert_eq!(filter.spec().limit, DEFAULT_LIMIT);
        assert_eq!(filter.limit(Some(5)).spec().limit, 5);
    }

    #[test]
    fn test_from_args() {
        let args: FilterArgs = serde_json::from_value(json!({
            "filter": {"team": "red"},
            "orderBy": ["score", "DESC"],
            "offset": 2
        }))
        .unwrap();
        let filter = QueryFilter::new(json!([
            {"team": "red", "score": 1},
            {"team": "red", "score": 3},
            {"team": "blue", "score": 9},
            {"team": "red", "score": 2}
        ]))
        .from_args(&args);

        assert_eq!(filter.spec().limit, 2);
        assert_eq!(
            values(&filter.to_array(), "score"),
            [json!(3), json!(2)]
        );
    }

    #[test]
    fn test_from_args_without_filter() {
        let filter = QueryFilter::new(json!([{"a": 1}])).from_args(&FilterArgs::default());
        assert!(filter.spec().filter.is_empty());
        assert!(filter.spec().order_by.is_empty());
        assert_eq!(filter.spec().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_to_array_wraps_single_record() {
        let filter = QueryFilter::new(json!({"id": 1}));
        assert_eq!(filter.to_array(), vec![json!({"id": 1})]);
    }

    #[test]
    fn test_to_array_leaves_source_untouched() {
        let filter = QueryFilter::new(json!([{"v": 2}, {"v": 1}])).order_by("v", OrderDirection::Asc);
        filter.to_array();
        assert_eq!(filter.results, json!([{"v": 2}, {"v": 1}]));
    }

    #[test]
    fn test_to_object() {
        let single = QueryFilter::new(json!({"id": 1}));
        assert_eq!(single.to_object().unwrap(), json!({"id": 1}));

        let list = QueryFilter::new(json!([{"id": 1, "t": "x"}, {"id": 2, "t": "y"}]))
            .filter(json!({"t": "y"}));
        assert_eq!(list.to_object().unwrap(), json!({"id": 2, "t": "y"}));

        let none = QueryFilter::new(json!([])).filter(json!({"t": "z"}));
        assert_eq!(none.to_object().unwrap(), json!({}));

        let scalar = QueryFilter::new(json!(7));
        assert!(matches!(scalar.to_object(), Err(GraphQLError::Transform(_))));
    }

    #[test]
    fn test_to_connection_array() {
        let filter = QueryFilter::new(json!([
            {"id": "c", "v": 3},
            {"id": "a", "v": 1},
            {"id": "b", "v": 2}
        ]))
        .order_by("v", OrderDirection::Asc);

        let conn = filter.to_connection_array(&ConnectionArgs::first(2)).unwrap();
        assert_eq!(conn.edges.len(), 2);
        assert_eq!(conn.edges[0].node["id"], json!("a"));
        assert!(conn.page_info.has_next_page);
    }
}
