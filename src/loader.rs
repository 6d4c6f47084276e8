//! Data layer seam
//!
//! The connection engine computes [`FetchOptions`], hands them to a
//! [`ResultLoader`] and shapes whatever [`FetchResult`] comes back.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::FilteringConfig;
use crate::filter::{FilterSpec, QueryFilter};
use crate::pagination::DecodedCursor;
use crate::relay::WindowMeta;
use crate::types::OrderPair;

/// Options handed to the data layer for one fetch
///
/// With an anchor cursor the window starts right after the anchor, so
/// `index + 1` records are skipped; without one nothing is skipped. At most
/// `offset - index` records are returned.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Whether the total match count should be returned.
    pub count: bool,
    pub offset: Option<usize>,
    pub index: usize,
    /// Primary sort key, direction already flipped for backward pagination.
    pub order: Option<OrderPair>,
    #[serde(skip)]
    pub cursor: Option<DecodedCursor>,
}

impl FetchOptions {
    /// Records requested, if a window was requested at all
    pub fn limit(&self) -> Option<usize> {
        self.offset.map(|offset| offset.saturating_sub(self.index))
    }

    /// Records to skip in the ordered set before the window starts
    pub fn skip(&self) -> usize {
        match self.cursor {
            Some(_) => self.index.saturating_add(1),
            None => 0,
        }
    }

    pub fn window(&self) -> WindowMeta {
        WindowMeta {
            offset: self.offset,
            index: self.index,
        }
    }

    /// The order and window of these options applied on top of `base`.
    pub fn to_filter_spec(&self, base: FilterSpec) -> FilterSpec {
        let mut spec = base;
        if let Some(order) = &self.order {
            spec.order_by.retain(|pair| pair.field != order.field);
            spec.order_by.insert(0, order.clone());
        }
        spec.offset = self.offset;
        spec.index = self.index;
        spec
    }
}

/// Records returned by the data layer
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult<T> {
    pub records: Vec<T>,
    /// Total matches ignoring the window, when counting was requested.
    pub total_count: Option<u64>,
}

impl<T> FetchResult<T> {
    pub fn new(records: Vec<T>, total_count: Option<u64>) -> Self {
        Self {
            records,
            total_count,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Data layer executing one fetch
#[async_trait]
pub trait ResultLoader<T>: Send + Sync {
    /// Fetch the records described by `options`.
    ///
    /// Failures should be wrapped with [`crate::GraphQLError::fetch`]; they are
    /// returned to the caller untouched.
    async fn load(&self, options: &FetchOptions) -> crate::Result<FetchResult<T>>;
}

/// In-memory data layer over JSON records
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    records: Vec<Value>,
    filter: Map<String, Value>,
    filtering: FilteringConfig,
}

impl MemoryLoader {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Only serve records matching these equality predicates
    pub fn with_filter(mut self, predicates: Map<String, Value>) -> Self {
        self.filter.extend(predicates);
        self
    }

    /// Defaults used when no window is requested
    pub fn with_filtering(mut self, filtering: FilteringConfig) -> Self {
        self.filtering = filtering;
        self
    }
}

#[async_trait]
impl ResultLoader<Value> for MemoryLoader {
    async fn load(&self, options: &FetchOptions) -> crate::Result<FetchResult<Value>> {
        let spec = options.to_filter_spec(FilterSpec::from_config(&self.filtering));

        // Order and filter the whole set first so the count ignores the window.
        let matched = QueryFilter::with_spec(
            Value::Array(self.records.clone()),
            FilterSpec {
                limit: self.records.len(),
                offset: None,
                index: 0,
                ..spec.clone()
            },
        )
        .filter(Value::Object(self.filter.clone()))
        .to_array();
        let total = matched.len();

        let rest = matched.into_iter().skip(options.skip()).collect();
        let records = QueryFilter::with_spec(
            Value::Array(rest),
            FilterSpec {
                order_by: Vec::new(),
                filter: Map::new(),
                ..spec
            },
        )
        .to_array();

        debug!(
            matched = total,
            returned = records.len(),
            skip = options.skip(),
            "served records from memory"
        );

        Ok(FetchResult::new(
            records,
            options.count.then_some(total as u64),
        ))
    }
}
