//! Relay connection assembly
//!
//! A request runs in two phases around a single fetch. Before the fetch the
//! pagination arguments are turned into [`FetchOptions`]: window bounds from
//! `first`/`last` and the anchor cursor, plus the primary sort key, flipped
//! when paginating backward. After the fetch every record becomes an edge whose
//! cursor keeps counting from the anchor's position, and the page flags are
//! derived from the window and the total count.

use async_graphql::Object;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use crate::config::{ConnectionConfig, FilteringConfig, OrderEnum};
use crate::filter::{FilterSpec, QueryFilter};
use crate::loader::{FetchOptions, FetchResult, ResultLoader};
use crate::pagination::{Connection, ConnectionArgs, CursorCodec, DecodedCursor, Edge, PageInfo};
use crate::types::{Node, OrderBy, OrderPair};
use crate::GraphQLError;

/// Window a fetch was issued for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowMeta {
    pub offset: Option<usize>,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageFlags {
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Turn a fetched record into an edge.
///
/// Without an anchor the cursor carries `local_index`. With one it carries
/// `anchor.index + local_index + 1`, so a continued page never emits index 0.
/// An anchor too close to `usize::MAX` to continue from is malformed.
pub fn resolve_edge<T: Node, S>(
    record: T,
    local_index: usize,
    anchor: Option<&DecodedCursor>,
    source: S,
) -> crate::Result<Edge<T, S>> {
    let index = match anchor {
        Some(anchor) => anchor
            .index
            .checked_add(local_index)
            .and_then(|index| index.checked_add(1))
            .ok_or_else(|| {
                GraphQLError::MalformedCursor(format!("index {} is out of range", anchor.index))
            })?,
        None => local_index,
    };

    let id = record.cursor_id();
    trace!(id = %id, index, "resolved edge");

    Ok(Edge {
        cursor: CursorCodec::encode(&id, index),
        node: record,
        source,
    })
}

/// Page flags for a fetched window.
///
/// With `limit = offset - index` and `requested = (index + 1) * limit`, there
/// is a next page when `requested` is below the total count and a previous
/// page when `requested` exceeds `limit`. No window means no flags, and an
/// empty result counts as a total of zero. Without a total count the
/// `fullCount` hint on the first record is used.
pub fn compute_page_info<T: Node>(result: &FetchResult<T>, window: WindowMeta) -> PageFlags {
    let full_count = if result.is_empty() {
        Some(0)
    } else {
        result
            .total_count
            .or_else(|| result.records.first().and_then(Node::count_hint))
    };

    let Some(offset) = window.offset.filter(|offset| *offset > 0) else {
        return PageFlags::default();
    };

    let limit = offset.saturating_sub(window.index) as u64;
    let requested = (window.index as u64).saturating_add(1).saturating_mul(limit);

    PageFlags {
        has_next_page: full_count.is_some_and(|count| requested < count),
        has_previous_page: requested > limit,
    }
}

/// Shape fetched records into a connection.
///
/// Backward pages are fetched in reversed order; edges are numbered in fetch
/// order and then flipped so they render in the connection's own order, with
/// the page flags swapped to match.
pub fn assemble_connection<T: Node, S: Clone>(
    result: FetchResult<T>,
    window: WindowMeta,
    args: ConnectionArgs,
    source: S,
) -> crate::Result<ConnectionResult<T, S>> {
    let anchor = args.cursor().map(CursorCodec::decode).transpose()?;
    let mut flags = compute_page_info(&result, window);

    let mut edges = result
        .records
        .into_iter()
        .enumerate()
        .map(|(position, record)| resolve_edge(record, position, anchor.as_ref(), source.clone()))
        .collect::<crate::Result<Vec<Edge<T, S>>>>()?;

    if args.is_backward() {
        edges.reverse();
        flags = PageFlags {
            has_next_page: flags.has_previous_page,
            has_previous_page: flags.has_next_page,
        };
    }

    debug!(
        edges = edges.len(),
        has_next_page = flags.has_next_page,
        has_previous_page = flags.has_previous_page,
        "assembled connection"
    );

    Ok(ConnectionResult {
        source,
        connection: Some(Connection::new(
            edges,
            flags.has_next_page,
            flags.has_previous_page,
        )),
        args,
    })
}

/// Resolved connection field
///
/// `connection` is `None` when edges were not requested and no fetch ran.
#[derive(Debug, Clone)]
pub struct ConnectionResult<T, S = ()> {
    pub source: S,
    pub args: ConnectionArgs,
    pub connection: Option<Connection<T, S>>,
}

impl<T, S> ConnectionResult<T, S> {
    pub fn edges(&self) -> Option<&[Edge<T, S>]> {
        self.connection.as_ref().map(|c| c.edges.as_slice())
    }

    pub fn page_info(&self) -> Option<&PageInfo> {
        self.connection.as_ref().map(|c| &c.page_info)
    }
}

#[Object]
impl<T: async_graphql::OutputType + 'static, S: Send + Sync + 'static> ConnectionResult<T, S> {
    #[graphql(name = "edges")]
    async fn resolved_edges(&self) -> Option<&[Edge<T, S>]> {
        self.edges()
    }

    #[graphql(name = "pageInfo")]
    async fn resolved_page_info(&self) -> Option<&PageInfo> {
        self.page_info()
    }
}

/// Were edges selected for this field?
pub trait EdgeSelection {
    fn edges_requested(&self) -> bool;
}

impl EdgeSelection for bool {
    fn edges_requested(&self) -> bool {
        *self
    }
}

impl<'a> EdgeSelection for async_graphql::Context<'a> {
    fn edges_requested(&self) -> bool {
        self.look_ahead().field("edges").exists()
    }
}

/// Per-connection customization around the fetch
///
/// `C` is the caller's request context.
pub trait ConnectionHooks<C: ?Sized>: Send + Sync {
    /// Adjust fetch options once they are computed.
    fn before(
        &self,
        options: FetchOptions,
        _args: &ConnectionArgs,
        _ctx: &C,
    ) -> crate::Result<FetchOptions> {
        Ok(options)
    }

    /// Shape the fetched records.
    fn after<T: Node, S: Clone>(
        &self,
        result: FetchResult<T>,
        window: WindowMeta,
        args: ConnectionArgs,
        source: S,
        _ctx: &C,
    ) -> crate::Result<ConnectionResult<T, S>> {
        assemble_connection(result, window, args, source)
    }
}

/// Hooks that change nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl<C: ?Sized> ConnectionHooks<C> for DefaultHooks {}

/// Cursor-paginated connection over one node type
#[derive(Debug, Clone)]
pub struct RelayConnection<H = DefaultHooks> {
    name: String,
    order: OrderEnum,
    filtering: FilteringConfig,
    hooks: H,
}

impl RelayConnection<DefaultHooks> {
    pub fn from_config(config: &ConnectionConfig) -> crate::Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            order: OrderEnum::from_config(config)?,
            filtering: config.filtering.clone(),
            hooks: DefaultHooks,
        })
    }
}

impl<H> RelayConnection<H> {
    pub fn with_hooks<N>(self, hooks: N) -> RelayConnection<N> {
        RelayConnection {
            name: self.name,
            order: self.order,
            filtering: self.filtering,
            hooks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order_enum(&self) -> &OrderEnum {
        &self.order
    }

    pub fn filtering(&self) -> &FilteringConfig {
        &self.filtering
    }

    /// Query filter over `results` seeded with this connection's defaults
    pub fn query_filter(&self, results: Value) -> QueryFilter {
        QueryFilter::with_spec(results, FilterSpec::from_config(&self.filtering))
    }

    /// Primary sort key for the requested `orderBy`
    pub fn resolve_order(&self, order_by: Option<&OrderBy>) -> crate::Result<OrderPair> {
        match order_by {
            None => Ok(self.order.default_order().clone()),
            Some(OrderBy::Named(name)) => self.order.lookup(name).cloned(),
            Some(OrderBy::Pairs(pairs)) => pairs
                .first()
                .cloned()
                .ok_or_else(|| GraphQLError::InvalidOrder("orderBy has no sort keys".to_string())),
        }
    }

    /// Pre-fetch phase
    pub fn compute_fetch_options<C: ?Sized>(
        &self,
        args: &ConnectionArgs,
        ctx: &C,
    ) -> crate::Result<FetchOptions>
    where
        H: ConnectionHooks<C>,
    {
        args.validate()?;

        let mut options = FetchOptions::default();
        if let Some(window) = args.window_size() {
            options.count = true;
            match args.cursor() {
                Some(cursor) => {
                    let anchor = CursorCodec::decode(cursor)?;
                    let offset = window.checked_add(anchor.index).ok_or_else(|| {
                        GraphQLError::MalformedCursor(format!(
                            "index {} is out of range",
                            anchor.index
                        ))
                    })?;
                    options.offset = Some(offset);
                    options.index = anchor.index;
                    options.cursor = Some(anchor);
                }
                None => {
                    options.offset = Some(window);
                    options.index = 0;
                }
            }
        }

        let primary = self.resolve_order(args.order_by.as_ref())?;
        let direction = if args.is_backward() {
            primary.direction.reversed()
        } else {
            primary.direction
        };
        options.order = Some(OrderPair::new(primary.field, direction));

        debug!(
            offset = ?options.offset,
            index = options.index,
            order = ?options.order,
            "computed fetch options"
        );

        self.hooks.before(options, args, ctx)
    }

    /// Resolve a connection field: gate, pre-fetch, fetch, post-fetch.
    #[instrument(skip_all, fields(connection = %self.name))]
    pub async fn resolve<T, S, C, E, L>(
        &self,
        source: S,
        args: ConnectionArgs,
        ctx: &C,
        selection: &E,
        loader: &L,
    ) -> crate::Result<ConnectionResult<T, S>>
    where
        T: Node,
        S: Clone,
        C: ?Sized,
        E: EdgeSelection + ?Sized,
        L: ResultLoader<T> + ?Sized,
        H: ConnectionHooks<C>,
    {
        if !selection.edges_requested() {
            debug!("edges not requested, skipping fetch");
            return Ok(ConnectionResult {
                source,
                args,
                connection: None,
            });
        }

        let options = self.compute_fetch_options(&args, ctx)?;
        let window = options.window();
        let result = loader.load(&options).await?;
        debug!(
            records = result.len(),
            total = ?result.total_count,
            "fetched records"
        );

        self.hooks.after(result, window, args, source, ctx)
    }
}
