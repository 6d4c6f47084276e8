//! Connection configuration

use serde::Deserialize;

use crate::filter::DEFAULT_LIMIT;
use crate::types::{OrderDirection, OrderPair};
use crate::GraphQLError;

/// Defaults for [`crate::FilterSpec`]
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FilteringConfig {
    pub limit: usize,
}

impl Default for FilteringConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One symbolic `orderBy` value
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OrderEnumValue {
    pub name: String,
    pub field: String,
    #[serde(default)]
    pub direction: OrderDirection,
}

/// Per-connection configuration
///
/// Every field has a named default; a partial document only overrides the
/// fields it names.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    pub name: String,
    /// Order enum values, the first one being the default order.
    pub order_by: Option<Vec<OrderEnumValue>>,
    pub filtering: FilteringConfig,
}

impl ConnectionConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| GraphQLError::Config(e.to_string()))
    }

    pub fn with_order(mut self, name: impl Into<String>, pair: OrderPair) -> Self {
        self.order_by.get_or_insert_with(Vec::new).push(OrderEnumValue {
            name: name.into(),
            field: pair.field,
            direction: pair.direction,
        });
        self
    }
}

/// Symbolic order names mapped to sort keys, built once per connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEnum {
    type_name: String,
    values: Vec<(String, OrderPair)>,
}

impl OrderEnum {
    /// Build from configuration; without configured values the only
    /// value is `ID => (id, ASC)`.
    pub fn from_config(config: &ConnectionConfig) -> crate::Result<Self> {
        let type_name = format!("{}ConnectionOrder", config.name);
        let values = match &config.order_by {
            None => vec![("ID".to_string(), OrderPair::asc("id"))],
            Some(values) if values.is_empty() => {
                return Err(GraphQLError::Config(format!(
                    "{} has no values",
                    type_name
                )))
            }
            Some(values) => values
                .iter()
                .map(|v| {
                    (
                        v.name.clone(),
                        OrderPair::new(v.field.clone(), v.direction),
                    )
                })
                .collect(),
        };

        Ok(Self { type_name, values })
    }

    /// Order used when the client sends none
    pub fn default_order(&self) -> &OrderPair {
        &self.values[0].1
    }

    pub fn lookup(&self, name: &str) -> crate::Result<&OrderPair> {
        self.values
            .iter()
            .find(|(value_name, _)| value_name == name)
            .map(|(_, pair)| pair)
            .ok_or_else(|| {
                GraphQLError::InvalidOrder(format!("{} has no value '{}'", self.type_name, name))
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }
}
