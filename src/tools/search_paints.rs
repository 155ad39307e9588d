//! MCP `search_paints` and `filter_paints` tool parameter definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::catalog::{Environment, ProductFilters};

/// Attribute filters shared by both catalog tools.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct FilterFields {
    #[schemars(description = "Where the paint is applied: 'internal', 'external' or 'both'")]
    pub environment: Option<String>,

    #[schemars(description = "Exact finish type, e.g. 'fosco', 'acetinado', 'brilhante'")]
    pub finish_type: Option<String>,

    #[schemars(description = "Exact product line, e.g. 'Premium', 'Standard'")]
    pub product_line: Option<String>,

    #[schemars(description = "Color name or part of it (case-insensitive)")]
    pub color: Option<String>,

    #[schemars(description = "Features every result must have, e.g. ['lavável', 'antimofo']")]
    pub features: Option<Vec<String>>,

    #[schemars(description = "Surfaces every result must support, e.g. ['parede', 'madeira']")]
    pub surface_types: Option<Vec<String>>,
}

impl FilterFields {
    pub fn into_filters(self) -> Result<ProductFilters, String> {
        let environment = self
            .environment
            .map(|e| e.parse::<Environment>())
            .transpose()?;
        Ok(ProductFilters {
            environment,
            finish_type: self.finish_type,
            product_line: self.product_line,
            color: self.color,
            features: self.features.unwrap_or_default(),
            surface_types: self.surface_types.unwrap_or_default(),
        })
    }
}

/// Parameters for the `search_paints` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchPaintsParams {
    #[schemars(description = "Natural language description of what the customer needs, e.g. 'tinta azul lavável para quarto'")]
    pub query: String,

    #[schemars(description = "Maximum number of results to return (1-20). Defaults to 5.")]
    pub limit: Option<usize>,

    #[schemars(description = "Minimum relevance score 0.0-1.0. Defaults to 0.7.")]
    pub threshold: Option<f32>,

    #[serde(flatten)]
    pub filters: FilterFields,
}

/// Parameters for the `filter_paints` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FilterPaintsParams {
    #[schemars(description = "Maximum number of results to return (1-20). Defaults to 5.")]
    pub limit: Option<usize>,

    #[serde(flatten)]
    pub filters: FilterFields,
}
