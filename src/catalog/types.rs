//! Catalog type definitions.
//!
//! [`Product`] mirrors a `paint_products` row, [`ProductFilters`] is the
//! attribute-filter set accepted by search, and [`RetrievalResult`] is what
//! search hands back.

use serde::{Deserialize, Serialize};

/// Where a paint may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Internal,
    External,
    Both,
}

impl Environment {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
            Self::Both => "both",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    /// Accepts the canonical names and the Portuguese catalog labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "internal" | "interno" => Ok(Self::Internal),
            "external" | "externo" => Ok(Self::External),
            "both" | "ambos" => Ok(Self::Both),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// A paint product, matching the `paint_products` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub surface_types: Vec<String>,
    pub environment: Environment,
    pub finish_type: String,
    pub features: Vec<String>,
    pub product_line: String,
    pub price: Option<f64>,
    pub ai_summary: Option<String>,
    pub usage_tags: Vec<String>,
    /// Present only after the backfill job has indexed the product.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Product {
    /// Text the embedding for this product is computed from.
    ///
    /// Stable for a given product so re-running backfill reproduces the same input.
    pub fn document_text(&self) -> String {
        let mut parts = vec![
            format!("Product: {}", self.name),
            format!("Color: {}", self.color),
            format!("Environment: {}", self.environment),
            format!("Finish: {}", self.finish_type),
            format!("Product Line: {}", self.product_line),
        ];
        if !self.surface_types.is_empty() {
            parts.push(format!("Surface Types: {}", self.surface_types.join(", ")));
        }
        if !self.features.is_empty() {
            parts.push(format!("Features: {}", self.features.join(", ")));
        }
        if let Some(summary) = self.ai_summary.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("Summary: {summary}"));
        }
        if !self.usage_tags.is_empty() {
            parts.push(format!("Usage Tags: {}", self.usage_tags.join(", ")));
        }
        parts.join("\n")
    }
}

/// A product as written by the catalog write path (import, seeding).
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub surface_types: Vec<String>,
    pub environment: Environment,
    pub finish_type: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub product_line: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub usage_tags: Vec<String>,
}

/// Attribute filters. Every populated field must match (AND semantics).
///
/// - `environment`, `finish_type`, `product_line`: exact match
/// - `color`: case-insensitive substring
/// - `features`, `surface_types`: the product must contain each requested value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilters {
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub finish_type: Option<String>,
    #[serde(default)]
    pub product_line: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub surface_types: Vec<String>,
}

impl ProductFilters {
    pub fn is_empty(&self) -> bool {
        self.environment.is_none()
            && self.finish_type.is_none()
            && self.product_line.is_none()
            && self.color.is_none()
            && self.features.is_empty()
            && self.surface_types.is_empty()
    }

    /// Reject blank filter values. Runs before any store or provider call.
    pub fn validate(&self) -> Result<(), String> {
        let scalars = [
            ("finish_type", &self.finish_type),
            ("product_line", &self.product_line),
            ("color", &self.color),
        ];
        for (name, value) in scalars {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(format!("{name} filter must not be blank"));
            }
        }
        if self.features.iter().any(|f| f.trim().is_empty()) {
            return Err("features filter must not contain blank values".into());
        }
        if self.surface_types.iter().any(|s| s.trim().is_empty()) {
            return Err("surface_types filter must not contain blank values".into());
        }
        Ok(())
    }

    /// Short human-readable list of applied filters, for logs.
    pub fn describe(&self) -> Vec<String> {
        let mut applied = Vec::new();
        if let Some(env) = self.environment {
            applied.push(format!("environment={env}"));
        }
        if let Some(ref v) = self.finish_type {
            applied.push(format!("finish_type={v}"));
        }
        if let Some(ref v) = self.product_line {
            applied.push(format!("product_line={v}"));
        }
        if let Some(ref v) = self.color {
            applied.push(format!("color~{v}"));
        }
        applied.extend(self.features.iter().map(|f| format!("feature={f}")));
        applied.extend(self.surface_types.iter().map(|s| format!("surface={s}")));
        applied
    }
}

/// How a search request is executed. Chosen purely from the request inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Query text, no filters: rank every embedded product by similarity.
    Semantic,
    /// Filters, no query text: database filtering, uniform score.
    Filter,
    /// Query text and filters: similarity ranking constrained by the filters.
    Hybrid,
    /// Neither: an unranked page of the catalog.
    Browse,
}

impl SearchMode {
    pub fn select(query: &str, filters: &ProductFilters) -> Self {
        match (query.trim().is_empty(), filters.is_empty()) {
            (false, true) => Self::Semantic,
            (true, false) => Self::Filter,
            (false, false) => Self::Hybrid,
            (true, true) => Self::Browse,
        }
    }

    /// Whether this mode needs a query embedding.
    pub fn is_ranked(&self) -> bool {
        matches!(self, Self::Semantic | Self::Hybrid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Filter => "filter",
            Self::Hybrid => "hybrid",
            Self::Browse => "browse",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product projection plus its relevance score in `[0, 1]`.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    #[serde(flatten)]
    pub product: Product,
    pub relevance_score: f32,
}
