use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetPaintDetailsParams {
    #[schemars(description = "Numeric product ID as returned by search_paints or filter_paints")]
    pub product_id: i64,
}
