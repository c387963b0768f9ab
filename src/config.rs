//! Engine configuration.
//!
//! Only options that change the objectives' arithmetic live here; everything
//! else (which moves to try, how many passes, where results go) belongs to
//! the driver.

/// Options consumed by [`Objective::init`](crate::objective::Objective::init).
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of meta-data dimensions carried per node. Only the first
    /// dimension participates in the meta objective; the rest are reserved.
    pub num_meta_data_dimensions: u32,
    /// Non-negative multiplier on the categorical entropy term.
    pub meta_data_rate: f64,
    /// Seed meta bags with the node's flow instead of unit weight.
    pub weight_by_flow: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_meta_data_dimensions: 0,
            meta_data_rate: 1.0,
            weight_by_flow: true,
        }
    }
}
