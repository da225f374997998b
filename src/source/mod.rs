pub mod dexscreener;

use crate::error::FetchError;
use async_trait::async_trait;

/// Abstraction for valuation sources (DexScreener, test fakes, etc.)
#[async_trait]
pub trait ValuationSource: Send + Sync {
    /// One best-effort attempt, no retries. Any failure comes back as an
    /// `Err`, never as a panic.
    async fn fetch_valuation(&self, asset_id: &str) -> Result<f64, FetchError>;
}

pub use dexscreener::DexScreenerSource;
