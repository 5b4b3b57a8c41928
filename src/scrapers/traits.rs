use crate::error::StrategyError;
use crate::models::{Listing, SearchRequest, Source};
use async_trait::async_trait;

/// Common contract for all extraction strategies. The orchestrator only ever
/// sees this trait; which concrete channel produced a listing is recorded on
/// the listing's `source` tag.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Try to extract listings for the request. Zero listings is a valid
    /// outcome; fatal conditions surface as a [`StrategyError`].
    async fn attempt(&self, request: &SearchRequest) -> Result<Vec<Listing>, StrategyError>;

    /// Which source tag this strategy stamps on its listings.
    fn source(&self) -> Source;

    fn name(&self) -> &'static str {
        self.source().tag()
    }
}
