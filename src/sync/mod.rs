// ============================================================================
// Realtime Sync
// ============================================================================
//
// Live order feeds with graceful degradation. The happy path is a store
// subscription (filtered by who is watching, newest first); when the store
// cannot serve that subscription the feed drops to one-shot fetches and says
// so, instead of rendering a dead screen.
//
// ============================================================================

pub mod live_query;

pub use live_query::{FeedPhase, FeedSnapshot, OrderFeed, OrderScope, SyncWarning};
