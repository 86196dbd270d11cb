//! Proxy rotation and ban bookkeeping
//!
//! # Components
//!
//! - `ProxyBanManager`: persistent ledger of banned proxies
//! - `ProxyPool`: round-robin selection with passive health tracking
//! - masking helpers that keep endpoints out of logs

mod ban;
mod masking;
mod pool;

pub use ban::{BanRecord, ProxyBanManager, BAN_DURATION_DAYS, COOLDOWN_DURATION_DAYS};
pub use masking::{mask_ip_address, mask_optional_url, mask_proxy_url};
pub use pool::{FailureOutcome, PoolStatistics, ProxyEndpoints, ProxyPool, ProxyRecord, ProxyStats};
