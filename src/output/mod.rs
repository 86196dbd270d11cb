//! Output module for terminal reports
//!
//! This module handles:
//! - History ledger statistics
//! - Proxy pool health and ban summaries
//! - Crawl run reports and sweep plans

pub mod stats;

pub use stats::{
    history_statistics, render_history_statistics, render_pool_statistics, render_run_report,
    render_sweep_plan, HistoryStatistics,
};
