use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub trust: TrustPolicy,
    #[serde(default)]
    pub engagement: EngagementPolicy,
    #[serde(default)]
    pub deals: DealPolicy,
    #[serde(default)]
    pub feed: FeedPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Expiry sweep cadence.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Local hour (0-23) at which the daily selection fires.
    #[serde(default = "default_selection_hour")]
    pub daily_selection_hour: u32,
}

fn default_sweep_interval() -> u64 {
    300
}
fn default_selection_hour() -> u32 {
    19
}

/// Trust-score thresholds. Scores live in [0, 100]; a new merchant starts
/// mid-range, comfortably above both the publish gate and the block floor.
#[derive(Debug, Deserialize, Clone)]
pub struct TrustPolicy {
    #[serde(default = "default_initial_score")]
    pub initial_score: i32,
    #[serde(default = "default_block_threshold")]
    pub block_threshold: i32,
    #[serde(default = "default_publish_threshold")]
    pub publish_threshold: i32,
    #[serde(default = "default_feed_threshold")]
    pub feed_threshold: i32,
    #[serde(default = "default_flag_threshold")]
    pub flag_threshold: i32,
}

fn default_initial_score() -> i32 {
    50
}
fn default_block_threshold() -> i32 {
    15
}
fn default_publish_threshold() -> i32 {
    25
}
fn default_feed_threshold() -> i32 {
    30
}
fn default_flag_threshold() -> i32 {
    40
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            initial_score: default_initial_score(),
            block_threshold: default_block_threshold(),
            publish_threshold: default_publish_threshold(),
            feed_threshold: default_feed_threshold(),
            flag_threshold: default_flag_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngagementPolicy {
    #[serde(default = "default_view_threshold")]
    pub view_bonus_threshold: i64,
    #[serde(default = "default_save_threshold")]
    pub save_bonus_threshold: i64,
    /// Reports at which a listing is auto-hidden.
    #[serde(default = "default_auto_hide_reports")]
    pub auto_hide_reports: i32,
}

fn default_view_threshold() -> i64 {
    100
}
fn default_save_threshold() -> i64 {
    20
}
fn default_auto_hide_reports() -> i32 {
    3
}

impl Default for EngagementPolicy {
    fn default() -> Self {
        Self {
            view_bonus_threshold: default_view_threshold(),
            save_bonus_threshold: default_save_threshold(),
            auto_hide_reports: default_auto_hide_reports(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DealPolicy {
    #[serde(default = "default_min_deal_discount")]
    pub min_discount: f64,
    #[serde(default = "default_max_deal_reports")]
    pub max_reports: i32,
    #[serde(default = "default_deal_trust")]
    pub min_trust: i32,
    #[serde(default = "default_deal_window_days")]
    pub window_days: i64,
    #[serde(default = "default_selection_size")]
    pub selection_size: usize,
}

fn default_min_deal_discount() -> f64 {
    30.0
}
fn default_max_deal_reports() -> i32 {
    2
}
fn default_deal_trust() -> i32 {
    50
}
fn default_deal_window_days() -> i64 {
    3
}
fn default_selection_size() -> usize {
    5
}

impl Default for DealPolicy {
    fn default() -> Self {
        Self {
            min_discount: default_min_deal_discount(),
            max_reports: default_max_deal_reports(),
            min_trust: default_deal_trust(),
            window_days: default_deal_window_days(),
            selection_size: default_selection_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedPolicy {
    #[serde(default = "default_page_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

fn default_page_limit() -> u32 {
    20
}
fn default_max_limit() -> u32 {
    100
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Environment-specific file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `SOUQ__DATABASE__URL=...` overrides the database url
            .add_source(config::Environment::with_prefix("SOUQ").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
