//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Every bounded wait used while driving a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    pub navigation_timeout: Duration,
    /// Pause after scrolling to the bottom, before probing pagination controls.
    pub bottom_scroll_delay: Duration,
    pub pre_click_delay: Duration,
    pub post_click_delay: Duration,
    /// Bound on the network-settle signal after clicking "next".
    pub network_settle_timeout: Duration,
    /// Used instead when the network-settle signal does not fire in time.
    pub fallback_settle: Duration,
    pub scroll_step: u32,
    pub scroll_interval: Duration,
    pub max_scroll_steps: usize,
    /// Pause between consecutive pages.
    pub page_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            bottom_scroll_delay: Duration::from_secs(1),
            pre_click_delay: Duration::from_millis(500),
            post_click_delay: Duration::from_secs(2),
            network_settle_timeout: Duration::from_secs(30),
            fallback_settle: Duration::from_secs(3),
            scroll_step: 100,
            scroll_interval: Duration::from_millis(100),
            max_scroll_steps: 200,
            page_delay: Duration::from_secs(2),
        }
    }
}

impl Timings {
    /// No delays at all; waits still carry a short bound.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(5),
            bottom_scroll_delay: Duration::ZERO,
            pre_click_delay: Duration::ZERO,
            post_click_delay: Duration::ZERO,
            network_settle_timeout: Duration::from_millis(50),
            fallback_settle: Duration::ZERO,
            scroll_step: 100,
            scroll_interval: Duration::ZERO,
            max_scroll_steps: 50,
            page_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    pub output_dir: PathBuf,
    pub user_agent: String,
    pub timings: Timings,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timings: Timings::default(),
        }
    }
}

/// Loads configuration from the process environment, after reading `.env`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] when a numeric variable does not parse.
pub fn load_config() -> Result<HarvesterConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_config(|key| std::env::var(key))
}

/// Builds configuration from an injectable lookup, so tests never touch the
/// real environment.
fn build_config<F>(lookup: F) -> Result<HarvesterConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let parse_u64 = |var: &str, default: u64| -> Result<u64, ConfigError> {
        match lookup(var) {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Ok(default),
        }
    };

    let defaults = HarvesterConfig::default();
    let output_dir = lookup("HARVEST_OUTPUT_DIR").map_or(defaults.output_dir, PathBuf::from);
    let user_agent = lookup("HARVEST_USER_AGENT").unwrap_or(defaults.user_agent);

    let timings = Timings {
        navigation_timeout: Duration::from_secs(parse_u64("HARVEST_NAVIGATION_TIMEOUT_SECS", 60)?),
        network_settle_timeout: Duration::from_secs(parse_u64(
            "HARVEST_NEXT_SETTLE_TIMEOUT_SECS",
            30,
        )?),
        page_delay: Duration::from_millis(parse_u64("HARVEST_PAGE_DELAY_MS", 2_000)?),
        max_scroll_steps: usize::try_from(parse_u64("HARVEST_MAX_SCROLL_STEPS", 200)?).map_err(
            |e| ConfigError::InvalidEnvVar {
                var: "HARVEST_MAX_SCROLL_STEPS".to_string(),
                reason: e.to_string(),
            },
        )?,
        ..defaults.timings
    };

    Ok(HarvesterConfig {
        output_dir,
        user_agent,
        timings,
    })
}
