use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub safe_run: SafeRunConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Check-mode indicator polls.
    #[serde(default = "default_check_ms")]
    pub check_ms: u64,
    /// Post-action `waitFor` indicators and element visibility waits.
    #[serde(default = "default_action_wait_ms")]
    pub action_wait_ms: u64,
    #[serde(default = "default_page_ready_ms")]
    pub page_ready_ms: u64,
    /// Page loads, quiescence waits and post-login navigation.
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,
    /// Upper bound for a single resolver strategy.
    #[serde(default = "default_strategy_ms")]
    pub strategy_ms: u64,
}

impl TimeoutConfig {
    pub fn check(&self) -> Duration {
        Duration::from_millis(self.check_ms)
    }

    pub fn action_wait(&self) -> Duration {
        Duration::from_millis(self.action_wait_ms)
    }

    pub fn page_ready(&self) -> Duration {
        Duration::from_millis(self.page_ready_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn strategy(&self) -> Duration {
        Duration::from_millis(self.strategy_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            check_ms: default_check_ms(),
            action_wait_ms: default_action_wait_ms(),
            page_ready_ms: default_page_ready_ms(),
            navigation_ms: default_navigation_ms(),
            strategy_ms: default_strategy_ms(),
        }
    }
}

fn default_check_ms() -> u64 {
    2000
}

fn default_action_wait_ms() -> u64 {
    10000
}

fn default_page_ready_ms() -> u64 {
    30000
}

fn default_navigation_ms() -> u64 {
    30000
}

fn default_strategy_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    #[serde(default = "default_typing_enabled")]
    pub enabled: bool,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            enabled: default_typing_enabled(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_typing_enabled() -> bool {
    true
}

fn default_min_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    150
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
    /// Failed rows are captured here as `row-<index>.png` when set.
    #[serde(default)]
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            permissions: default_permissions(),
            executable: None,
            user_data_dir: None,
            screenshot_dir: None,
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_permissions() -> Vec<String> {
    vec!["geolocation".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_button_scan_limit")]
    pub button_scan_limit: usize,
    #[serde(default = "default_icon_selectors")]
    pub icon_selectors: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            button_scan_limit: default_button_scan_limit(),
            icon_selectors: default_icon_selectors(),
        }
    }
}

fn default_button_scan_limit() -> usize {
    50
}

fn default_icon_selectors() -> Vec<String> {
    [
        "i",
        "svg",
        ".fa",
        ".fas",
        ".far",
        ".material-icons",
        ".glyphicon",
        ".bi",
        "[class*=\"icon\"]",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeRunConfig {
    /// Case-insensitive substrings that mark a click target as a submission.
    #[serde(default = "default_safe_run_keywords")]
    pub keywords: Vec<String>,
}

impl Default for SafeRunConfig {
    fn default() -> Self {
        Self {
            keywords: default_safe_run_keywords(),
        }
    }
}

fn default_safe_run_keywords() -> Vec<String> {
    ["submit", "kirim", "simpan", "save", "send"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Extra data keys masked in formatted output, on top of the built-in list.
    #[serde(default)]
    pub sensitive_fields: Vec<String>,
}
