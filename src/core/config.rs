//! Settings: `<store>/config.toml` plus environment overrides, and the
//! integration catalog that lives in the same file.
//!
//! A missing file is not an error; every field has a default. A file that
//! exists but does not parse is, and it is reported before the store is
//! touched.

use crate::core::error::QuorumError;
use crate::core::schemas::CONFIG_FILE_NAME;
use colored::Colorize;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

pub const HOME_ENV: &str = "QUORUM_HOME";
/// Longest accepted lookback, ten years.
pub const MAX_LOOKBACK_HOURS: u32 = 24 * 3650;
pub const ORACLE_URL_ENV: &str = "QUORUM_ORACLE_URL";
pub const ORACLE_MODEL_ENV: &str = "QUORUM_ORACLE_MODEL";
pub const DEFAULT_STORE_DIR: &str = ".quorum";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            url: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            timeout_secs: 120,
            max_tokens: 4096,
        }
    }
}

/// Ordered critique severity. Anything unrecognized reads as `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    pub connector_min_confidence: f64,
    pub executor_min_confidence: f64,
    pub opportunist_min_confidence: f64,
    pub strategist_min_confidence: f64,
    pub devils_advocate_min_severity: Severity,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            connector_min_confidence: 0.5,
            executor_min_confidence: 0.5,
            opportunist_min_confidence: 0.5,
            strategist_min_confidence: 0.5,
            devils_advocate_min_severity: Severity::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub stale_after_days: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            stale_after_days: crate::core::tasks::DEFAULT_STALE_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    pub enabled: bool,
    pub description: String,
    pub benefit: String,
    /// Agents allowed to use this integration.
    pub agents: Vec<String>,
    /// Environment variable that must be set for the integration to work.
    pub env_var: Option<String>,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationIssue {
    pub integration: String,
    pub issue: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationStatus {
    Active,
    Misconfigured,
    Disabled,
}

/// Integrations keyed by name, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Integrations(pub BTreeMap<String, IntegrationSettings>);

impl Integrations {
    pub fn enabled(&self) -> impl Iterator<Item = (&String, &IntegrationSettings)> {
        self.0.iter().filter(|(_, i)| i.enabled)
    }

    pub fn for_agent<'a>(
        &'a self,
        agent: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a IntegrationSettings)> + 'a {
        self.enabled()
            .filter(move |(_, i)| i.agents.iter().any(|a| a == agent))
    }

    /// Enabled integrations whose required environment variable is unset.
    pub fn validate_with<F>(&self, lookup: F) -> Vec<IntegrationIssue>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.enabled()
            .filter_map(|(name, i)| {
                let var = i.env_var.as_deref()?;
                let present = lookup(var).is_some_and(|v| !v.is_empty());
                (!present).then(|| IntegrationIssue {
                    integration: name.clone(),
                    issue: format!("Missing environment variable: {var}"),
                    instructions: i.instructions.clone(),
                })
            })
            .collect()
    }

    pub fn validate(&self) -> Vec<IntegrationIssue> {
        self.validate_with(|k| std::env::var(k).ok())
    }

    pub fn status_with<F>(&self, name: &str, lookup: F) -> Option<IntegrationStatus>
    where
        F: Fn(&str) -> Option<String>,
    {
        let integration = self.0.get(name)?;
        if !integration.enabled {
            return Some(IntegrationStatus::Disabled);
        }
        let broken = self
            .validate_with(lookup)
            .iter()
            .any(|i| i.integration == name);
        Some(if broken {
            IntegrationStatus::Misconfigured
        } else {
            IntegrationStatus::Active
        })
    }

    /// Enabled and fully configured.
    pub fn available(&self, name: &str) -> bool {
        self.status_with(name, |k| std::env::var(k).ok()) == Some(IntegrationStatus::Active)
    }

    /// Human-readable status table followed by any issues.
    pub fn render_status<F>(&self, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String> + Copy,
    {
        let mut out = String::new();
        out.push_str(&format!("{:<15} {:<15} {}\n", "Integration", "Status", "Benefit"));
        out.push_str(&format!("{} {} {}\n", "-".repeat(15), "-".repeat(15), "-".repeat(50)));
        for (name, integration) in &self.0 {
            let status = match self.status_with(name, lookup) {
                Some(IntegrationStatus::Active) => format!("{:<15}", "ACTIVE").green(),
                Some(IntegrationStatus::Misconfigured) => format!("{:<15}", "MISCONFIGURED").yellow(),
                _ => format!("{:<15}", "disabled").dimmed(),
            };
            let benefit: String = integration.benefit.chars().take(50).collect();
            out.push_str(&format!("{:<15} {} {}\n", name, status, benefit));
        }
        let issues = self.validate_with(lookup);
        if !issues.is_empty() {
            out.push_str("\nIssues:\n");
            for issue in issues {
                out.push_str(&format!("  - {}: {}\n", issue.integration, issue.issue));
                if !issue.instructions.is_empty() {
                    out.push_str(&format!("    {}\n", issue.instructions));
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub oracle: OracleSettings,
    pub gates: GateSettings,
    pub tasks: TaskSettings,
    pub integrations: Integrations,
}

impl Settings {
    /// Reads `<root>/config.toml` if it exists and applies environment
    /// overrides. Never creates anything on disk.
    pub fn load(root: &Path) -> Result<Self, QuorumError> {
        let path = root.join(CONFIG_FILE_NAME);
        let mut settings = if path.is_file() {
            Self::parse(&fs::read_to_string(&path)?)?
        } else {
            Self::default()
        };
        settings.apply_env(|k| std::env::var(k).ok());
        Ok(settings)
    }

    pub fn parse(raw: &str) -> Result<Self, QuorumError> {
        let settings: Settings = toml::from_str(raw)?;
        settings.check()?;
        Ok(settings)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ORACLE_URL_ENV).filter(|v| !v.is_empty()) {
            self.oracle.url = url;
        }
        if let Some(model) = lookup(ORACLE_MODEL_ENV).filter(|v| !v.is_empty()) {
            self.oracle.model = model;
        }
    }

    fn check(&self) -> Result<(), QuorumError> {
        let g = &self.gates;
        for (name, v) in [
            ("connector_min_confidence", g.connector_min_confidence),
            ("executor_min_confidence", g.executor_min_confidence),
            ("opportunist_min_confidence", g.opportunist_min_confidence),
            ("strategist_min_confidence", g.strategist_min_confidence),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(QuorumError::Config(format!(
                    "gates.{name} must be within 0.0..=1.0, got {v}"
                )));
            }
        }
        if self.oracle.timeout_secs == 0 {
            return Err(QuorumError::Config("oracle.timeout_secs must be positive".into()));
        }
        if self.tasks.stale_after_days > MAX_LOOKBACK_HOURS / 24 {
            return Err(QuorumError::Config(format!(
                "tasks.stale_after_days must be at most {}, got {}",
                MAX_LOOKBACK_HOURS / 24,
                self.tasks.stale_after_days
            )));
        }
        Ok(())
    }
}

/// Store root: explicit flag, else `$QUORUM_HOME`, else `./.quorum`.
pub fn resolve_store_root(flag: Option<&Path>) -> PathBuf {
    if let Some(p) = flag {
        return p.to_path_buf();
    }
    match std::env::var(HOME_ENV) {
        Ok(home) if !home.trim().is_empty() => PathBuf::from(home),
        _ => PathBuf::from(DEFAULT_STORE_DIR),
    }
}

static SINCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\d+)\s*([hd]?)\s*$").expect("static regex"));

/// Parses a lookback like `24h`, `2d` or a bare hour count into hours.
pub fn parse_since(raw: &str) -> Result<u32, QuorumError> {
    let bad = || QuorumError::Config(format!("invalid --since '{raw}' (expected Nh, Nd or N)"));
    let caps = SINCE_RE.captures(raw).ok_or_else(bad)?;
    let n: u32 = caps[1].parse().map_err(|_| bad())?;
    let hours = match caps[2].to_ascii_lowercase().as_str() {
        "d" => n.checked_mul(24).ok_or_else(bad)?,
        _ => n,
    };
    if hours == 0 {
        return Err(bad());
    }
    if hours > MAX_LOOKBACK_HOURS {
        return Err(QuorumError::Config(format!(
            "--since '{raw}' exceeds the maximum lookback of {MAX_LOOKBACK_HOURS}h"
        )));
    }
    Ok(hours)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionType {
    Daily,
    Weekly,
}

impl ReflectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReflectionType::Daily => "daily",
            ReflectionType::Weekly => "weekly",
        }
    }

    pub fn window_hours(&self) -> u32 {
        match self {
            ReflectionType::Daily => 24,
            ReflectionType::Weekly => 168,
        }
    }
}

impl fmt::Display for ReflectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReflectionType {
    type Err = QuorumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(ReflectionType::Daily),
            "weekly" => Ok(ReflectionType::Weekly),
            other => Err(QuorumError::Config(format!(
                "reflection type must be 'daily' or 'weekly', got '{other}'"
            ))),
        }
    }
}
