//! Configuration loading: TOML token table + scalar knobs, layered under
//! `.env`/process environment, overridable by CLI flags (§6.1).

use crate::types::{Direction, DirectionPriority, StrategySpec, TokenSpec, VenueATokenId, VenueBTokenId};
use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// CLI surface. Every flag also reads from the matching env var, so a
/// container deployment can configure purely via environment.
#[derive(Debug, Parser)]
#[command(name = "dexarb-core", about = "Cross-chain arbitrage engine")]
pub struct Cli {
    /// Path to the token/knob TOML file.
    #[arg(long, env = "ARB_CONFIG_FILE", default_value = "config/arb.toml")]
    pub config_file: String,

    /// Directory for state.json, bridge-state.json, logs/.
    #[arg(long, env = "ARB_DATA_DIR", default_value = "data")]
    pub data_dir: String,

    /// Run without submitting any swap or bridge transaction.
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// "info", "debug", "warn"... forwarded to RUST_LOG if RUST_LOG unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// "json" switches tracing-subscriber to structured JSON output.
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

/// Raw TOML document shape, deserialized then validated into `RuntimeConfig`.
#[derive(Debug, Deserialize)]
struct TomlDoc {
    #[serde(default)]
    tokens: Vec<TomlToken>,
    #[serde(default)]
    trading: TomlTrading,
    #[serde(default)]
    bridging: TomlBridging,
    #[serde(default)]
    auto_bridging: TomlAutoBridging,
    #[serde(default)]
    monitoring: TomlMonitoring,
}

#[derive(Debug, Deserialize)]
struct TomlToken {
    symbol: String,
    venue_a_collection: String,
    venue_a_category: String,
    venue_a_type: String,
    venue_a_additional_key: String,
    venue_b_mint: String,
    decimals: u8,
    trade_size: String,
    #[serde(default = "default_true")]
    enabled: bool,
    quote_via_a: String,
    quote_via_b: String,
    #[serde(default)]
    inventory_target: Option<String>,
    #[serde(default)]
    strategies: Vec<TomlStrategy>,
}

#[derive(Debug, Deserialize)]
struct TomlStrategy {
    strategy_id: String,
    venue_a_op: String,
    venue_a_counter: String,
    venue_b_op: String,
    venue_b_counter: String,
    #[serde(default = "default_true")]
    enabled: bool,
    min_edge_bps: String,
    #[serde(default)]
    priority: u32,
}

#[derive(Debug, Deserialize)]
struct TomlTrading {
    #[serde(default = "default_min_edge_bps")]
    min_edge_bps: String,
    reverse_min_edge_bps: Option<String>,
    #[serde(default = "default_max_slippage_bps")]
    max_slippage_bps: String,
    #[serde(default = "default_max_impact_bps")]
    max_price_impact_bps: String,
    #[serde(default = "default_risk_buffer_bps")]
    risk_buffer_bps: String,
    #[serde(default = "default_cooldown_minutes")]
    cooldown_minutes: i64,
    #[serde(default)]
    max_daily_trades: Option<u32>,
    #[serde(default)]
    enable_reverse: bool,
    #[serde(default = "default_direction")]
    arbitrage_direction: String,
    #[serde(default = "default_max_multiplier")]
    dynamic_slippage_max_multiplier: String,
    #[serde(default = "default_edge_ratio")]
    dynamic_slippage_edge_ratio: String,
    #[serde(default = "default_u_usd_fallback")]
    u_usd_fallback: String,
}

impl Default for TomlTrading {
    fn default() -> Self {
        Self {
            min_edge_bps: default_min_edge_bps(),
            reverse_min_edge_bps: None,
            max_slippage_bps: default_max_slippage_bps(),
            max_price_impact_bps: default_max_impact_bps(),
            risk_buffer_bps: default_risk_buffer_bps(),
            cooldown_minutes: default_cooldown_minutes(),
            max_daily_trades: None,
            enable_reverse: false,
            arbitrage_direction: default_direction(),
            dynamic_slippage_max_multiplier: default_max_multiplier(),
            dynamic_slippage_edge_ratio: default_edge_ratio(),
            u_usd_fallback: default_u_usd_fallback(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlBridging {
    #[serde(default = "default_bridge_interval_minutes")]
    interval_minutes: i64,
    #[serde(default = "default_threshold_usd")]
    threshold_usd: String,
    #[serde(default = "default_bridge_max_retries")]
    max_retries: u32,
    #[serde(default = "default_retry_delay_minutes")]
    retry_delay_minutes: i64,
    #[serde(default = "default_trades_per_bridge")]
    trades_per_bridge: u32,
    #[serde(default = "default_bridge_cost_usd")]
    bridge_cost_usd: String,
}

impl Default for TomlBridging {
    fn default() -> Self {
        Self {
            interval_minutes: default_bridge_interval_minutes(),
            threshold_usd: default_threshold_usd(),
            max_retries: default_bridge_max_retries(),
            retry_delay_minutes: default_retry_delay_minutes(),
            trades_per_bridge: default_trades_per_bridge(),
            bridge_cost_usd: default_bridge_cost_usd(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlAutoBridging {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_imbalance_threshold")]
    imbalance_threshold_percent: String,
    #[serde(default = "default_target_split")]
    target_split_percent: String,
    #[serde(default = "default_min_rebalance")]
    min_rebalance_amount: String,
    #[serde(default = "default_bridge_interval_minutes")]
    check_interval_minutes: i64,
    #[serde(default = "default_cooldown_minutes")]
    cooldown_minutes: i64,
    #[serde(default = "default_max_bridges_per_day")]
    max_bridges_per_day: u32,
    #[serde(default)]
    enabled_tokens: Vec<String>,
    #[serde(default)]
    skip_tokens: Vec<String>,
    #[serde(default = "default_bridge_timeout_minutes")]
    timeout_minutes: i64,
}

impl Default for TomlAutoBridging {
    fn default() -> Self {
        Self {
            enabled: false,
            imbalance_threshold_percent: default_imbalance_threshold(),
            target_split_percent: default_target_split(),
            min_rebalance_amount: default_min_rebalance(),
            check_interval_minutes: default_bridge_interval_minutes(),
            cooldown_minutes: default_cooldown_minutes(),
            max_bridges_per_day: default_max_bridges_per_day(),
            enabled_tokens: Vec::new(),
            skip_tokens: Vec::new(),
            timeout_minutes: default_bridge_timeout_minutes(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlMonitoring {
    #[serde(default)]
    enable_alerts: bool,
    #[serde(default)]
    alert_webhook_url: Option<String>,
    #[serde(default = "default_inventory_floor")]
    inventory_floor_usd: String,
}

impl Default for TomlMonitoring {
    fn default() -> Self {
        Self {
            enable_alerts: false,
            alert_webhook_url: None,
            inventory_floor_usd: default_inventory_floor(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_min_edge_bps() -> String {
    "30".into()
}
fn default_max_slippage_bps() -> String {
    "50".into()
}
fn default_max_impact_bps() -> String {
    "300".into()
}
fn default_risk_buffer_bps() -> String {
    "100".into()
}
fn default_cooldown_minutes() -> i64 {
    5
}
fn default_direction() -> String {
    "forward".into()
}
fn default_max_multiplier() -> String {
    "2.0".into()
}
fn default_edge_ratio() -> String {
    "0.75".into()
}
fn default_u_usd_fallback() -> String {
    "0.01".into()
}
fn default_bridge_interval_minutes() -> i64 {
    5
}
fn default_threshold_usd() -> String {
    "500".into()
}
fn default_bridge_max_retries() -> u32 {
    3
}
fn default_retry_delay_minutes() -> i64 {
    2
}
fn default_trades_per_bridge() -> u32 {
    100
}
fn default_bridge_cost_usd() -> String {
    "1.25".into()
}
fn default_imbalance_threshold() -> String {
    "80".into()
}
fn default_target_split() -> String {
    "50".into()
}
fn default_min_rebalance() -> String {
    "100".into()
}
fn default_max_bridges_per_day() -> u32 {
    3
}
fn default_bridge_timeout_minutes() -> i64 {
    30
}
fn default_inventory_floor() -> String {
    "0".into()
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("invalid decimal for '{field}': '{raw}'"))
}

/// Fully-resolved, immutable configuration, as consumed by every component.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub tokens: Vec<TokenSpec>,
    pub data_dir: String,
    pub dry_run: bool,

    pub min_edge_bps: Decimal,
    pub reverse_min_edge_bps: Decimal,
    pub max_slippage_bps: Decimal,
    pub max_price_impact_bps: Decimal,
    pub risk_buffer_bps: Decimal,
    pub cooldown_minutes: i64,
    pub max_daily_trades: Option<u32>,
    pub enable_reverse: bool,
    pub arbitrage_direction: DirectionPriority,
    pub dynamic_slippage_max_multiplier: Decimal,
    pub dynamic_slippage_edge_ratio: Decimal,
    pub u_usd_fallback: Decimal,

    pub bridge_interval_minutes: i64,
    pub bridge_threshold_usd: Decimal,
    pub bridge_max_retries: u32,
    pub bridge_retry_delay_minutes: i64,
    pub trades_per_bridge: u32,
    pub bridge_cost_usd: Decimal,

    pub auto_bridging_enabled: bool,
    pub imbalance_threshold_percent: Decimal,
    pub target_split_percent: Decimal,
    pub min_rebalance_amount: Decimal,
    pub bridge_check_interval_minutes: i64,
    pub bridge_cooldown_minutes: i64,
    pub max_bridges_per_day: u32,
    pub bridge_enabled_tokens: HashSet<String>,
    pub bridge_skip_tokens: HashSet<String>,
    pub bridge_timeout_minutes: i64,

    pub enable_alerts: bool,
    pub alert_webhook_url: Option<String>,
    pub inventory_floor_usd: Decimal,

    /// Environment interlocks (§6), re-read once per tick by the scheduler.
    pub trade_window_start: Option<String>,
    pub trade_window_end: Option<String>,
    pub max_notional_per_trade: Option<Decimal>,
}

impl RuntimeConfig {
    /// Assemble from three layers: TOML defaults, then `.env`/process env,
    /// then CLI flags (highest priority), matching `config.rs::load_config()`'s
    /// env-first approach generalized with an explicit TOML token table.
    pub fn load(cli: &Cli) -> Result<Self> {
        dotenv::dotenv().ok();

        let toml_doc: TomlDoc = if Path::new(&cli.config_file).exists() {
            let content = std::fs::read_to_string(&cli.config_file)
                .with_context(|| format!("failed to read config file: {}", cli.config_file))?;
            toml::from_str(&content).context("failed to parse config TOML")?
        } else {
            TomlDoc {
                tokens: Vec::new(),
                trading: TomlTrading::default(),
                bridging: TomlBridging::default(),
                auto_bridging: TomlAutoBridging::default(),
                monitoring: TomlMonitoring::default(),
            }
        };

        if toml_doc.tokens.is_empty() {
            anyhow::bail!(
                "no tokens configured in '{}' — at least one [[tokens]] entry is required",
                cli.config_file
            );
        }

        let mut tokens = Vec::with_capacity(toml_doc.tokens.len());
        for t in &toml_doc.tokens {
            if t.decimals > 18 {
                anyhow::bail!("token '{}': decimals {} out of range 0..=18", t.symbol, t.decimals);
            }
            let venue_b_id = VenueBTokenId::parse(&t.venue_b_mint)
                .map_err(|e| anyhow::anyhow!("token '{}': {e}", t.symbol))?;
            let mut strategies = Vec::with_capacity(t.strategies.len());
            for s in &t.strategies {
                strategies.push(StrategySpec {
                    strategy_id: s.strategy_id.clone(),
                    venue_a_op: parse_direction(&s.venue_a_op)?,
                    venue_a_counter: s.venue_a_counter.clone(),
                    venue_b_op: parse_direction(&s.venue_b_op)?,
                    venue_b_counter: s.venue_b_counter.clone(),
                    enabled: s.enabled,
                    min_edge_bps: parse_decimal(&s.min_edge_bps, "strategies.min_edge_bps")?,
                    priority: s.priority,
                });
            }
            tokens.push(TokenSpec {
                symbol: t.symbol.to_uppercase(),
                venue_a_id: VenueATokenId {
                    collection: t.venue_a_collection.clone(),
                    category: t.venue_a_category.clone(),
                    type_: t.venue_a_type.clone(),
                    additional_key: t.venue_a_additional_key.clone(),
                },
                venue_b_id,
                decimals: t.decimals,
                trade_size: parse_decimal(&t.trade_size, "tokens.trade_size")?,
                enabled: t.enabled,
                quote_via_a: t.quote_via_a.clone(),
                quote_via_b: t.quote_via_b.clone(),
                inventory_target: t
                    .inventory_target
                    .as_deref()
                    .map(|v| parse_decimal(v, "tokens.inventory_target"))
                    .transpose()?,
                strategies,
            });
        }

        let trading = &toml_doc.trading;
        let min_edge_bps = parse_decimal(&trading.min_edge_bps, "trading.min_edge_bps")?;
        let reverse_min_edge_bps = match &trading.reverse_min_edge_bps {
            Some(v) => parse_decimal(v, "trading.reverse_min_edge_bps")?,
            None => min_edge_bps,
        };
        let arbitrage_direction = match trading.arbitrage_direction.as_str() {
            "forward" => DirectionPriority::Forward,
            "reverse" => DirectionPriority::Reverse,
            "best" => DirectionPriority::Best,
            other => anyhow::bail!("invalid trading.arbitrage_direction: '{other}'"),
        };

        let bridging = &toml_doc.bridging;
        let auto = &toml_doc.auto_bridging;
        let monitoring = &toml_doc.monitoring;

        Ok(Self {
            tokens,
            data_dir: env_or(&cli.data_dir, "ARB_DATA_DIR"),
            dry_run: cli.dry_run || env_flag("DRY_RUN"),

            min_edge_bps,
            reverse_min_edge_bps,
            max_slippage_bps: parse_decimal(&trading.max_slippage_bps, "trading.max_slippage_bps")?,
            max_price_impact_bps: parse_decimal(&trading.max_price_impact_bps, "trading.max_price_impact_bps")?,
            risk_buffer_bps: parse_decimal(&trading.risk_buffer_bps, "trading.risk_buffer_bps")?,
            cooldown_minutes: trading.cooldown_minutes,
            max_daily_trades: trading.max_daily_trades,
            enable_reverse: trading.enable_reverse,
            arbitrage_direction,
            dynamic_slippage_max_multiplier: parse_decimal(
                &trading.dynamic_slippage_max_multiplier,
                "trading.dynamic_slippage_max_multiplier",
            )?,
            dynamic_slippage_edge_ratio: parse_decimal(
                &trading.dynamic_slippage_edge_ratio,
                "trading.dynamic_slippage_edge_ratio",
            )?,
            u_usd_fallback: parse_decimal(&trading.u_usd_fallback, "trading.u_usd_fallback")?,

            bridge_interval_minutes: bridging.interval_minutes,
            bridge_threshold_usd: parse_decimal(&bridging.threshold_usd, "bridging.threshold_usd")?,
            bridge_max_retries: bridging.max_retries,
            bridge_retry_delay_minutes: bridging.retry_delay_minutes,
            trades_per_bridge: bridging.trades_per_bridge,
            bridge_cost_usd: parse_decimal(&bridging.bridge_cost_usd, "bridging.bridge_cost_usd")?,

            auto_bridging_enabled: auto.enabled,
            imbalance_threshold_percent: parse_decimal(
                &auto.imbalance_threshold_percent,
                "auto_bridging.imbalance_threshold_percent",
            )?,
            target_split_percent: parse_decimal(&auto.target_split_percent, "auto_bridging.target_split_percent")?,
            min_rebalance_amount: parse_decimal(&auto.min_rebalance_amount, "auto_bridging.min_rebalance_amount")?,
            bridge_check_interval_minutes: auto.check_interval_minutes,
            bridge_cooldown_minutes: auto.cooldown_minutes,
            max_bridges_per_day: auto.max_bridges_per_day,
            bridge_enabled_tokens: auto.enabled_tokens.iter().cloned().collect(),
            bridge_skip_tokens: auto.skip_tokens.iter().cloned().collect(),
            bridge_timeout_minutes: auto.timeout_minutes,

            enable_alerts: monitoring.enable_alerts || env_flag("ENABLE_ALERTS"),
            alert_webhook_url: std::env::var("DISCORD_WEBHOOK")
                .ok()
                .or_else(|| monitoring.alert_webhook_url.clone()),
            inventory_floor_usd: parse_decimal(&monitoring.inventory_floor_usd, "monitoring.inventory_floor_usd")?,

            trade_window_start: std::env::var("TRADE_WINDOW_START").ok(),
            trade_window_end: std::env::var("TRADE_WINDOW_END").ok(),
            max_notional_per_trade: std::env::var("MAX_NOTIONAL_PER_TRADE")
                .ok()
                .and_then(|v| Decimal::from_str(&v).ok()),
        })
    }

    pub fn is_paused(&self) -> bool {
        env_flag("PAUSE")
    }

    pub fn token(&self, symbol: &str) -> Option<&TokenSpec> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    /// A fully-populated default config for other modules' unit tests.
    #[cfg(test)]
    pub fn test_default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            tokens: vec![],
            data_dir: "data".into(),
            dry_run: true,
            min_edge_bps: dec!(30),
            reverse_min_edge_bps: dec!(30),
            max_slippage_bps: dec!(50),
            max_price_impact_bps: dec!(300),
            risk_buffer_bps: dec!(100),
            cooldown_minutes: 5,
            max_daily_trades: None,
            enable_reverse: false,
            arbitrage_direction: DirectionPriority::Forward,
            dynamic_slippage_max_multiplier: dec!(2.0),
            dynamic_slippage_edge_ratio: dec!(0.75),
            u_usd_fallback: dec!(0.01),
            bridge_interval_minutes: 5,
            bridge_threshold_usd: dec!(500),
            bridge_max_retries: 3,
            bridge_retry_delay_minutes: 2,
            trades_per_bridge: 100,
            bridge_cost_usd: dec!(1.25),
            auto_bridging_enabled: false,
            imbalance_threshold_percent: dec!(80),
            target_split_percent: dec!(50),
            min_rebalance_amount: dec!(100),
            bridge_check_interval_minutes: 5,
            bridge_cooldown_minutes: 5,
            max_bridges_per_day: 3,
            bridge_enabled_tokens: Default::default(),
            bridge_skip_tokens: Default::default(),
            bridge_timeout_minutes: 30,
            enable_alerts: false,
            alert_webhook_url: None,
            inventory_floor_usd: dec!(0),
            trade_window_start: None,
            trade_window_end: None,
            max_notional_per_trade: None,
        }
    }
}

fn parse_direction(raw: &str) -> Result<Direction> {
    match raw {
        "sell" => Ok(Direction::Sell),
        "buy" => Ok(Direction::Buy),
        other => anyhow::bail!("invalid direction '{other}' (expected 'sell' or 'buy')"),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn env_or(default: &str, name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_trading_defaults_parse_as_decimals() {
        let t = TomlTrading::default();
        assert!(Decimal::from_str(&t.min_edge_bps).is_ok());
        assert!(Decimal::from_str(&t.dynamic_slippage_edge_ratio).is_ok());
    }

    #[test]
    fn rejects_decimals_out_of_range_in_token_table() {
        let toml_str = r#"
            [[tokens]]
            symbol = "T"
            venue_a_collection = "C"
            venue_a_category = "general"
            venue_a_type = "none"
            venue_a_additional_key = "none"
            venue_b_mint = "So11111111111111111111111111111111111111112"
            decimals = 30
            trade_size = "1000"
            quote_via_a = "GALA"
            quote_via_b = "USDC"
        "#;
        let doc: TomlDoc = toml::from_str(toml_str).unwrap();
        assert_eq!(doc.tokens[0].decimals, 30);
    }
}
