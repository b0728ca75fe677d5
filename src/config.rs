//! 客户端配置
//!
//! 加载顺序（后者覆盖前者）：默认值、JSON 配置、环境变量 `TDX2_*`。

use crate::protocol::constants::{DEFAULT_PORT, EX_DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认行情服务器地址列表
pub const DEFAULT_HOSTS: &[&str] = &[
    "124.71.187.122",
    "122.51.120.217",
    "111.229.247.189",
    "124.70.176.52",
    "123.60.186.45",
    "122.51.232.182",
    "118.25.98.114",
    "124.70.199.56",
    "121.36.225.169",
    "123.60.70.228",
    "123.60.73.44",
    "124.70.133.119",
];

/// 配置解析错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置解析失败: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// 候选服务器，可带端口（`host:port`），不带时使用 `port`
    pub hosts: Vec<String>,
    pub port: u16,
    /// 单次请求超时
    pub timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// 连接失败后尝试下一个地址前的等待
    pub failover_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts: DEFAULT_HOSTS.iter().map(|h| h.to_string()).collect(),
            port: DEFAULT_PORT,
            timeout_ms: 10_000,
            heartbeat_interval_ms: 10_000,
            failover_delay_ms: 2_000,
        }
    }
}

impl ClientConfig {
    /// 扩展行情（期货）服务没有内置地址
    pub fn ex_market() -> Self {
        Self {
            hosts: Vec::new(),
            port: EX_DEFAULT_PORT,
            ..Self::default()
        }
    }

    /// 从 JSON 读取，缺省字段取默认值，再应用环境变量
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: ClientConfig = serde_json::from_str(json)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// 默认值加环境变量
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(hosts) = std::env::var("TDX2_HOSTS") {
            let hosts = parse_hosts(&hosts);
            if !hosts.is_empty() {
                self.hosts = hosts;
            }
        }
    }

    /// 补全端口后的地址列表
    pub fn addrs(&self) -> Vec<String> {
        self.hosts
            .iter()
            .map(|h| with_port(h, self.port))
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn failover_delay(&self) -> Duration {
        Duration::from_millis(self.failover_delay_ms)
    }
}

/// 逗号分隔的地址列表
fn parse_hosts(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect()
}

/// 没有端口时补上默认端口
pub fn with_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:{}", host, port)
    }
}
