pub mod client;
pub mod config;
pub mod dial;
pub mod paging;
pub mod protocol;

pub use client::{Client, ClientError, Connection, Transport};
pub use config::{ClientConfig, ConfigError};
pub use dial::{dial, dial_default, dial_hosts_random, dial_hosts_range, fast_hosts, DialResult};
pub use paging::PageError;
pub use protocol::*;

// 重新导出 log 宏供用户使用
pub use log;
