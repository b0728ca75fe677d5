//! 连接管理（异步）

use crate::client::{Client, ClientError};
use crate::config::ClientConfig;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time;

/// 连接到指定地址并登录
pub async fn dial(addr: &str, config: &ClientConfig) -> Result<Client, ClientError> {
    Client::connect(addr, config.timeout()).await
}

/// 按顺序遍历配置中的地址，第一个连接并登录成功的返回
pub async fn dial_hosts_range(config: &ClientConfig) -> Result<Client, ClientError> {
    let mut last_error = None;
    for addr in config.addrs() {
        match Client::connect(&addr, config.timeout()).await {
            Ok(client) => return Ok(client),
            Err(e) => {
                warn!("连接 {} 失败: {}", addr, e);
                last_error = Some(e);
                time::sleep(config.failover_delay()).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ClientError::Other("没有可用的服务器地址".to_string())))
}

/// 随机选择一个地址连接
pub async fn dial_hosts_random(config: &ClientConfig) -> Result<Client, ClientError> {
    // StdRng 是 Send 的，可以在多线程运行时中跨 await 使用
    let mut rng = StdRng::from_entropy();
    let addrs = config.addrs();
    let addr = addrs
        .choose(&mut rng)
        .ok_or_else(|| ClientError::Other("没有可用的服务器地址".to_string()))?;

    Client::connect(addr, config.timeout()).await
}

/// 使用默认配置（含 `TDX2_HOSTS` 覆盖）遍历连接
pub async fn dial_default() -> Result<Client, ClientError> {
    dial_hosts_range(&ClientConfig::from_env()).await
}

/// 连接结果（用于测试连接速度）
#[derive(Debug, Clone)]
pub struct DialResult {
    pub host: String,
    pub duration: Duration,
}

/// 测试配置中各地址的 TCP 连接耗时，按从快到慢排序，连不上的忽略
pub async fn fast_hosts(config: &ClientConfig) -> Vec<DialResult> {
    let timeout = config.timeout();
    let mut handles = Vec::new();

    for addr in config.addrs() {
        handles.push(tokio::spawn(async move {
            let start = Instant::now();
            match time::timeout(timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(_)) => Some(DialResult {
                    host: addr,
                    duration: start.elapsed(),
                }),
                _ => None,
            }
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        if let Ok(Some(result)) = handle.await {
            results.push(result);
        }
    }

    results.sort_by(|a, b| a.duration.cmp(&b.duration));
    info!("可用服务器 {} 个", results.len());
    results
}
