//! Live connection counts from the OpenVPN management interface.

use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Source of per-identity live session counts, keyed by common name.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn connection_counts(&self) -> Result<HashMap<String, u32>, anyhow::Error>;
}

/// Fixed counts, for tests and nodes without a management interface.
#[derive(Debug, Default)]
pub struct StaticConnections {
    counts: std::sync::Mutex<HashMap<String, u32>>,
}

impl StaticConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, count: u32) {
        if let Ok(mut counts) = self.counts.lock() {
            counts.insert(name.to_string(), count);
        }
    }
}

#[async_trait]
impl ConnectionSource for StaticConnections {
    async fn connection_counts(&self) -> Result<HashMap<String, u32>, anyhow::Error> {
        Ok(self
            .counts
            .lock()
            .map_err(|e| anyhow::anyhow!("Connection counts mutex poisoned: {}", e))?
            .clone())
    }
}

/// Count `CLIENT_LIST` rows of a `status 2` reply per common name.
pub fn parse_status(reply: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for line in reply.lines() {
        let mut fields = line.trim_end().split(',');
        if fields.next() != Some("CLIENT_LIST") {
            continue;
        }
        if let Some(common_name) = fields.next().filter(|cn| !cn.is_empty() && *cn != "UNDEF") {
            *counts.entry(common_name.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[derive(Debug, Clone)]
pub struct ManagementClient {
    address: String,
    timeout: Duration,
}

impl ManagementClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    async fn query_status(&self) -> Result<String, anyhow::Error> {
        let stream = TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("failed to connect to management interface {}", self.address))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(b"status 2\n").await?;

        let mut reply = String::new();
        while let Some(line) = lines.next_line().await? {
            if line.starts_with('>') {
                // Real-time notifications such as the greeting banner.
                continue;
            }
            if line.trim_end() == "END" {
                let _ = write_half.write_all(b"quit\n").await;
                return Ok(reply);
            }
            reply.push_str(&line);
            reply.push('\n');
        }
        anyhow::bail!("management interface closed before END")
    }
}

#[async_trait]
impl ConnectionSource for ManagementClient {
    async fn connection_counts(&self) -> Result<HashMap<String, u32>, anyhow::Error> {
        let reply = tokio::time::timeout(self.timeout, self.query_status())
            .await
            .map_err(|_| anyhow::anyhow!("management interface {} timed out", self.address))??;
        Ok(parse_status(&reply))
    }
}
