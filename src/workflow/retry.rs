//! 重试与恢复 - 流程层
//!
//! 固定间隔重试；每次可重试失败之后把远端界面恢复到检查点

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::infrastructure::{Checkpoint, RemoteSurface};

/// 重试策略
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// 固定等待（不做指数退避）
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_retries, config.retry_base_delay())
    }
}

/// 一次尝试的结果
#[derive(Debug, PartialEq, Eq)]
pub enum Attempt<T> {
    /// 得到最终结果（包括不可重试的失败）
    Finished(T),
    /// 可重试的失败
    Retry(String),
}

/// 可重试的操作
#[async_trait]
pub trait Operation: Send {
    type Output: Send;

    /// 第 `number` 次尝试（从 1 开始，共 `of` 次）
    async fn attempt(&mut self, number: u32, of: u32) -> Attempt<Self::Output>;
}

/// 恢复过程
#[async_trait]
pub trait Recovery: Send + Sync {
    async fn recover(&self) -> Result<()>;
}

/// 重试耗尽
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError {
    #[error("已尝试 {attempts} 次仍失败: {last_reason}")]
    Exhausted { attempts: u32, last_reason: String },
}

impl RetryError {
    pub fn last_reason(&self) -> &str {
        match self {
            RetryError::Exhausted { last_reason, .. } => last_reason,
        }
    }
}

/// 执行操作，可重试失败最多尝试 `max_retries` 次
///
/// 每次可重试失败后都会等待 `base_delay` 并执行恢复（最后一次也不例外，
/// 以便下一条记录从检查点开始）；恢复失败同样计入本次尝试。
pub async fn execute_with_retry<O: Operation>(
    operation: &mut O,
    policy: &RetryPolicy,
    recovery: &dyn Recovery,
) -> Result<O::Output, RetryError> {
    let mut last_reason = String::new();

    for number in 1..=policy.max_retries {
        match operation.attempt(number, policy.max_retries).await {
            Attempt::Finished(output) => return Ok(output),
            Attempt::Retry(reason) => {
                warn!(
                    "⚠️ 第 {}/{} 次尝试失败: {}",
                    number, policy.max_retries, reason
                );
                last_reason = reason;
            }
        }

        sleep(policy.base_delay).await;
        match recovery.recover().await {
            Ok(()) => debug!("恢复完成"),
            Err(e) => warn!("⚠️ 恢复失败（计入本次尝试）: {}", e),
        }
    }

    Err(RetryError::Exhausted {
        attempts: policy.max_retries,
        last_reason,
    })
}

/// 回到检查点的恢复过程：导航 → 关闭弹层 → 确认已到达
pub struct CheckpointRecovery<'a> {
    surface: &'a dyn RemoteSurface,
    checkpoint: Checkpoint,
}

impl<'a> CheckpointRecovery<'a> {
    pub fn new(surface: &'a dyn RemoteSurface, checkpoint: Checkpoint) -> Self {
        Self {
            surface,
            checkpoint,
        }
    }
}

#[async_trait]
impl Recovery for CheckpointRecovery<'_> {
    async fn recover(&self) -> Result<()> {
        debug!("🔄 恢复到检查点 {:?}", self.checkpoint);
        let primary = self.surface.primary_surface();
        self.surface.focus(&primary).await?;
        self.surface.navigate(self.checkpoint).await?;
        self.surface.dismiss_overlays().await?;
        if !self.surface.at_checkpoint(self.checkpoint).await? {
            bail!("未能回到检查点 {:?}", self.checkpoint);
        }
        Ok(())
    }
}
