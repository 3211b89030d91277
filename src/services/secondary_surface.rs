//! 弹窗同步服务 - 业务能力层
//!
//! 只负责"触发弹窗 → 等它稳定 → 把控制权交回主页面"能力

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::infrastructure::{Intent, LoadState, RemoteSurface, SurfaceId, WaitCondition};

/// 同步参数
#[derive(Clone, Debug)]
pub struct SyncSettings {
    /// 等待弹窗出现的超时
    pub appear_timeout: Duration,
    /// 弹窗初始加载的超时
    pub load_timeout: Duration,
    /// 加载提示的轮询间隔
    pub poll_interval: Duration,
    /// 等待加载提示出现的轮询次数
    pub detect_polls: u32,
    /// 等待加载提示消失的最大轮询次数
    pub max_polls: u32,
    /// 需要连续确认消失的次数
    pub required_clear: u32,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            appear_timeout: Duration::from_millis(config.secondary_appear_timeout_ms),
            load_timeout: Duration::from_millis(config.secondary_load_timeout_ms),
            poll_interval: Duration::from_millis(config.indicator_poll_interval_ms),
            detect_polls: config.indicator_detect_polls,
            max_polls: config.indicator_max_polls,
            required_clear: config.indicator_required_clear.max(1),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 同步结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// 触发后没有出现弹窗（部分流程本来就不弹窗）
    NoSecondary,
    /// 弹窗已关闭，焦点回到主页面
    Closed(SurfaceId),
    /// 弹窗保持打开，焦点回到主页面
    LeftOpen(SurfaceId),
}

/// 弹窗同步服务
///
/// 主页面与弹窗同时存在时，只有本服务在两者之间切换焦点
pub struct SecondarySurfaceSync {
    settings: SyncSettings,
}

impl SecondarySurfaceSync {
    pub fn new(settings: SyncSettings) -> Self {
        Self { settings }
    }

    /// 触发并收尾
    pub async fn spawn_and_reconcile<F>(
        &self,
        surface: &dyn RemoteSurface,
        trigger: F,
        should_close: bool,
    ) -> Result<SyncOutcome>
    where
        F: Future<Output = Result<()>> + Send,
    {
        match self.spawn(surface, trigger).await? {
            Some(secondary) => self.reconcile(surface, secondary, should_close).await,
            None => Ok(SyncOutcome::NoSecondary),
        }
    }

    /// 执行触发动作并等待弹窗稳定
    ///
    /// 返回 `Some` 时焦点位于弹窗上，调用方必须随后调用 [`Self::reconcile`]。
    pub async fn spawn<F>(
        &self,
        surface: &dyn RemoteSurface,
        trigger: F,
    ) -> Result<Option<SurfaceId>>
    where
        F: Future<Output = Result<()>> + Send,
    {
        let known = surface.open_surfaces().await?;
        debug!("触发前已有 {} 个界面", known.len());

        trigger.await?;

        let secondary = match surface
            .wait_for_new_surface(&known, self.settings.appear_timeout)
            .await?
        {
            Some(id) => Some(id),
            None => {
                debug!("等待弹窗超时，再检查一次已打开的界面");
                surface
                    .open_surfaces()
                    .await?
                    .into_iter()
                    .find(|id| !known.contains(id))
            }
        };

        let Some(secondary) = secondary else {
            debug!("没有出现弹窗");
            return Ok(None);
        };

        info!("🪟 检测到弹窗: {}", secondary);
        let settled = match surface.focus(&secondary).await {
            Ok(()) => self.stabilize(surface).await,
            Err(e) => Err(e),
        };
        if let Err(e) = settled {
            self.abandon(surface, &secondary).await;
            return Err(e);
        }
        Ok(Some(secondary))
    }

    /// 弹窗没能稳定下来：关掉它并回到主页面，下一次触发不会把它当成已有界面
    async fn abandon(&self, surface: &dyn RemoteSurface, secondary: &SurfaceId) {
        warn!("⚠️ 弹窗 {} 未能稳定，关闭后回到主页面", secondary);
        if let Err(e) = surface.close_surface(secondary).await {
            warn!("关闭弹窗 {} 失败: {:#}", secondary, e);
        }
        let primary = surface.primary_surface();
        if let Err(e) = surface.focus(&primary).await {
            warn!("回到主页面失败: {:#}", e);
        }
    }

    /// 收尾：按需关闭弹窗，并把焦点交回主页面
    pub async fn reconcile(
        &self,
        surface: &dyn RemoteSurface,
        secondary: SurfaceId,
        should_close: bool,
    ) -> Result<SyncOutcome> {
        let primary = surface.primary_surface();
        if should_close {
            surface.close_surface(&secondary).await?;
            surface.focus(&primary).await?;
            let cleared = surface.unselect_all().await?;
            debug!("弹窗已关闭，取消勾选 {} 项", cleared);
            Ok(SyncOutcome::Closed(secondary))
        } else {
            surface.focus(&primary).await?;
            info!("弹窗保持打开: {}", secondary);
            Ok(SyncOutcome::LeftOpen(secondary))
        }
    }

    /// 等待当前焦点界面加载完成且加载提示稳定消失
    pub async fn stabilize(&self, surface: &dyn RemoteSurface) -> Result<()> {
        let loaded = surface
            .wait_for(
                WaitCondition::Load(LoadState::DomContentLoaded),
                self.settings.load_timeout,
            )
            .await?;
        if !loaded {
            warn!("⚠️ 弹窗加载超时，继续检查加载提示");
        }

        let mut appeared = false;
        for _ in 0..self.settings.detect_polls {
            if surface
                .locate(&Intent::LoadingIndicator)
                .await
                .unwrap_or(false)
            {
                appeared = true;
                break;
            }
            sleep(self.settings.poll_interval).await;
        }
        debug!("加载提示{}出现", if appeared { "已" } else { "未" });

        let mut consecutive_clear = 0;
        for poll in 1..=self.settings.max_polls {
            // 读取失败按“仍在加载”处理
            let present = surface
                .locate(&Intent::LoadingIndicator)
                .await
                .unwrap_or(true);
            if present {
                consecutive_clear = 0;
            } else {
                consecutive_clear += 1;
                if consecutive_clear >= self.settings.required_clear {
                    debug!("加载提示已连续 {} 次消失（第 {} 次轮询）", consecutive_clear, poll);
                    return Ok(());
                }
            }
            sleep(self.settings.poll_interval).await;
        }

        warn!(
            "⚠️ 加载提示在 {} 次轮询内未稳定消失，继续执行",
            self.settings.max_polls
        );
        Ok(())
    }
}
