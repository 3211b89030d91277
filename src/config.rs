//! 程序配置
//!
//! 默认值 → 可选的 TOML 文件 → 环境变量，依次覆盖

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "iros_batch.toml";

/// 流程类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    /// 完整申请流程：检索 → 选择 → 选项 → 项目 → 公开设置 → 确认 → 加入结算
    Purchase,
    /// 查阅流程：检索 → 选择 → 打开“열람/발급”弹窗
    Lookup,
}

impl FromStr for FlowKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "purchase" => Ok(FlowKind::Purchase),
            "lookup" => Ok(FlowKind::Lookup),
            other => Err(ConfigError::InvalidValue {
                key: "flow".to_string(),
                reason: format!("未知的流程类型 '{}'", other),
            }),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 目标URL（IROS 首页）
    pub target_url: String,
    /// 目标页面标题（用于复用已打开的标签页）
    pub target_title: Option<String>,
    /// 输入 CSV 文件
    pub input_csv: String,
    /// 每批处理的记录数（每批结束后等待人工付款确认）
    pub batch_size: usize,
    /// 每条记录的最大尝试次数
    pub max_retries: u32,
    /// 两次尝试之间的固定等待（毫秒）
    pub retry_base_delay_ms: u64,
    /// 流程类型
    pub flow: FlowKind,
    /// 等待弹窗出现的超时（毫秒）
    pub secondary_appear_timeout_ms: u64,
    /// 弹窗初始加载超时（毫秒）
    pub secondary_load_timeout_ms: u64,
    /// 加载提示轮询间隔（毫秒）
    pub indicator_poll_interval_ms: u64,
    /// 等待加载提示出现的轮询次数
    pub indicator_detect_polls: u32,
    /// 等待加载提示消失的最大轮询次数
    pub indicator_max_polls: u32,
    /// 加载提示需要连续消失的次数
    pub indicator_required_clear: u32,
    /// 检索结果最多翻页数
    pub max_result_pages: usize,
    /// 单次等待页面状态的超时（毫秒）
    pub wait_timeout_ms: u64,
    /// 下载目录（付款后收取文件）
    pub download_dir: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 运行报告文件
    pub report_file: String,
    /// 重复提交冲突的提示文字
    pub duplicate_phrases: Vec<String>,
    /// 付款后是否进入收取阶段
    pub harvest_enabled: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: "https://www.iros.go.kr/index.jsp".to_string(),
            target_title: None,
            input_csv: "train_data.csv".to_string(),
            batch_size: 10,
            max_retries: 3,
            retry_base_delay_ms: 3000,
            flow: FlowKind::Purchase,
            secondary_appear_timeout_ms: 10_000,
            secondary_load_timeout_ms: 30_000,
            indicator_poll_interval_ms: 1000,
            indicator_detect_polls: 5,
            indicator_max_polls: 20,
            indicator_required_clear: 2,
            max_result_pages: 50,
            wait_timeout_ms: 10_000,
            download_dir: "downloads".to_string(),
            output_log_file: "output.txt".to_string(),
            report_file: "run_report.txt".to_string(),
            duplicate_phrases: vec![
                "일괄결제대상에 이미 입력된 등기기록입니다".to_string(),
                "일괄결제대상에 이미 입력된".to_string(),
                "중복된 등기기록".to_string(),
                "이미 등록된".to_string(),
            ],
            harvest_enabled: true,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量加载（以默认值为基础）
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载（文件不存在时使用默认值），再应用环境变量
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let base = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            toml::from_str::<Config>(&content).map_err(|e| {
                AppError::File(FileError::TomlParseFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })
            })?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> AppResult<Self> {
        override_parsed("BROWSER_DEBUG_PORT", &mut self.browser_debug_port)?;
        override_string("TARGET_URL", &mut self.target_url);
        if let Ok(title) = std::env::var("TARGET_TITLE") {
            self.target_title = Some(title);
        }
        override_string("INPUT_CSV", &mut self.input_csv);
        override_parsed("BATCH_SIZE", &mut self.batch_size)?;
        override_parsed("MAX_RETRIES", &mut self.max_retries)?;
        override_parsed("RETRY_BASE_DELAY_MS", &mut self.retry_base_delay_ms)?;
        if let Ok(flow) = std::env::var("FLOW") {
            self.flow = flow.parse()?;
        }
        override_parsed("MAX_RESULT_PAGES", &mut self.max_result_pages)?;
        override_string("DOWNLOAD_DIR", &mut self.download_dir);
        override_string("OUTPUT_LOG_FILE", &mut self.output_log_file);
        override_string("REPORT_FILE", &mut self.report_file);
        override_parsed("HARVEST_ENABLED", &mut self.harvest_enabled)?;
        override_parsed("VERBOSE_LOGGING", &mut self.verbose_logging)?;
        self.validate()?;
        Ok(self)
    }

    /// 校验配置值
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "必须大于 0"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "必须大于 0"));
        }
        if self.indicator_required_clear == 0 {
            return Err(invalid("indicator_required_clear", "必须大于 0"));
        }
        if self.max_result_pages == 0 {
            return Err(invalid("max_result_pages", "必须大于 0"));
        }
        Ok(())
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

fn invalid(key: &str, reason: &str) -> AppError {
    AppError::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    })
}

fn override_string(var_name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var_name) {
        *target = value;
    }
}

fn override_parsed<T: FromStr>(var_name: &str, target: &mut T) -> AppResult<()> {
    if let Ok(value) = std::env::var(var_name) {
        *target = value.trim().parse().map_err(|_| {
            AppError::Config(ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value: value.clone(),
                expected_type: std::any::type_name::<T>().to_string(),
            })
        })?;
    }
    Ok(())
}
