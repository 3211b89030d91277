//! 人工确认服务 - 业务能力层
//!
//! 登录确认、批次付款确认、收取确认共用同一套肯定回答

use anyhow::Result;
use async_trait::async_trait;
use phf::phf_set;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{AppError, RunError};

/// 视为“是”的回答
static AFFIRMATIVE: phf::Set<&'static str> = phf_set! {
    "y", "yes", "완료", "예", "ㅇ", "1", "그렇다",
};

/// 回答是否为肯定
pub fn is_affirmative(answer: &str) -> bool {
    AFFIRMATIVE.contains(answer.trim().to_lowercase().as_str())
}

/// 人工确认
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    /// 提问并返回回答是否为肯定；输入流关闭时返回错误
    async fn confirm(&self, question: &str) -> Result<bool>;
}

/// 从标准输入读取回答
pub struct StdinPrompt {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfirmationPrompt for StdinPrompt {
    async fn confirm(&self, question: &str) -> Result<bool> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("\n👉 {} (y/예/완료): ", question).as_bytes())
            .await?;
        stdout.flush().await?;

        let mut lines = self.lines.lock().await;
        match lines.next_line().await? {
            Some(answer) => Ok(is_affirmative(&answer)),
            None => Err(AppError::Run(RunError::PromptClosed {
                prompt: question.to_string(),
            })
            .into()),
        }
    }
}

/// 反复提问直到得到肯定回答（登录确认）
pub async fn wait_until_confirmed(prompt: &dyn ConfirmationPrompt, question: &str) -> Result<()> {
    loop {
        if prompt.confirm(question).await? {
            info!("✓ 已确认: {}", question);
            return Ok(());
        }
        warn!("未确认，请完成后再输入 y / 예 / 완료");
    }
}
