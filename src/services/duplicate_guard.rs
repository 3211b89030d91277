//! 重复提交检测服务 - 业务能力层

use tracing::{debug, warn};

use crate::config::Config;
use crate::infrastructure::{Intent, RemoteSurface};

/// 重复提交检测
///
/// 标记元素与提示文字是互相独立的信号，任意一个成立即视为冲突。
/// 信号读取失败时按“未成立”处理。
pub struct DuplicateGuard {
    phrases: Vec<String>,
}

impl DuplicateGuard {
    pub fn new(phrases: Vec<String>) -> Self {
        Self { phrases }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.duplicate_phrases.clone())
    }

    /// 当前页面是否出现重复提交冲突
    pub async fn detect_conflict(&self, surface: &dyn RemoteSurface) -> bool {
        match surface.locate(&Intent::DuplicateMarker).await {
            Ok(true) => {
                warn!("⚠️ 检测到重复提交标记元素");
                return true;
            }
            Ok(false) => {}
            Err(e) => debug!("读取重复标记失败: {}", e),
        }

        match surface.read_text().await {
            Ok(text) => match self.matching_phrase(&text) {
                Some(phrase) => {
                    warn!("⚠️ 检测到重复提交提示: {}", phrase);
                    true
                }
                None => false,
            },
            Err(e) => {
                debug!("读取页面文本失败: {}", e);
                false
            }
        }
    }

    fn matching_phrase(&self, text: &str) -> Option<&str> {
        self.phrases
            .iter()
            .map(String::as_str)
            .find(|phrase| !phrase.is_empty() && text.contains(phrase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_phrase() {
        let guard = DuplicateGuard::from_config(&Config::default());
        assert_eq!(
            guard.matching_phrase("오류: 중복된 등기기록 입니다"),
            Some("중복된 등기기록")
        );
        assert_eq!(guard.matching_phrase("정상 처리되었습니다"), None);
    }

    #[test]
    fn test_empty_phrase_never_matches() {
        let guard = DuplicateGuard::new(vec![String::new()]);
        assert_eq!(guard.matching_phrase("아무 텍스트"), None);
    }
}
