use anyhow::Result;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::error::AppError;

/// 连接到已开启远程调试的浏览器，并找到（或打开）IROS 页面
///
/// 优先复用标题包含 `target_title` 或地址位于 `target_url` 同一站点的标签页，
/// 这样操作员事先完成的登录状态可以直接沿用。
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: &str,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);
    debug!("目标 URL: {}, 目标标题: {:?}", target_url, target_title);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        AppError::browser_connection_failed(port, e)
    })?;
    debug!("浏览器连接成功");

    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                warn!("浏览器事件流结束");
                break;
            }
        }
    });

    sleep(Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    let site = site_of(target_url);
    for p in pages.iter() {
        if let Some(title) = target_title {
            if let Ok(Some(page_title)) = p.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 找到目标页面: {}", page_title);
                    return Ok((browser, p.clone()));
                }
            }
        }
        if let Ok(Some(url)) = p.url().await {
            debug!("检查页面地址: {}", url);
            if !site.is_empty() && url.contains(site) {
                info!("✓ 复用已打开的页面: {}", url);
                return Ok((browser, p.clone()));
            }
        }
    }

    debug!("未找到匹配的页面，创建新页面并导航到: {}", target_url);
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建新页面失败: {}", e);
        e
    })?;
    page.goto(target_url).await.map_err(|e| {
        error!("导航到 {} 失败: {}", target_url, e);
        AppError::navigation_failed(target_url, e)
    })?;
    info!("已导航到: {}", target_url);

    Ok((browser, page))
}

/// 取出 URL 中的主机部分
fn site_of(url: &str) -> &str {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    without_scheme.split('/').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_of() {
        assert_eq!(site_of("https://www.iros.go.kr/index.jsp"), "www.iros.go.kr");
        assert_eq!(site_of("www.iros.go.kr/a/b"), "www.iros.go.kr");
        assert_eq!(site_of(""), "");
    }
}
