//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use std::sync::Mutex;

use anyhow::Result;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// JS 执行器
///
/// 职责：
/// - 持有主页面以及当前获得焦点的页面（可能是弹窗）
/// - 暴露 eval() 能力
/// - 不认识记录 / 阶段
pub struct JsExecutor {
    primary: Page,
    current: Mutex<Page>,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self {
            current: Mutex::new(page.clone()),
            primary: page,
        }
    }

    /// 主页面
    pub fn primary(&self) -> &Page {
        &self.primary
    }

    /// 当前获得焦点的页面
    pub fn current(&self) -> Page {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 切换焦点
    pub fn set_current(&self, page: Page) {
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = page;
    }

    /// 焦点回到主页面
    pub fn reset_to_primary(&self) {
        self.set_current(self.primary.clone());
    }

    /// 在当前页面执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let page = self.current();
        Self::eval_on(&page, js_code).await
    }

    /// 在主页面执行 JS 代码（不受焦点影响）
    pub async fn eval_on_primary(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        Self::eval_on(&self.primary, js_code).await
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    async fn eval_on(page: &Page, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }
}
