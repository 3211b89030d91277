//! 分页定位服务 - 业务能力层
//!
//! 只负责"在分页的检索结果里找到并勾选目标行"能力

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::infrastructure::{RemoteSurface, ResultRow};
use crate::models::record::{RecordField, RecordInput};

/// 定位结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocateResult {
    /// 在第 `page` 页（从 1 开始）找到并勾选了该行
    Found { page: usize, row: ResultRow },
    /// 翻遍所有页面都没有匹配
    ExhaustedNoMatch,
}

/// 行匹配条件
///
/// 主键按子串包含匹配；额外字段只有在输入中明确提供时才参与匹配，
/// 且必须在同一行上全部满足。
#[derive(Clone, Debug)]
pub struct RowPredicate {
    primary: String,
    secondary: Vec<(RecordField, String)>,
}

impl RowPredicate {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Vec::new(),
        }
    }

    /// 追加一个同行约束（空值或缺省值不构成约束）
    pub fn with(mut self, field: RecordField, value: impl Into<String>) -> Self {
        let value = value.into().trim().to_string();
        if !value.is_empty() && value != field.default_value() {
            self.secondary.push((field, value));
        }
        self
    }

    /// 由记录构建：등기상호 + 明确提供的 등기소 / 법인구분
    pub fn for_record(record: &RecordInput) -> Self {
        [RecordField::RegistryOffice, RecordField::EntityType]
            .into_iter()
            .fold(Self::new(record.identifier()), |predicate, field| {
                match record.supplied(field) {
                    Some(value) => predicate.with(field, value),
                    None => predicate,
                }
            })
    }

    pub fn matches(&self, row: &ResultRow) -> bool {
        if self.primary.is_empty() || !row.name.contains(&self.primary) {
            return false;
        }
        self.secondary.iter().all(|(field, value)| {
            let cell = match field {
                RecordField::RegistryOffice => &row.registry_office,
                RecordField::EntityType => &row.entity_type,
                // 结果表中没有这些列
                _ => return true,
            };
            cell.contains(value.as_str())
        })
    }
}

/// 当前页的指纹：第一行的商号
fn fingerprint(rows: &[ResultRow]) -> Option<&str> {
    rows.first()
        .map(|row| row.name.as_str())
        .filter(|name| !name.is_empty())
}

/// 分页定位服务
pub struct PaginatedLocator {
    max_pages: usize,
}

impl PaginatedLocator {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
        }
    }

    /// 逐页查找满足条件的行并勾选
    ///
    /// 翻页后指纹不变（或没有翻页控件）视为没有下一页，不会重复翻页。
    pub async fn locate(
        &self,
        surface: &dyn RemoteSurface,
        predicate: &RowPredicate,
    ) -> Result<LocateResult> {
        let mut rows = surface.result_rows().await?;
        let mut page = 1;

        loop {
            debug!("第 {} 页共 {} 行", page, rows.len());
            if let Some(row) = rows.iter().find(|row| predicate.matches(row)) {
                info!("✓ 在第 {} 页第 {} 行找到: {}", page, row.index + 1, row.name);
                surface.select_row(row.index).await?;
                return Ok(LocateResult::Found {
                    page,
                    row: row.clone(),
                });
            }

            let Some(before) = fingerprint(&rows).map(str::to_string) else {
                debug!("第 {} 页没有结果行", page);
                return Ok(LocateResult::ExhaustedNoMatch);
            };

            if page >= self.max_pages {
                warn!("⚠️ 已翻到第 {} 页（上限），停止查找", page);
                return Ok(LocateResult::ExhaustedNoMatch);
            }

            if !surface.next_page().await? {
                debug!("没有下一页控件");
                return Ok(LocateResult::ExhaustedNoMatch);
            }

            let next_rows = surface.result_rows().await?;
            match fingerprint(&next_rows) {
                Some(after) if after != before => {
                    rows = next_rows;
                    page += 1;
                }
                _ => {
                    debug!("翻页后结果未变化（首行: {}），视为最后一页", before);
                    return Ok(LocateResult::ExhaustedNoMatch);
                }
            }
        }
    }
}
