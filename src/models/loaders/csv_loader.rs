//! CSV 输入加载
//!
//! 表头：등기상호,등기소,법인구분,등기부상태,본지점구분,주말여부

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};

use crate::error::{AppError, FileError, InputError};
use crate::models::record::{RecordField, RecordInput, PRIMARY_KEY_HEADER};

/// 期望的列数（主键 + 5 个可选字段）
pub const EXPECTED_COLUMNS: usize = 1 + RecordField::ORDER.len();

/// 从 CSV 文件加载记录
pub async fn load_records_from_csv(path: impl AsRef<Path>) -> Result<Vec<RecordInput>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AppError::File(FileError::NotFound {
            path: path.display().to_string(),
        })
        .into());
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取CSV文件: {}", path.display()))?;

    let records = parse_records(&content).ok_or_else(|| {
        AppError::Input(InputError::EmptyInput {
            path: path.display().to_string(),
        })
    })?;

    info!(
        "✓ 从 {} 加载了 {} 条记录",
        path.file_name().unwrap_or_default().to_string_lossy(),
        records.len()
    );
    Ok(records)
}

/// 解析 CSV 文本
///
/// 第一行为表头；缺少主键的行被忽略；重复的主键只保留第一条。
/// 没有任何非空行时返回 `None`。
pub fn parse_records(content: &str) -> Option<Vec<RecordInput>> {
    let mut lines = content
        .lines()
        .map(|line| line.trim_start_matches('\u{feff}'))
        .filter(|line| !line.trim().is_empty());

    let header = lines.next()?;
    validate_header(header);

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for (row_index, line) in lines.enumerate() {
        let values: Vec<&str> = line.split(',').map(str::trim).collect();
        let identifier = values.first().copied().unwrap_or_default();

        if identifier.is_empty() {
            continue;
        }
        if !seen.insert(identifier.to_string()) {
            warn!("⚠️ 第 {} 行重复的记录已忽略: {}", row_index + 2, identifier);
            continue;
        }

        let supplied = RecordField::ORDER
            .iter()
            .zip(values.iter().skip(1))
            .map(|(&field, &value)| (field, value));
        records.push(RecordInput::new(identifier, supplied));
    }

    Some(records)
}

fn validate_header(header: &str) {
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    if columns.len() != EXPECTED_COLUMNS {
        let expected: Vec<&str> = std::iter::once(PRIMARY_KEY_HEADER)
            .chain(RecordField::ORDER.iter().map(|f| f.header()))
            .collect();
        warn!(
            "⚠️ CSV 表头列数为 {} (期望 {})",
            columns.len(),
            EXPECTED_COLUMNS
        );
        warn!("📋 期望表头: {}", expected.join(", "));
        warn!("📋 实际表头: {}", columns.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "등기상호,등기소,법인구분,등기부상태,본지점구분,주말여부";

    #[test]
    fn test_rows_without_primary_key_are_excluded() {
        let content = format!(
            "{}\n가나다,서울,,,,\n,부산,주식회사,,,\n라마바\n\n",
            HEADER
        );
        let records = parse_records(&content).unwrap();
        let raw_rows = content.lines().filter(|l| !l.trim().is_empty()).count();

        assert_eq!(records.len(), 2);
        assert!(records.len() <= raw_rows - 1);
        assert_eq!(records[0].identifier(), "가나다");
        assert_eq!(records[0].supplied(RecordField::RegistryOffice), Some("서울"));
        assert_eq!(records[1].value(RecordField::Weekend), "N");
    }

    #[test]
    fn test_duplicate_identifiers_keep_first() {
        let content = format!("{}\n가나다,서울\n가나다,부산\n", HEADER);
        let records = parse_records(&content).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value(RecordField::RegistryOffice), "서울");
    }

    #[test]
    fn test_short_header_still_loads() {
        let records = parse_records("등기상호,등기소,법인구분\n가나다,,주식회사\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].supplied(RecordField::EntityType), Some("주식회사"));
    }

    #[test]
    fn test_empty_content_is_none() {
        assert!(parse_records("\n\n").is_none());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        writeln!(file, "가나다,서울중앙지방법원,주식회사,,,Y").unwrap();

        let records = load_records_from_csv(file.path()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value(RecordField::Weekend), "Y");
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        assert!(load_records_from_csv("no/such/file.csv").await.is_err());
    }
}
