//! 输入记录（一家公司）

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// 记录的可选配置字段（主键“등기상호”之外的列，按 CSV 列顺序）
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RecordField {
    /// 관할등기소
    RegistryOffice,
    /// 법인구분
    EntityType,
    /// 등기부상태
    Status,
    /// 본지점구분
    BranchType,
    /// 주말여부
    Weekend,
}

impl RecordField {
    /// CSV 中主键之后的列顺序
    pub const ORDER: [RecordField; 5] = [
        RecordField::RegistryOffice,
        RecordField::EntityType,
        RecordField::Status,
        RecordField::BranchType,
        RecordField::Weekend,
    ];

    /// CSV 表头名
    pub fn header(self) -> &'static str {
        match self {
            RecordField::RegistryOffice => "등기소",
            RecordField::EntityType => "법인구분",
            RecordField::Status => "등기부상태",
            RecordField::BranchType => "본지점구분",
            RecordField::Weekend => "주말여부",
        }
    }

    /// 缺省值表
    pub fn default_value(self) -> &'static str {
        match self {
            RecordField::RegistryOffice => "전체등기소",
            RecordField::EntityType => "전체 법인(지배인, 미성년자, 법정대리인 제외)",
            RecordField::Status => "살아있는 등기",
            RecordField::BranchType => "전체 본지점",
            RecordField::Weekend => "N",
        }
    }
}

/// 主键列的表头
pub const PRIMARY_KEY_HEADER: &str = "등기상호";

/// 一个字段的值以及它的来源
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    pub value: String,
    /// true 表示来自输入文件；false 表示由缺省值表补齐
    pub supplied: bool,
}

/// 输入记录
///
/// 读入后不再修改
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordInput {
    identifier: String,
    fields: BTreeMap<RecordField, FieldValue>,
}

impl RecordInput {
    /// 创建记录，未提供（或为空）的字段用缺省值补齐
    pub fn new<I, S>(identifier: impl Into<String>, supplied: I) -> Self
    where
        I: IntoIterator<Item = (RecordField, S)>,
        S: Into<String>,
    {
        let mut provided: BTreeMap<RecordField, String> = supplied
            .into_iter()
            .map(|(field, value)| (field, value.into().trim().to_string()))
            .filter(|(_, value)| !value.is_empty())
            .collect();

        let fields = RecordField::ORDER
            .iter()
            .map(|&field| {
                let value = match provided.remove(&field) {
                    Some(value) => FieldValue {
                        value,
                        supplied: true,
                    },
                    None => FieldValue {
                        value: field.default_value().to_string(),
                        supplied: false,
                    },
                };
                (field, value)
            })
            .collect();

        Self {
            identifier: identifier.into().trim().to_string(),
            fields,
        }
    }

    /// 只有主键的记录
    pub fn named(identifier: impl Into<String>) -> Self {
        Self::new(identifier, std::iter::empty::<(RecordField, String)>())
    }

    /// 主键（등기상호）
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// 字段的生效值（已补齐缺省值）
    pub fn value(&self, field: RecordField) -> &str {
        self.fields
            .get(&field)
            .map(|v| v.value.as_str())
            .unwrap_or_else(|| field.default_value())
    }

    /// 仅当字段由输入文件提供时返回
    pub fn supplied(&self, field: RecordField) -> Option<&str> {
        self.fields
            .get(&field)
            .filter(|v| v.supplied)
            .map(|v| v.value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (RecordField, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }
}

impl fmt::Display for RecordInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.identifier,
            self.value(RecordField::RegistryOffice),
            self.value(RecordField::EntityType)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let record = RecordInput::new("가나다", [(RecordField::RegistryOffice, "서울중앙지방법원")]);
        assert_eq!(record.value(RecordField::RegistryOffice), "서울중앙지방법원");
        assert_eq!(record.value(RecordField::Weekend), "N");
        assert_eq!(record.supplied(RecordField::RegistryOffice), Some("서울중앙지방법원"));
        assert_eq!(record.supplied(RecordField::EntityType), None);
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let record = RecordInput::new(" 가나다 ", [(RecordField::EntityType, "  ")]);
        assert_eq!(record.identifier(), "가나다");
        assert_eq!(record.supplied(RecordField::EntityType), None);
        assert_eq!(
            record.value(RecordField::EntityType),
            RecordField::EntityType.default_value()
        );
    }
}
