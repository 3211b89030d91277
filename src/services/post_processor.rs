//! 文件后处理服务 - 业务能力层
//!
//! 只负责"把下载好的证明书按内容重命名"能力

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tokio::fs;
use tokio::process::Command;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// 文件名中不允许出现的字符
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
/// 回退文件名的最大长度（字符）
const FALLBACK_MAX_CHARS: usize = 20;
const FALLBACK_NAME: &str = "renamed_pdf";

/// 下载文件的后处理
#[async_trait]
pub trait DocumentPostProcessor: Send + Sync {
    /// 处理一个文件，返回处理后的路径
    async fn process(&self, artifact: &Path) -> Result<PathBuf>;
}

/// 文本提取
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// 提取第一页文本
    async fn first_page_text(&self, path: &Path) -> Result<String>;
}

/// 调用 poppler 的 `pdftotext`
pub struct PdftotextExtractor;

#[async_trait]
impl TextExtractor for PdftotextExtractor {
    async fn first_page_text(&self, path: &Path) -> Result<String> {
        let output = Command::new("pdftotext")
            .args(["-f", "1", "-l", "1", "-enc", "UTF-8"])
            .arg(path)
            .arg("-")
            .output()
            .await
            .context("无法执行 pdftotext（请确认已安装 poppler）")?;
        if !output.status.success() {
            bail!(
                "pdftotext 执行失败: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// 从证明书文本中提取的字段
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DocumentFields {
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub first_line: String,
}

/// 字段提取规则
pub struct FieldPatterns {
    labelled_name: Vec<Regex>,
    bare_name: Vec<Regex>,
    hangul_word: Regex,
    labelled_number: Vec<Regex>,
    bare_number: Vec<Regex>,
}

impl FieldPatterns {
    pub fn new() -> Result<Self> {
        let compile = |patterns: &[&str]| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| Regex::new(p).with_context(|| format!("正则表达式无效: {}", p)))
                .collect()
        };
        Ok(Self {
            labelled_name: compile(&[
                r"상호\s+([가-힣]+)\s*주식회사",
                r"상호\s+([가-힣]+)",
                r"상호\s*[:：]?\s*([가-힣]+)",
            ])?,
            bare_name: compile(&[
                r"([가-힣]+)\s*주식회사\s*\([^)]+\)",
                r"([가-힣]+)\s*주식회사",
                r"([가-힣]+)\s*\([^)]+\)",
            ])?,
            hangul_word: Regex::new(r"[가-힣]{2,}")?,
            labelled_number: compile(&[r"등록번호\s*[:：]?\s*(\d+-\d+)", r"등록번호\s+(\d+-\d+)"])?,
            bare_number: compile(&[r"(\d{3}-\d{2}-\d{5})", r"(\d{3}-\d{2}-\d{6})", r"(\d{4}-\d{2}-\d{5})"])?,
        })
    }

    /// 从第一页文本中提取字段
    pub fn extract(&self, text: &str) -> DocumentFields {
        let lines: Vec<&str> = text
            .trim()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        DocumentFields {
            company_name: self.company_name(&lines),
            registration_number: self.registration_number(&lines),
            first_line: lines.first().map(|l| l.to_string()).unwrap_or_default(),
        }
    }

    fn company_name(&self, lines: &[&str]) -> Option<String> {
        let labelled = lines
            .iter()
            .filter(|line| line.contains("상호"))
            .find_map(|line| first_capture(&self.labelled_name, line));
        if labelled.is_some() {
            return labelled;
        }

        let bare = lines
            .iter()
            .filter(|line| {
                !["등기사항전부증명서", "등기번호", "등록번호"]
                    .iter()
                    .any(|skip| line.contains(skip))
            })
            .find_map(|line| first_capture(&self.bare_name, line));
        if bare.is_some() {
            return bare;
        }

        lines
            .first()
            .and_then(|line| self.hangul_word.find(line))
            .map(|m| m.as_str().to_string())
    }

    fn registration_number(&self, lines: &[&str]) -> Option<String> {
        let all_patterns: Vec<&Regex> = self
            .labelled_number
            .iter()
            .chain(self.bare_number.iter())
            .collect();

        for line in lines.iter().filter(|line| line.contains("등록번호")) {
            for pattern in &all_patterns {
                if let Some(found) = pattern.captures(line).and_then(|c| c.get(1)) {
                    return Some(found.as_str().trim().to_string());
                }
            }
        }

        let full_text = lines.join(" ");
        self.bare_number
            .iter()
            .find_map(|pattern| pattern.captures(&full_text).and_then(|c| c.get(1)))
            .map(|m| m.as_str().trim().to_string())
    }
}

/// 取第一个匹配的捕获组（至少两个字）
fn first_capture(patterns: &[Regex], line: &str) -> Option<String> {
    patterns
        .iter()
        .filter_map(|p| p.captures(line).and_then(|c| c.get(1)))
        .map(|m| m.as_str().trim().to_string())
        .find(|name| name.chars().count() >= 2)
}

/// 由字段生成新文件名：`yymmdd_상호_등록번호.pdf`，缺字段时用第一行文字
pub fn derive_file_name(fields: &DocumentFields, date_prefix: &str) -> String {
    match (&fields.company_name, &fields.registration_number) {
        (Some(name), Some(number)) => format!("{}_{}_{}.pdf", date_prefix, name, number),
        _ => {
            let cleaned: String = fields
                .first_line
                .chars()
                .filter(|c| !FORBIDDEN_CHARS.contains(c))
                .take(FALLBACK_MAX_CHARS)
                .collect();
            let cleaned = cleaned.trim();
            let stem = if cleaned.is_empty() {
                FALLBACK_NAME
            } else {
                cleaned
            };
            format!("{}.pdf", stem)
        }
    }
}

/// 按内容重命名 PDF
pub struct PdfRenamer<E: TextExtractor = PdftotextExtractor> {
    extractor: E,
    patterns: FieldPatterns,
}

impl PdfRenamer<PdftotextExtractor> {
    pub fn new() -> Result<Self> {
        Self::with_extractor(PdftotextExtractor)
    }
}

impl<E: TextExtractor> PdfRenamer<E> {
    pub fn with_extractor(extractor: E) -> Result<Self> {
        Ok(Self {
            extractor,
            patterns: FieldPatterns::new()?,
        })
    }
}

#[async_trait]
impl<E: TextExtractor> DocumentPostProcessor for PdfRenamer<E> {
    async fn process(&self, artifact: &Path) -> Result<PathBuf> {
        let text = self.extractor.first_page_text(artifact).await?;
        let fields = self.patterns.extract(&text);
        debug!("提取到的字段: {:?}", fields);
        if fields.company_name.is_none() || fields.registration_number.is_none() {
            warn!("⚠️ 无法提取商号或登记号码，使用第一行文字命名");
        }

        let date_prefix = chrono::Local::now().format("%y%m%d").to_string();
        let file_name = derive_file_name(&fields, &date_prefix);
        let dir = artifact.parent().unwrap_or_else(|| Path::new("."));
        let target = unique_path(dir, &file_name).await;

        if target == artifact {
            return Ok(target);
        }
        match fs::rename(artifact, &target).await {
            Ok(()) => {
                info!("📄 文件已重命名: {}", target.display());
                Ok(target)
            }
            Err(e) => {
                warn!("⚠️ 重命名失败（保留原文件名 {}）: {}", artifact.display(), e);
                Ok(artifact.to_path_buf())
            }
        }
    }
}

/// 同名文件已存在时追加序号
async fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }
    let stem = file_name.trim_end_matches(".pdf");
    for n in 2.. {
        let candidate = dir.join(format!("{}_{}.pdf", stem, n));
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
    }
    candidate
}

/// 在超时内等待目录中出现 `since` 之后修改的最新 PDF
pub async fn wait_for_artifact(
    dir: &Path,
    since: SystemTime,
    timeout: Duration,
) -> Result<Option<PathBuf>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(path) = newest_pdf(dir, since).await? {
            return Ok(Some(path));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        sleep(Duration::from_millis(500)).await;
    }
}

async fn newest_pdf(dir: &Path, since: SystemTime) -> Result<Option<PathBuf>> {
    if !fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(None);
    }
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("无法读取下载目录: {}", dir.display()))?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if !is_pdf {
            continue;
        }
        let modified = entry.metadata().await?.modified()?;
        if modified < since {
            continue;
        }
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}
