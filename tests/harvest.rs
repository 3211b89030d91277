//! 付款后收取的集成测试

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{row, FakeSurface, PRIMARY};

use iros_batch::infrastructure::{Checkpoint, Intent, SurfaceId};
use iros_batch::orchestrator::Harvester;
use iros_batch::services::{DocumentPostProcessor, SecondarySurfaceSync, SyncSettings};

const WAIT: Duration = Duration::from_millis(5);

fn fast_sync() -> SecondarySurfaceSync {
    SecondarySurfaceSync::new(SyncSettings {
        appear_timeout: Duration::from_millis(5),
        load_timeout: Duration::from_millis(5),
        poll_interval: Duration::from_millis(1),
        detect_polls: 2,
        max_polls: 5,
        required_clear: 2,
    })
}

/// 把下载好的文件移到保存目录
struct MoveTo(PathBuf);

#[async_trait]
impl DocumentPostProcessor for MoveTo {
    async fn process(&self, artifact: &Path) -> Result<PathBuf> {
        let file_name = artifact
            .file_name()
            .ok_or_else(|| anyhow!("没有文件名"))?;
        let target = self.0.join(file_name);
        tokio::fs::copy(artifact, &target).await?;
        tokio::fs::remove_file(artifact).await?;
        Ok(target)
    }
}

struct Unreadable;

#[async_trait]
impl DocumentPostProcessor for Unreadable {
    async fn process(&self, _artifact: &Path) -> Result<PathBuf> {
        Err(anyhow!("pdftotext 执行失败"))
    }
}

fn popup_surface(download_dir: &Path) -> FakeSurface {
    let dir = download_dir.to_path_buf();
    FakeSurface::with(move |state| {
        state.popup_on.insert(Intent::IssuedViewButton);
        state.download_dir = Some(dir);
    })
}

#[tokio::test]
async fn test_failed_item_is_skipped_and_next_is_saved() {
    let downloads = tempfile::tempdir().unwrap();
    let saved_dir = tempfile::tempdir().unwrap();
    let surface = popup_surface(downloads.path());
    surface.state().download_failures = 1;
    let sync = fast_sync();
    let processor = MoveTo(saved_dir.path().to_path_buf());

    let report = Harvester::new(&surface, &sync, &processor, downloads.path(), WAIT)
        .harvest(2)
        .await
        .unwrap();

    assert_eq!(report.attempted(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 1);
    assert!(report.failed[0].1.contains("저장 버튼 응답 없음"));
    assert_eq!(report.saved, vec![saved_dir.path().join("download-1.pdf")]);
    assert!(report.saved[0].exists());

    let state = surface.state();
    assert_eq!(state.navigations, vec![Checkpoint::IssuedList]);
    assert_eq!(state.focused, SurfaceId(PRIMARY.to_string()));
    // 失败的那一项没有重试
    assert_eq!(
        state
            .clicks
            .iter()
            .filter(|c| **c == Intent::IssuedViewButton)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_each_popup_is_closed_after_saving() {
    let downloads = tempfile::tempdir().unwrap();
    let saved_dir = tempfile::tempdir().unwrap();
    let surface = popup_surface(downloads.path());
    let sync = fast_sync();
    let processor = MoveTo(saved_dir.path().to_path_buf());

    let report = Harvester::new(&surface, &sync, &processor, downloads.path(), WAIT)
        .harvest(2)
        .await
        .unwrap();

    assert_eq!(report.saved.len(), 2);
    assert!(report.failed.is_empty());

    let state = surface.state();
    assert_eq!(
        state.closed,
        vec![
            SurfaceId("popup-1".to_string()),
            SurfaceId("popup-2".to_string())
        ]
    );
    assert_eq!(state.surfaces, vec![SurfaceId(PRIMARY.to_string())]);
    assert_eq!(state.focused, SurfaceId(PRIMARY.to_string()));
    assert_eq!(state.unselect_calls, 2);
}

#[tokio::test]
async fn test_post_processing_failure_keeps_download() {
    let downloads = tempfile::tempdir().unwrap();
    let surface = popup_surface(downloads.path());
    let sync = fast_sync();

    let report = Harvester::new(&surface, &sync, &Unreadable, downloads.path(), WAIT)
        .harvest(1)
        .await
        .unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.saved, vec![downloads.path().join("download-1.pdf")]);
}

#[tokio::test]
async fn test_unchanged_first_row_stops_harvest() {
    let downloads = tempfile::tempdir().unwrap();
    let surface = FakeSurface::with(|state| {
        state.view_button_hidden = true;
        state.pages = Some(vec![vec![row(0, "한빛상사", "서울중앙지방법원 등기국", "주식회사")]]);
        state.stuck_pagination = true;
    });
    let sync = fast_sync();

    let report = Harvester::new(&surface, &sync, &Unreadable, downloads.path(), WAIT)
        .harvest(5)
        .await
        .unwrap();

    // 没有可查阅的证明书不算失败，直接结束
    assert_eq!(report.attempted(), 0);
    let state = surface.state();
    assert_eq!(state.next_page_calls, 1);
    assert!(!state.clicks.contains(&Intent::IssuedViewButton));
}

#[tokio::test]
async fn test_last_page_stops_harvest() {
    let downloads = tempfile::tempdir().unwrap();
    let surface = FakeSurface::with(|state| {
        state.view_button_hidden = true;
    });
    let sync = fast_sync();

    let report = Harvester::new(&surface, &sync, &Unreadable, downloads.path(), WAIT)
        .harvest(3)
        .await
        .unwrap();

    assert_eq!(report.attempted(), 0);
    assert_eq!(surface.state().next_page_calls, 1);
}
