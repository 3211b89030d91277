use iros_batch::browser::connect_to_browser_and_page;
use iros_batch::config::Config;
use iros_batch::infrastructure::{CdpSurface, Checkpoint, RemoteSurface};
use iros_batch::logger;
use iros_batch::models::load_records_from_csv;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_browser_connection() {
    // 初始化日志
    logger::init(true);

    // 加载配置
    let config = Config::from_env().expect("加载配置失败");

    // 测试浏览器连接
    let result = connect_to_browser_and_page(
        config.browser_debug_port,
        &config.target_url,
        config.target_title.as_deref(),
    )
    .await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_navigate_to_search_page() {
    logger::init(true);

    let config = Config::from_env().expect("加载配置失败");

    let (browser, page) = connect_to_browser_and_page(
        config.browser_debug_port,
        &config.target_url,
        config.target_title.as_deref(),
    )
    .await
    .expect("连接浏览器失败");

    // 注意：需要先在浏览器中登录 IROS
    let surface = CdpSurface::new(browser, page, config.target_url.clone());
    surface.health().await.expect("远端会话不可用");
    surface
        .navigate(Checkpoint::Search)
        .await
        .expect("导航到检索页面失败");

    assert!(
        surface.at_checkpoint(Checkpoint::Search).await.unwrap(),
        "应该位于法人检索页面"
    );
}

#[tokio::test]
#[ignore]
async fn test_load_input_csv() {
    logger::init(true);

    let config = Config::from_env().expect("加载配置失败");

    // 测试加载输入文件
    let result = load_records_from_csv(&config.input_csv).await;

    assert!(result.is_ok(), "应该能够加载输入 CSV");

    let records = result.unwrap();
    println!("找到 {} 条记录", records.len());
}
