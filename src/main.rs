use anyhow::Result;
use iros_batch::config::{Config, DEFAULT_CONFIG_FILE};
use iros_batch::{logger, App};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load(DEFAULT_CONFIG_FILE)?;

    // 初始化日志
    logger::init(config.verbose_logging);

    // 初始化并运行应用
    let _summary = App::initialize(config).await?.run().await?;

    Ok(())
}
