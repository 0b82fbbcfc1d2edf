//! Playbook HTTP 服务
//!
//! 入口：初始化日志、加载配置、创建外部服务句柄与流水线，确保向量库集合存在后启动 axum。
//! 配置文件可通过 `--config <path>` 或 PLAYBOOK_CONFIG 指定。

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use playbook::{cli::ServeArgs, config::load_config_or_default, observability, server, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServeArgs::parse();
    observability::init();

    let cfg = load_config_or_default(args.config);

    let pipeline = Pipeline::from_config(&cfg).context("Failed to create vector store client")?;
    pipeline.ensure_schema().await;
    let app = server::router(Arc::new(pipeline));

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind))?;
    tracing::info!("Playbook API: http://{}", cfg.server.bind);
    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}
