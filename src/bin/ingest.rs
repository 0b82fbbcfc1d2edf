//! 代码索引任务：把目录下的源文件写入 CodeFragment 集合
//!
//! 用法: playbook-ingest <dir> [--config <path>]

use anyhow::{bail, Context};
use clap::Parser;
use playbook::{
    cli::IngestArgs,
    config::{load_config, StoreBackend},
    ingest::index_directory,
    llm::create_embedder_from_config,
    observability,
    store::create_store_from_config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let IngestArgs { dir: root, config } = IngestArgs::parse();
    observability::init();

    let cfg = load_config(config).context("Failed to load config")?;
    if cfg.store.backend == StoreBackend::Memory {
        bail!("ingestion needs a persistent store, set store.backend = \"weaviate\"");
    }

    let embedder = create_embedder_from_config(&cfg);
    let store = create_store_from_config(&cfg.store).context("Failed to create vector store client")?;

    let report = index_directory(&root, embedder.as_ref(), store.as_ref())
        .await
        .with_context(|| format!("Ingestion of {:?} failed", root))?;
    tracing::info!(
        "Ingestion complete: {} files indexed, {} skipped",
        report.indexed,
        report.skipped
    );
    Ok(())
}
