//! 代码目录索引：遍历目录，每个源文件整体作为一个 CodeFragment 写入向量库
//!
//! 不做切块；非 UTF-8 或空文件跳过，嵌入或写入失败则中止。

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::llm::{EmbedError, Embedder};
use crate::store::{CodeFragment, Collection, StoreError, VectorStore};

/// 参与索引的文件扩展名
pub const INDEXED_EXTENSIONS: &[&str] = &["py", "js", "ts", "rs"];

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("schema setup failed: {0}")]
    Schema(#[source] StoreError),

    #[error("walking {0:?} failed: {1}")]
    Walk(PathBuf, #[source] walkdir::Error),

    #[error("embedding {0:?} failed: {1}")]
    Embedding(PathBuf, #[source] EmbedError),

    #[error("indexing {0:?} failed: {1}")]
    Insert(PathBuf, #[source] StoreError),
}

/// 索引统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub indexed: usize,
    pub skipped: usize,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn is_indexed(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| INDEXED_EXTENSIONS.contains(&ext))
}

/// 遍历 root（跳过隐藏目录），按文件名排序写入
pub async fn index_directory(
    root: &Path,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
) -> Result<IngestReport, IngestError> {
    store.ensure_schema().await.map_err(IngestError::Schema)?;

    let mut report = IngestReport::default();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|e| IngestError::Walk(root.to_path_buf(), e))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_indexed(path) {
            continue;
        }

        let code = match tokio::fs::read_to_string(path).await {
            Ok(code) if !code.trim().is_empty() => code,
            Ok(_) => {
                tracing::debug!("skipping empty file {:?}", path);
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("skipping unreadable file {:?}: {}", path, e);
                report.skipped += 1;
                continue;
            }
        };
        let file_name = entry.file_name().to_string_lossy().to_string();

        let vector = embedder
            .embed(&code)
            .await
            .map_err(|e| IngestError::Embedding(path.to_path_buf(), e))?;
        store
            .insert(
                Collection::CodeFragment,
                CodeFragment::properties(&code, &file_name),
                vector,
            )
            .await
            .map_err(|e| IngestError::Insert(path.to_path_buf(), e))?;

        tracing::info!("Indexed {:?}", path);
        report.indexed += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockEmbedder;
    use crate::store::{InMemoryVectorStore, NearQuery};

    #[tokio::test]
    async fn test_index_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("strings.py"), "def reverse(s):\n    return s[::-1]\n").unwrap();
        std::fs::create_dir(dir.path().join("web")).unwrap();
        std::fs::write(dir.path().join("web").join("app.ts"), "export const x = 1;\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# not code").unwrap();
        std::fs::write(dir.path().join("empty.rs"), "  \n").unwrap();
        std::fs::write(dir.path().join("binary.js"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("hook.py"), "print('x')").unwrap();

        let store = InMemoryVectorStore::new();
        let embedder = MockEmbedder::default();
        let report = index_directory(dir.path(), &embedder, &store).await.unwrap();

        assert_eq!(report, IngestReport { indexed: 2, skipped: 2 });
        assert_eq!(store.len(Collection::CodeFragment), 2);

        let query = embedder.embed("reverse").await.unwrap();
        let hits = store
            .query(Collection::CodeFragment, &query, &NearQuery::new(5))
            .await
            .unwrap();
        let names: Vec<String> = hits
            .into_iter()
            .map(|h| CodeFragment::try_from(h).unwrap().file_name)
            .collect();
        assert!(names.contains(&"strings.py".to_string()));
        assert!(names.contains(&"app.ts".to_string()));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "x = 1").unwrap();
        let store = InMemoryVectorStore::new();
        let err = index_directory(dir.path(), &MockEmbedder::unreachable(), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Embedding(_, _)));
        assert_eq!(store.insert_count(), 0);
    }
}
