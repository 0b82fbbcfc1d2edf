//! 流水线集成测试：端到端场景与学习闭环

use std::sync::Arc;

use playbook::llm::{Embedder, LlmError, MockEmbedder, MockLlmClient};
use playbook::pipeline::{LearningUpdate, Pipeline, Services, NEUTRAL_PRIOR};
use playbook::store::{CodeFragment, Collection, InMemoryVectorStore, NearQuery, Strategy, VectorStore};
use playbook::PipelineError;

async fn store_with_fragment(embedder: &MockEmbedder) -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    let code = "def reverse_string(s):\n    return s[::-1]";
    store
        .insert(
            Collection::CodeFragment,
            CodeFragment::properties(code, "strings.py"),
            embedder.embed(code).await.unwrap(),
        )
        .await
        .unwrap();
    store
}

async fn all_strategies(store: &InMemoryVectorStore, embedder: &MockEmbedder) -> Vec<Strategy> {
    let anchor = embedder.embed("any playbook").await.unwrap();
    store
        .query(Collection::Strategy, &anchor, &NearQuery::new(100))
        .await
        .unwrap()
        .into_iter()
        .map(|h| Strategy::try_from(h).unwrap())
        .collect()
}

#[tokio::test]
async fn test_reverse_string_end_to_end() {
    let embedder = MockEmbedder::default();
    let store = store_with_fragment(&embedder).await;
    let llm = Arc::new(
        MockLlmClient::new()
            .reply("1. Accept a string argument\n2. Return it sliced with [::-1]")
            .reply("def reverse(s):\n    return s[::-1]")
            .reply("0.9"),
    );
    let pipeline = Pipeline::new(Services {
        embedder: Arc::new(embedder.clone()),
        store: store.clone(),
        llm: llm.clone(),
    });

    let outcome = pipeline
        .run("Write a function that reverses a string")
        .await
        .unwrap();

    assert!(!outcome.answer.is_empty());
    assert!(matches!(outcome.learning, LearningUpdate::Recorded(score) if score == 0.9));
    assert_eq!(store.insert_count(), 2, "one fragment seeded + one new playbook");
    assert_eq!(store.update_count(), 1);

    let strategies = all_strategies(&store, &embedder).await;
    assert_eq!(strategies.len(), 1);
    assert_eq!(strategies[0].id, outcome.strategy_id);
    assert!((0.0..=1.0).contains(&strategies[0].confidence));

    // 代码片段进入了 Playbook 与回答的 prompt；阈值以下没有推荐 Playbook
    let strategy_prompt = &llm.prompt(0).unwrap()[1].content;
    assert!(strategy_prompt.contains("--- From strings.py ---"));
    assert!(!strategy_prompt.contains("Recommended Playbook"));
    let answer_prompt = &llm.prompt(1).unwrap()[1].content;
    assert!(answer_prompt.contains("2. Return it sliced with [::-1]"));
}

#[tokio::test]
async fn test_new_playbook_starts_neutral_before_reflection() {
    let embedder = MockEmbedder::default();
    let store = store_with_fragment(&embedder).await;
    // 回答阶段失败 → 不会进入反思，可以观察到刚创建时的置信度
    let llm = MockLlmClient::new()
        .reply("1. Do this\n2. Do that")
        .fail(LlmError::Request("HTTP 502".to_string()));
    let pipeline = Pipeline::new(Services {
        embedder: Arc::new(embedder.clone()),
        store: store.clone(),
        llm: Arc::new(llm),
    });

    assert!(pipeline.run("reverse a string").await.is_err());
    let strategies = all_strategies(&store, &embedder).await;
    assert_eq!(strategies.len(), 1);
    assert_eq!(strategies[0].confidence, NEUTRAL_PRIOR);
    assert_eq!(store.update_count(), 0);
}

#[tokio::test]
async fn test_llm_unavailable_persists_no_playbook() {
    let embedder = MockEmbedder::default();
    let store = store_with_fragment(&embedder).await;
    let pipeline = Pipeline::new(Services {
        embedder: Arc::new(embedder),
        store: store.clone(),
        llm: Arc::new(MockLlmClient::new().fail(LlmError::Request("connection refused".to_string()))),
    });

    let err = pipeline.run("Write a function that reverses a string").await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
    assert_eq!(store.insert_count(), 1, "only the seeded fragment");
    assert!(store.is_empty(Collection::Strategy));
}

#[tokio::test]
async fn test_high_confidence_playbook_is_reused() {
    let embedder = MockEmbedder::default();
    let store = store_with_fragment(&embedder).await;
    let llm = Arc::new(
        MockLlmClient::new()
            .reply("1. Slice the string backwards")
            .reply("s[::-1]")
            .reply("0.95")
            .reply("1. Slice again")
            .reply("s[::-1]")
            .reply("0.4"),
    );
    let pipeline = Pipeline::new(Services {
        embedder: Arc::new(embedder.clone()),
        store: store.clone(),
        llm: llm.clone(),
    });

    pipeline.run("reverse a string").await.unwrap();
    // 第二次请求：上次的 Playbook 置信度 0.95 > 0.7，应作为推荐出现在上下文中
    pipeline.run("reverse a string").await.unwrap();
    let second_strategy_prompt = &llm.prompt(3).unwrap()[1].content;
    assert!(second_strategy_prompt.contains("Recommended Playbook (confidence 0.95)"));
    assert!(second_strategy_prompt.contains("1. Slice the string backwards"));

    let mut confidences: Vec<f32> = all_strategies(&store, &embedder)
        .await
        .into_iter()
        .map(|s| s.confidence)
        .collect();
    confidences.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(confidences, vec![0.4, 0.95]);
}

#[tokio::test]
async fn test_concurrent_requests_each_create_one_playbook() {
    let embedder = MockEmbedder::default();
    let store = store_with_fragment(&embedder).await;
    let pipeline = Arc::new(Pipeline::new(Services {
        embedder: Arc::new(embedder.clone()),
        store: store.clone(),
        // 全部走回显：Playbook/回答非空，分数不可解析 → 0.5
        llm: Arc::new(MockLlmClient::new()),
    }));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.run(&format!("request {}", i)).await })
        })
        .collect();
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome.learning, LearningUpdate::Recorded(score) if score == 0.5));
    }

    assert_eq!(all_strategies(&store, &embedder).await.len(), 8);
    assert_eq!(store.update_count(), 8);
}
