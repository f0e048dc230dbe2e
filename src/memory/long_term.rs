//! 长期记忆接口：跨会话检索
//!
//! 核心只通过 MemoryStore 使用它：search(query, top_k, filter) 返回超过相似度阈值的记录，store(record) 写入。
//! InMemoryStore 用关键词重叠近似相似度，后续可接 Qdrant 等真实向量库。

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一条记忆
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub text: String,
    /// 领域/主题，可用作过滤条件
    pub topic: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            topic: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// 检索命中：记录与相似度分数（0..=1）
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f32,
}

/// 检索过滤：目前只支持按 topic 精确匹配
#[derive(Clone, Debug, Default)]
pub struct MemoryFilter {
    pub topic: Option<String>,
}

/// 长期记忆 trait；实现需可跨会话并发使用，核心不额外加锁
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// 按相似度降序返回至多 top_k 条超过阈值的记录
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MemoryFilter>,
    ) -> Vec<ScoredRecord>;

    async fn store(&self, record: MemoryRecord);

    /// 是否启用（Noop 实现返回 false）
    fn enabled(&self) -> bool {
        true
    }
}

/// 空实现：未启用长期记忆时使用
#[derive(Clone, Default)]
pub struct NoopMemory;

#[async_trait]
impl MemoryStore for NoopMemory {
    async fn search(&self, _query: &str, _top_k: usize, _filter: Option<&MemoryFilter>) -> Vec<ScoredRecord> {
        Vec::new()
    }

    async fn store(&self, _record: MemoryRecord) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// 将文本切分为小写词集合，用于简单相似度
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

/// 简单内存实现：相似度 = 查询词命中比例
#[derive(Clone)]
pub struct InMemoryStore {
    store: Arc<RwLock<Vec<(MemoryRecord, HashSet<String>)>>>,
    score_threshold: f32,
    max_entries: usize,
}

impl InMemoryStore {
    pub fn new(score_threshold: f32, max_entries: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(Vec::new())),
            score_threshold,
            max_entries,
        }
    }

    fn score(query: &HashSet<String>, doc: &HashSet<String>) -> f32 {
        if query.is_empty() {
            return 0.0;
        }
        query.intersection(doc).count() as f32 / query.len() as f32
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(0.6, 1000)
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MemoryFilter>,
    ) -> Vec<ScoredRecord> {
        let query_tokens = tokenize_lower(query);
        let store = match self.store.read() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        let topic = filter.and_then(|f| f.topic.as_deref());
        let mut scored: Vec<ScoredRecord> = store
            .iter()
            .filter(|(record, _)| topic.map_or(true, |t| record.topic.as_deref() == Some(t)))
            .map(|(record, tokens)| ScoredRecord {
                record: record.clone(),
                score: Self::score(&query_tokens, tokens),
            })
            .filter(|s| s.score > 0.0 && s.score >= self.score_threshold)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }

    async fn store(&self, record: MemoryRecord) {
        if record.text.trim().is_empty() {
            return;
        }
        let tokens = tokenize_lower(&record.text);
        let mut store = match self.store.write() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        store.push((record, tokens));
        let n = store.len();
        if n > self.max_entries {
            store.drain(0..n - self.max_entries);
        }
    }
}
