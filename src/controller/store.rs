use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;

use super::{request::RequestKey, response::CapturedResponse};

/// 单一代的缓存
///
/// 并发写入同一个键时以最后一次为准，同一代的静态资源内容不会变化。
#[derive(Debug)]
pub struct CacheStore {
    generation: String,
    entries: DashMap<RequestKey, CapturedResponse>,
}

impl CacheStore {
    fn new(generation: &str) -> Self {
        Self {
            generation: generation.to_string(),
            entries: DashMap::new(),
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn match_request(&self, key: &RequestKey) -> Option<CapturedResponse> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn put(&self, key: RequestKey, mut response: CapturedResponse) {
        response.stored_at = Some(Utc::now());
        self.entries.insert(key, response);
    }

    pub fn delete(&self, key: &RequestKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 所有代的缓存，以代号为键
///
/// 克隆只复制句柄，后台写入任务持有同一份存储。
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    stores: Arc<DashMap<String, Arc<CacheStore>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开代号对应的缓存，不存在时创建
    pub fn open(&self, generation: &str) -> Arc<CacheStore> {
        self.stores
            .entry(generation.to_string())
            .or_insert_with(|| Arc::new(CacheStore::new(generation)))
            .value()
            .clone()
    }

    pub fn get(&self, generation: &str) -> Option<Arc<CacheStore>> {
        self.stores.get(generation).map(|store| store.value().clone())
    }

    pub fn has(&self, generation: &str) -> bool {
        self.stores.contains_key(generation)
    }

    pub fn delete(&self, generation: &str) -> bool {
        self.stores.remove(generation).is_some()
    }

    /// 所有代号，按字典序
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.stores.iter().map(|s| s.key().clone()).collect();
        keys.sort();
        keys
    }

    /// 在任意一代中查找
    pub fn contains_anywhere(&self, key: &RequestKey) -> bool {
        self.stores.iter().any(|store| store.contains(key))
    }
}
