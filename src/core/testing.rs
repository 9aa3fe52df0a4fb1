//! 單元測試用的記憶體後端

use crate::domain::model::{Collection, EntityId};
use crate::domain::ports::{Backend, Credential, Fetched};
use crate::utils::error::{DeskError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct State {
    records: HashMap<Collection, BTreeMap<EntityId, Value>>,
    next_id: EntityId,
    calls: Vec<String>,
    failing_writes: HashSet<Collection>,
}

impl State {
    // 自動編號從 1001 起，避免和測試中手動指定的 id 衝突
    fn allocate(&mut self) -> EntityId {
        self.next_id += 1;
        1000 + self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, collection: Collection, record: Value) -> EntityId {
        let mut state = self.state.lock().await;
        let id = match record.get("id").and_then(Value::as_i64) {
            Some(id) => id,
            None => state.allocate(),
        };
        let mut record = record;
        record["id"] = Value::from(id);
        state.records.entry(collection).or_default().insert(id, record);
        id
    }

    pub async fn record(&self, collection: Collection, id: EntityId) -> Option<Value> {
        let state = self.state.lock().await;
        state.records.get(&collection)?.get(&id).cloned()
    }

    pub async fn all(&self, collection: Collection) -> Vec<Value> {
        let state = self.state.lock().await;
        state
            .records
            .get(&collection)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 之後對該集合的寫入與刪除都回傳 HTTP 500
    pub async fn fail_writes(&self, collection: Collection) {
        self.state.lock().await.failing_writes.insert(collection);
    }

    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    fn write_failure(collection: Collection) -> DeskError {
        DeskError::Persistence {
            operation: format!("write {}", collection),
            status: 500,
            message: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list(&self, collection: Collection, _credential: &Credential) -> Result<Vec<Value>> {
        self.state.lock().await.calls.push(format!("GET {}", collection));
        Ok(self.all(collection).await)
    }

    async fn fetch(
        &self,
        collection: Collection,
        id: EntityId,
        _credential: &Credential,
    ) -> Result<Fetched> {
        self.state
            .lock()
            .await
            .calls
            .push(format!("GET {}/{}", collection, id));
        let body = self
            .record(collection, id)
            .await
            .ok_or_else(|| DeskError::not_found(collection.path(), id))?;
        Ok(Fetched { body, etag: None })
    }

    async fn create(
        &self,
        collection: Collection,
        body: &Value,
        _credential: &Credential,
    ) -> Result<Value> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("POST {}", collection));
        if state.failing_writes.contains(&collection) {
            return Err(Self::write_failure(collection));
        }
        let id = state.allocate();
        let mut record = body.clone();
        record["id"] = Value::from(id);
        state
            .records
            .entry(collection)
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: Collection,
        id: EntityId,
        body: &Value,
        _precondition: Option<&str>,
        _credential: &Credential,
    ) -> Result<Value> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("PUT {}/{}", collection, id));
        if state.failing_writes.contains(&collection) {
            return Err(Self::write_failure(collection));
        }
        let records = state.records.entry(collection).or_default();
        if !records.contains_key(&id) {
            return Err(DeskError::not_found(collection.path(), id));
        }
        records.insert(id, body.clone());
        Ok(body.clone())
    }

    async fn delete(
        &self,
        collection: Collection,
        id: EntityId,
        _credential: &Credential,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("DELETE {}/{}", collection, id));
        if state.failing_writes.contains(&collection) {
            return Err(Self::write_failure(collection));
        }
        state
            .records
            .get_mut(&collection)
            .and_then(|r| r.remove(&id))
            .map(|_| ())
            .ok_or_else(|| DeskError::not_found(collection.path(), id))
    }
}

pub fn credential() -> Credential {
    Credential::bearer("test-token")
}
