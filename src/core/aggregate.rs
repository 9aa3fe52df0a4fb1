//! Consignment aggregate store.
//!
//! Every change to a consignment is a whole-record read-merge-write: the
//! current record is fetched, the patch is merged shallowly (a key in the
//! patch replaces the whole top-level value) and the merged record is written
//! back with a full update. Without optimistic concurrency the last writer
//! wins on the whole record, so two concurrent submissions against the same
//! consignment can overwrite each other's unrelated sections.

use crate::domain::model::{Collection, Consignment, ConsignmentStatus, EntityId};
use crate::domain::ports::{Backend, Credential};
use crate::utils::error::{DeskError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub type Patch = Map<String, Value>;

/// 一次合併寫入的內容：要覆蓋的頂層欄位與可選的新狀態
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsignmentUpdate {
    pub fields: Patch,
    pub status: Option<ConsignmentStatus>,
}

impl ConsignmentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn section<T: Serialize>(self, key: impl Into<String>, value: &T) -> Result<Self> {
        Ok(self.set(key, serde_json::to_value(value)?))
    }

    pub fn with_status(mut self, status: Option<ConsignmentStatus>) -> Self {
        self.status = status;
        self
    }
}

/// 淺層合併：patch 中的每個 key 整個取代 current 對應的值
pub fn merge(current: &Patch, update: &ConsignmentUpdate) -> Patch {
    let mut merged = current.clone();
    for (key, value) in &update.fields {
        merged.insert(key.clone(), value.clone());
    }
    if let Some(status) = &update.status {
        merged.insert("status".to_string(), Value::String(status.label().to_string()));
    }
    merged
}

pub struct ConsignmentStore<B> {
    backend: Arc<B>,
    optimistic_concurrency: bool,
}

impl<B> Clone for ConsignmentStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            optimistic_concurrency: self.optimistic_concurrency,
        }
    }
}

impl<B: Backend> ConsignmentStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            optimistic_concurrency: false,
        }
    }

    /// 啟用後以 ETag / If-Match 偵測並發寫入，衝突時回傳 Conflict
    pub fn with_optimistic_concurrency(mut self, enabled: bool) -> Self {
        self.optimistic_concurrency = enabled;
        self
    }

    pub async fn create(&self, date: NaiveDate, credential: &Credential) -> Result<Consignment> {
        let body = serde_json::json!({
            "date": date,
            "status": ConsignmentStatus::NotStarted.label(),
        });
        let created = self
            .backend
            .create(Collection::Consignment, &body, credential)
            .await?;
        let consignment: Consignment = serde_json::from_value(created)?;
        tracing::info!("Created consignment {:?} dated {}", consignment.id, date);
        Ok(consignment)
    }

    pub async fn get(&self, id: EntityId, credential: &Credential) -> Result<Consignment> {
        let fetched = self
            .backend
            .fetch(Collection::Consignment, id, credential)
            .await?;
        Ok(serde_json::from_value(fetched.body)?)
    }

    pub async fn list(&self, credential: &Credential) -> Result<Vec<Consignment>> {
        self.backend
            .list(Collection::Consignment, credential)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(DeskError::from))
            .collect()
    }

    pub async fn delete(&self, id: EntityId, credential: &Credential) -> Result<()> {
        self.backend
            .delete(Collection::Consignment, id, credential)
            .await?;
        tracing::info!("Deleted consignment {}", id);
        Ok(())
    }

    /// updateConsignment(id, partialFields, newStatus?)
    ///
    /// 只在原始 JSON 上合併，不解析成 `Consignment`，回傳已寫入的整筆紀錄
    pub async fn update_consignment(
        &self,
        id: EntityId,
        fields: Patch,
        new_status: Option<ConsignmentStatus>,
        credential: &Credential,
    ) -> Result<Patch> {
        let update = ConsignmentUpdate {
            fields,
            status: new_status,
        };
        self.merge_and_write(id, credential, move |_| Ok(update))
            .await
    }

    /// 先讀取目前紀錄，由 `decide` 依現況決定要合併的內容，再整筆寫回
    pub async fn update_with<F>(
        &self,
        id: EntityId,
        credential: &Credential,
        decide: F,
    ) -> Result<Consignment>
    where
        F: FnOnce(&Consignment) -> Result<ConsignmentUpdate> + Send,
    {
        self.update_raw_with(id, credential, |current_map| {
            let current: Consignment = serde_json::from_value(Value::Object(current_map.clone()))?;
            decide(&current)
        })
        .await
    }

    /// 與 `update_with` 相同，但 `decide` 看到的是原始 JSON
    ///
    /// 合併結果在寫入前就解析完成；寫入成功後不會再因回應內容而失敗。
    pub async fn update_raw_with<F>(
        &self,
        id: EntityId,
        credential: &Credential,
        decide: F,
    ) -> Result<Consignment>
    where
        F: FnOnce(&Patch) -> Result<ConsignmentUpdate> + Send,
    {
        let mut planned: Option<Consignment> = None;
        let committed = self
            .merge_and_write(id, credential, |current_map| {
                let update = decide(current_map)?;
                planned = Some(serde_json::from_value(Value::Object(merge(
                    current_map,
                    &update,
                )))?);
                Ok(update)
            })
            .await?;

        match (serde_json::from_value(Value::Object(committed)), planned) {
            (Ok(consignment), _) => Ok(consignment),
            (Err(e), Some(consignment)) => {
                tracing::warn!(
                    "Consignment {} was written but the response could not be read ({}), using the merged record",
                    id,
                    e
                );
                Ok(consignment)
            }
            (Err(e), None) => Err(e.into()),
        }
    }

    async fn merge_and_write<F>(
        &self,
        id: EntityId,
        credential: &Credential,
        decide: F,
    ) -> Result<Patch>
    where
        F: FnOnce(&Patch) -> Result<ConsignmentUpdate> + Send,
    {
        let fetched = self
            .backend
            .fetch(Collection::Consignment, id, credential)
            .await?;

        let current = match fetched.body {
            Value::Object(map) => map,
            other => {
                return Err(DeskError::Persistence {
                    operation: format!("read consignment/{}", id),
                    status: 200,
                    message: format!("expected a JSON object, got {}", other),
                })
            }
        };

        let update = decide(&current)?;
        if let Some(patched_id) = update.fields.get("id") {
            if patched_id.as_i64() != Some(id) {
                return Err(DeskError::validation(
                    "id",
                    format!("cannot move consignment {} to id {}", id, patched_id),
                ));
            }
        }

        let merged = merge(&current, &update);
        let precondition = if self.optimistic_concurrency {
            if fetched.etag.is_none() {
                tracing::warn!(
                    "Backend sent no ETag for consignment {}, falling back to last-write-wins",
                    id
                );
            }
            fetched.etag.as_deref()
        } else {
            None
        };

        tracing::debug!(
            "Writing consignment {} with keys {:?}",
            id,
            update.fields.keys().collect::<Vec<_>>()
        );
        let written = self
            .backend
            .update(
                Collection::Consignment,
                id,
                &Value::Object(merged.clone()),
                precondition,
                credential,
            )
            .await?;

        if let Some(status) = &update.status {
            tracing::info!("Consignment {} status -> {}", id, status);
        }
        // 後端回應不是物件時，以送出的合併結果為準
        Ok(match written {
            Value::Object(map) => map,
            _ => merged,
        })
    }
}
