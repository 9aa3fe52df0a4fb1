//! Wizard steps layered on the aggregate store.
//!
//! Each step first creates or updates its own sub-resource and then merges
//! `{stepKey: {id, ...fields}}` into the consignment. Goods-scoped steps
//! (packaging, damage) update one ConsignmentItem directly and never go
//! through the aggregate store, so the `goods` array embedded in the
//! consignment can lag behind the item records until the aggregate is
//! re-fetched or the goods are re-attached.

use crate::core::aggregate::{ConsignmentStore, ConsignmentUpdate};
use crate::core::repository::{ConsignmentItemRepository, PackagingRepository, Raw, Repository};
use crate::core::status::WorkflowStep;
use crate::domain::model::{
    AirwayBill, Commodity, Consignee, Consignment, ConsignmentItem, ConsignmentStatus, CustomClearance,
    EntityId, GoodsDeclaration, Packing, RecoveryDone, Trader,
};
use crate::domain::ports::{Backend, Credential, Resource, StatusTransitionPolicy};
use crate::utils::error::{DeskError, Result};
use crate::utils::validation::{validate_non_negative, Validate};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// 精靈中以整筆 consignment 為單位的步驟輸入
#[derive(Debug, Clone, PartialEq)]
pub enum StepSubmission {
    /// 選擇既有的 consignee
    Consignee(EntityId),
    /// 選擇既有的 trader
    Trader(EntityId),
    AirwayBill(AirwayBill),
    GoodsDeclaration(GoodsDeclaration),
    CustomClearance(CustomClearance),
    Packing(Packing),
    RecoveryDone(RecoveryDone),
}

impl StepSubmission {
    pub fn step(&self) -> WorkflowStep {
        match self {
            Self::Consignee(_) => WorkflowStep::Consignee,
            Self::Trader(_) => WorkflowStep::Trader,
            Self::AirwayBill(_) => WorkflowStep::AirwayBill,
            Self::GoodsDeclaration(_) => WorkflowStep::GoodsDeclaration,
            Self::CustomClearance(_) => WorkflowStep::CustomClearance,
            Self::Packing(_) => WorkflowStep::Packing,
            Self::RecoveryDone(_) => WorkflowStep::RecoveryDone,
        }
    }

    /// 從步驟 key 與 JSON 欄位建立輸入；consignee / trader 只需要 id
    pub fn from_json(step_key: &str, fields: Value) -> Result<Self> {
        let step = WorkflowStep::from_key(step_key)
            .ok_or_else(|| DeskError::validation("step", format!("unknown step '{}'", step_key)))?;

        let reference_id = |fields: &Value| {
            fields
                .as_i64()
                .or_else(|| fields.get("id").and_then(Value::as_i64))
                .ok_or_else(|| DeskError::validation(step_key, "an id is required"))
        };

        Ok(match step {
            WorkflowStep::Consignee => Self::Consignee(reference_id(&fields)?),
            WorkflowStep::Trader => Self::Trader(reference_id(&fields)?),
            WorkflowStep::AirwayBill => Self::AirwayBill(serde_json::from_value(fields)?),
            WorkflowStep::GoodsDeclaration => {
                Self::GoodsDeclaration(serde_json::from_value(fields)?)
            }
            WorkflowStep::CustomClearance => Self::CustomClearance(serde_json::from_value(fields)?),
            WorkflowStep::Packing => Self::Packing(serde_json::from_value(fields)?),
            WorkflowStep::RecoveryDone => Self::RecoveryDone(serde_json::from_value(fields)?),
            WorkflowStep::GoodsPackaging | WorkflowStep::GoodsDamage => {
                return Err(DeskError::validation(
                    "step",
                    format!("'{}' is submitted per item", step_key),
                ))
            }
        })
    }
}

/// 步驟第一次完成時要轉換到的狀態
pub fn transition_for(step: WorkflowStep) -> Option<ConsignmentStatus> {
    match step {
        WorkflowStep::Consignee
        | WorkflowStep::Trader
        | WorkflowStep::AirwayBill
        | WorkflowStep::GoodsDeclaration => Some(ConsignmentStatus::Pending),
        WorkflowStep::CustomClearance => Some(ConsignmentStatus::CustomCleared),
        WorkflowStep::Packing => Some(ConsignmentStatus::Completed),
        WorkflowStep::RecoveryDone => Some(ConsignmentStatus::Fulfilled),
        WorkflowStep::GoodsPackaging | WorkflowStep::GoodsDamage => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub consignment: Consignment,
    pub transitioned: Option<ConsignmentStatus>,
}

/// 新增貨物時的輸入
#[derive(Debug, Clone, PartialEq)]
pub struct NewGood {
    pub commodity_id: EntityId,
    pub weight_per_unit: Decimal,
    pub commodity_per_unit_cost: Decimal,
    pub quantity: Decimal,
}

pub struct ConsignmentWorkflow<B> {
    backend: Arc<B>,
    store: ConsignmentStore<B>,
    items: ConsignmentItemRepository<B>,
    policy: StatusTransitionPolicy,
}

impl<B: Backend> ConsignmentWorkflow<B> {
    pub fn new(backend: Arc<B>, store: ConsignmentStore<B>) -> Self {
        Self {
            items: ConsignmentItemRepository::new(Arc::clone(&backend)),
            backend,
            store,
            policy: StatusTransitionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StatusTransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &ConsignmentStore<B> {
        &self.store
    }

    fn repository<T: Resource + Validate>(&self) -> Repository<T, B> {
        Repository::new(Arc::clone(&self.backend))
    }

    pub async fn submit_step(
        &self,
        consignment_id: EntityId,
        submission: StepSubmission,
        credential: &Credential,
    ) -> Result<StepOutcome> {
        let step = submission.step();
        let section = match submission {
            StepSubmission::Consignee(id) => {
                to_section(&self.repository::<Consignee>().get(id, credential).await?)?
            }
            StepSubmission::Trader(id) => {
                to_section(&self.repository::<Trader>().get(id, credential).await?)?
            }
            StepSubmission::AirwayBill(airway_bill) => {
                // airway bill 沒有獨立的後端集合，直接嵌入
                airway_bill.validate()?;
                to_section(&airway_bill)?
            }
            StepSubmission::GoodsDeclaration(record) => {
                to_section(&self.repository().save(&record, credential).await?)?
            }
            StepSubmission::CustomClearance(record) => {
                to_section(&self.repository().save(&record, credential).await?)?
            }
            StepSubmission::Packing(record) => {
                to_section(&self.repository().save(&record, credential).await?)?
            }
            StepSubmission::RecoveryDone(record) => {
                to_section(&self.repository().save(&record, credential).await?)?
            }
        };

        let policy = self.policy;
        let mut transitioned = None;
        let consignment = self
            .store
            .update_with(consignment_id, credential, |current| {
                let first_completion = !step.is_complete(current);
                let status = match policy {
                    StatusTransitionPolicy::InitialCompletionOnly if !first_completion => None,
                    _ => transition_for(step),
                };
                transitioned = status.clone();
                Ok(ConsignmentUpdate::new()
                    .set(step.key(), section)
                    .with_status(status))
            })
            .await?;

        tracing::info!(
            "Consignment {}: step {} submitted{}",
            consignment_id,
            step,
            transitioned
                .as_ref()
                .map(|s| format!(", status -> {}", s))
                .unwrap_or_default()
        );
        Ok(StepOutcome {
            consignment,
            transitioned,
        })
    }

    /// 新建貨物紀錄後，以 id 附加到 consignment 的 goods 陣列
    pub async fn add_goods(
        &self,
        consignment_id: EntityId,
        goods: &[NewGood],
        credential: &Credential,
    ) -> Result<Consignment> {
        if goods.is_empty() {
            return Err(DeskError::validation("goods", "at least one item is required"));
        }

        let commodities = self.repository::<Commodity>();
        let mut created = Vec::with_capacity(goods.len());
        for good in goods {
            match self.create_item(&commodities, good, credential).await {
                Ok(item) => created.push(item),
                Err(e) => {
                    self.discard_items(&created, credential).await;
                    return Err(e);
                }
            }
        }

        // 保留既有貨物的原始 JSON，只在陣列尾端加入新建的紀錄
        let appended = created
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let result = self
            .store
            .update_raw_with(consignment_id, credential, move |current| {
                let mut all = match current.get("goods") {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                all.extend(appended);
                Ok(ConsignmentUpdate::new().set("goods", Value::Array(all)))
            })
            .await;

        match result {
            Ok(consignment) => {
                tracing::info!(
                    "Consignment {}: attached {} goods",
                    consignment_id,
                    created.len()
                );
                Ok(consignment)
            }
            Err(e) => {
                self.discard_items(&created, credential).await;
                Err(e)
            }
        }
    }

    async fn create_item(
        &self,
        commodities: &Repository<Commodity, B>,
        good: &NewGood,
        credential: &Credential,
    ) -> Result<ConsignmentItem> {
        let commodity = commodities.get(good.commodity_id, credential).await?;
        let item = ConsignmentItem {
            id: None,
            item: Some(commodity),
            packaging: None,
            weight_per_unit: good.weight_per_unit,
            commodity_per_unit_cost: good.commodity_per_unit_cost,
            packaging_per_unit_cost: Decimal::ZERO,
            quantity: good.quantity,
            damage: None,
        };
        self.items.create(&item, credential).await
    }

    /// 附加失敗時刪掉已新建但未掛上 consignment 的貨物
    async fn discard_items(&self, created: &[ConsignmentItem], credential: &Credential) {
        for id in created.iter().filter_map(|item| item.id) {
            match self.items.delete(id, credential).await {
                Ok(()) => tracing::warn!("Removed unattached goods item {}", id),
                Err(e) => tracing::warn!("Goods item {} is left unattached: {}", id, e),
            }
        }
    }

    /// 只更新單筆貨物，不經過 aggregate store
    pub async fn assign_packaging(
        &self,
        item_id: EntityId,
        packaging_id: EntityId,
        packaging_per_unit_cost: Decimal,
        credential: &Credential,
    ) -> Result<ConsignmentItem> {
        validate_non_negative("packagingPerUnitCost", packaging_per_unit_cost)?;
        let packaging = PackagingRepository::new(Arc::clone(&self.backend))
            .get(packaging_id, credential)
            .await?;

        let (_, raw) = self.items.get_with_raw(item_id, credential).await?;
        let mut fields = Raw::new();
        fields.insert("packaging".to_string(), to_section(&packaging)?);
        fields.insert(
            "packagingPerUnitCost".to_string(),
            serde_json::to_value(packaging_per_unit_cost)?,
        );
        self.items
            .update_fields(item_id, &raw, fields, credential)
            .await
    }

    pub async fn assess_damage(
        &self,
        item_id: EntityId,
        damage: Decimal,
        credential: &Credential,
    ) -> Result<ConsignmentItem> {
        validate_non_negative("damage", damage)?;
        let (_, raw) = self.items.get_with_raw(item_id, credential).await?;
        let mut fields = Raw::new();
        fields.insert("damage".to_string(), serde_json::to_value(damage)?);
        self.items
            .update_fields(item_id, &raw, fields, credential)
            .await
    }
}

/// 在本地快取的 consignment 中替換同 id 的貨物；不寫回後端
pub fn patch_cached_goods(consignment: &mut Consignment, item: &ConsignmentItem) -> bool {
    let Some(goods) = consignment.goods.as_mut() else {
        return false;
    };
    match goods.iter_mut().find(|good| good.id.is_some() && good.id == item.id) {
        Some(slot) => {
            *slot = item.clone();
            true
        }
        None => false,
    }
}

fn to_section<T: Serialize>(record: &T) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}
