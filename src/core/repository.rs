use crate::domain::model::{
    AirwayBill, Collection, Commodity, Consignee, Consignment, ConsignmentItem, CustomAgent,
    CustomClearance, EntityId, FinancialInstrument, FinancialInstrumentUtilization,
    GoodsDeclaration, IataAgent, Packaging, Packer, Packing, RecoveryDone, Trader,
};
use crate::domain::ports::{Backend, Credential, Resource};
use crate::utils::error::{DeskError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_non_negative, validate_optional_non_negative,
    validate_required_field, Validate,
};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// 單一實體集合的型別化 CRUD，直接轉送到後端
pub struct Repository<T, B> {
    backend: Arc<B>,
    _resource: PhantomData<fn() -> T>,
}

impl<T, B> Clone for Repository<T, B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _resource: PhantomData,
        }
    }
}

impl<T: Resource + Validate, B: Backend> Repository<T, B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            _resource: PhantomData,
        }
    }

    pub async fn list(&self, credential: &Credential) -> Result<Vec<T>> {
        let values = self.backend.list(T::COLLECTION, credential).await?;
        values
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(DeskError::from))
            .collect()
    }

    pub async fn get(&self, id: EntityId, credential: &Credential) -> Result<T> {
        let fetched = self.backend.fetch(T::COLLECTION, id, credential).await?;
        Ok(serde_json::from_value(fetched.body)?)
    }

    /// 送出前先在本地驗證，驗證失敗不會發出任何請求
    pub async fn create(&self, record: &T, credential: &Credential) -> Result<T> {
        record.validate()?;
        let body = serde_json::to_value(record)?;
        let created = self.backend.create(T::COLLECTION, &body, credential).await?;
        tracing::info!("Created {} record", T::COLLECTION);
        Ok(serde_json::from_value(created)?)
    }

    pub async fn update(&self, record: &T, credential: &Credential) -> Result<T> {
        let id = *validate_required_field("id", &record.id())?;
        record.validate()?;
        let body = serde_json::to_value(record)?;
        let updated = self
            .backend
            .update(T::COLLECTION, id, &body, None, credential)
            .await?;
        tracing::info!("Updated {}/{}", T::COLLECTION, id);
        Ok(serde_json::from_value(updated)?)
    }

    /// 有 id 時更新，否則新建
    pub async fn save(&self, record: &T, credential: &Credential) -> Result<T> {
        match record.id() {
            Some(_) => self.update(record, credential).await,
            None => self.create(record, credential).await,
        }
    }

    /// 連同原始 JSON 一起讀取，之後可用 `update_fields` 只覆蓋部分欄位
    pub async fn get_with_raw(&self, id: EntityId, credential: &Credential) -> Result<(T, Raw)> {
        let fetched = self.backend.fetch(T::COLLECTION, id, credential).await?;
        let raw = into_object(T::COLLECTION, fetched.body)?;
        let record = serde_json::from_value(Value::Object(raw.clone()))?;
        Ok((record, raw))
    }

    pub async fn list_with_raw(&self, credential: &Credential) -> Result<Vec<(T, Raw)>> {
        self.backend
            .list(T::COLLECTION, credential)
            .await?
            .into_iter()
            .map(|value| {
                let raw = into_object(T::COLLECTION, value)?;
                Ok((serde_json::from_value(Value::Object(raw.clone()))?, raw))
            })
            .collect()
    }

    /// 把 `fields` 覆蓋到讀到的原始紀錄後整筆寫回，模型沒有的欄位原樣保留。
    /// 寫入成功後回應無法解析時，回傳寫入前解析好的紀錄。
    pub async fn update_fields(
        &self,
        id: EntityId,
        raw: &Raw,
        fields: Raw,
        credential: &Credential,
    ) -> Result<T> {
        let mut merged = raw.clone();
        merged.extend(fields);
        let merged = Value::Object(merged);
        let planned: T = serde_json::from_value(merged.clone())?;

        let written = self
            .backend
            .update(T::COLLECTION, id, &merged, None, credential)
            .await?;
        tracing::info!("Updated {}/{}", T::COLLECTION, id);

        match serde_json::from_value(written) {
            Ok(record) => Ok(record),
            Err(e) => {
                tracing::warn!(
                    "{}/{} was written but the response could not be read: {}",
                    T::COLLECTION,
                    id,
                    e
                );
                Ok(planned)
            }
        }
    }

    pub async fn delete(&self, id: EntityId, credential: &Credential) -> Result<()> {
        self.backend.delete(T::COLLECTION, id, credential).await?;
        tracing::info!("Deleted {}/{}", T::COLLECTION, id);
        Ok(())
    }
}

/// 後端回傳的原始紀錄
pub type Raw = Map<String, Value>;

fn into_object(collection: Collection, value: Value) -> Result<Raw> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DeskError::Persistence {
            operation: format!("read {}", collection),
            status: 200,
            message: format!("expected a JSON object, got {}", other),
        }),
    }
}

pub type TraderRepository<B> = Repository<Trader, B>;
pub type ConsigneeRepository<B> = Repository<Consignee, B>;
pub type PackerRepository<B> = Repository<Packer, B>;
pub type IataAgentRepository<B> = Repository<IataAgent, B>;
pub type CustomAgentRepository<B> = Repository<CustomAgent, B>;
pub type CommodityRepository<B> = Repository<Commodity, B>;
pub type PackagingRepository<B> = Repository<Packaging, B>;
pub type FinancialInstrumentRepository<B> = Repository<FinancialInstrument, B>;
pub type FiuRepository<B> = Repository<FinancialInstrumentUtilization, B>;
pub type ConsignmentItemRepository<B> = Repository<ConsignmentItem, B>;

macro_rules! validate_named {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Validate for $ty {
                fn validate(&self) -> Result<()> {
                    validate_non_empty_string("name", &self.name)
                }
            }
        )*
    };
}

validate_named!(Trader, Consignee, Packer, IataAgent, CustomAgent, Commodity);

impl Validate for Packaging {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("name", &self.name)?;
        validate_optional_non_negative("costPerUnit", self.cost_per_unit)
    }
}

impl Validate for FinancialInstrument {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("number", &self.number)?;
        validate_non_negative("amount", self.amount)?;
        validate_non_negative("balance", self.balance)
    }
}

impl Validate for FinancialInstrumentUtilization {
    fn validate(&self) -> Result<()> {
        validate_non_negative("utilized", self.utilized)
    }
}

impl Validate for AirwayBill {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("number", &self.number)?;
        validate_optional_non_negative("weight", self.weight)?;
        validate_optional_non_negative("fee", self.fee)
    }
}

impl Validate for GoodsDeclaration {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("number", &self.number)?;
        validate_optional_non_negative("value", self.value)
    }
}

impl Validate for CustomClearance {
    fn validate(&self) -> Result<()> {
        validate_optional_non_negative("fee", self.fee)
    }
}

impl Validate for Packing {
    fn validate(&self) -> Result<()> {
        validate_optional_non_negative("charges", self.charges)
    }
}

impl Validate for RecoveryDone {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("currency", &self.currency)?;
        validate_non_negative("amount", self.amount)?;
        if self.exchange_rate <= rust_decimal::Decimal::ZERO {
            return Err(DeskError::validation("exchangeRate", "must be positive"));
        }
        Ok(())
    }
}

impl Validate for ConsignmentItem {
    fn validate(&self) -> Result<()> {
        validate_non_negative("quantity", self.quantity)?;
        validate_non_negative("weightPerUnit", self.weight_per_unit)?;
        validate_non_negative("commodityPerUnitCost", self.commodity_per_unit_cost)?;
        validate_non_negative("packagingPerUnitCost", self.packaging_per_unit_cost)?;
        validate_optional_non_negative("damage", self.damage)
    }
}

impl Validate for Consignment {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
