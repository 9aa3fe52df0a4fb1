use crate::domain::model::{
    Collection, Commodity, Consignee, Consignment, ConsignmentItem, CustomAgent, CustomClearance,
    EntityId, FinancialInstrument, FinancialInstrumentUtilization, GoodsDeclaration, IataAgent,
    Packaging, Packer, Packing, RecoveryDone, Trader,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// 每次呼叫都要明確傳入的 bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// GET 單筆時一併帶回的版本標記 (ETag)
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub body: Value,
    pub etag: Option<String>,
}

/// 外部持久化服務：以 JSON 進行標準 CRUD
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list(&self, collection: Collection, credential: &Credential) -> Result<Vec<Value>>;

    async fn fetch(
        &self,
        collection: Collection,
        id: EntityId,
        credential: &Credential,
    ) -> Result<Fetched>;

    async fn create(
        &self,
        collection: Collection,
        body: &Value,
        credential: &Credential,
    ) -> Result<Value>;

    /// `precondition` 為 Some 時需在版本不符時回傳 Conflict
    async fn update(
        &self,
        collection: Collection,
        id: EntityId,
        body: &Value,
        precondition: Option<&str>,
        credential: &Credential,
    ) -> Result<Value>;

    async fn delete(
        &self,
        collection: Collection,
        id: EntityId,
        credential: &Credential,
    ) -> Result<()>;
}

/// 對應到某個後端集合的型別化實體
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> Option<EntityId>;
}

macro_rules! impl_resource {
    ($($ty:ty => $collection:ident),* $(,)?) => {
        $(
            impl Resource for $ty {
                const COLLECTION: Collection = Collection::$collection;

                fn id(&self) -> Option<EntityId> {
                    self.id
                }
            }
        )*
    };
}

impl_resource! {
    Consignment => Consignment,
    ConsignmentItem => ConsignmentItem,
    Commodity => Commodity,
    Consignee => Consignee,
    Trader => Trader,
    Packer => Packer,
    Packaging => Packaging,
    IataAgent => IataAgent,
    CustomAgent => CustomAgent,
    FinancialInstrument => FinancialInstrument,
    FinancialInstrumentUtilization => Fiu,
    GoodsDeclaration => GoodsDeclaration,
    CustomClearance => CustomClearance,
    Packing => Packing,
    RecoveryDone => RecoveryDone,
}

/// 狀態轉換策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusTransitionPolicy {
    /// 只在步驟第一次完成時轉換狀態，之後的編輯不再轉換
    #[default]
    InitialCompletionOnly,
    EverySubmission,
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn request_timeout(&self) -> Option<Duration>;
    fn optimistic_concurrency(&self) -> bool;
    fn transition_policy(&self) -> StatusTransitionPolicy;
}
