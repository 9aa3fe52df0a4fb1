use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub type EntityId = i64;

/// 後端資源集合 (REST collection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Consignment,
    ConsignmentItem,
    Commodity,
    Consignee,
    Trader,
    Packer,
    Packaging,
    IataAgent,
    CustomAgent,
    FinancialInstrument,
    Fiu,
    GoodsDeclaration,
    CustomClearance,
    Packing,
    RecoveryDone,
}

impl Collection {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Consignment => "consignment",
            Self::ConsignmentItem => "consignmentitem",
            Self::Commodity => "commodity",
            Self::Consignee => "consignee",
            Self::Trader => "trader",
            Self::Packer => "packer",
            Self::Packaging => "packaging",
            Self::IataAgent => "iataagent",
            Self::CustomAgent => "customagent",
            Self::FinancialInstrument => "financialinstrument",
            Self::Fiu => "fiu",
            Self::GoodsDeclaration => "goods-declaration",
            Self::CustomClearance => "customclearance",
            Self::Packing => "packing",
            Self::RecoveryDone => "recovery-done",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// 指向其他實體的參照；後端可能回傳純 id 或整個物件，一律只保留 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Ref(pub EntityId);

impl<'de> Deserialize<'de> for Ref {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Id(EntityId),
            Object { id: EntityId },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Id(id) | Repr::Object { id } => Ref(id),
        })
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consignment 狀態標籤；後端為自由文字，未知值原樣保留
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConsignmentStatus {
    #[default]
    NotStarted,
    Pending,
    CustomCleared,
    Completed,
    Fulfilled,
    Other(String),
}

impl ConsignmentStatus {
    pub fn label(&self) -> &str {
        match self {
            Self::NotStarted => "Not started",
            Self::Pending => "Pending",
            Self::CustomCleared => "Custom Cleared",
            Self::Completed => "Completed",
            Self::Fulfilled => "Fulfilled",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for ConsignmentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Not started" => Self::NotStarted,
            "Pending" => Self::Pending,
            "Custom Cleared" => Self::CustomCleared,
            "Completed" => Self::Completed,
            "Fulfilled" => Self::Fulfilled,
            _ => Self::Other(value),
        }
    }
}

impl From<ConsignmentStatus> for String {
    fn from(value: ConsignmentStatus) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for ConsignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Trader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ntn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Consignee {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Packer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IataAgent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomAgent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Commodity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hs_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Packaging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_unit: Option<Decimal>,
}

/// 可被 goods declaration 消耗餘額的金融工具 (例如信用狀)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInstrument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader: Option<Ref>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consignee: Option<Ref>,
    pub amount: Decimal,
    pub balance: Decimal,
}

impl FinancialInstrument {
    /// 新建工具時餘額等於原始金額
    pub fn new(number: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: None,
            number: number.into(),
            trader: None,
            consignee: None,
            amount,
            balance: amount,
        }
    }

    /// 錯誤訊息中用來指名工具的識別字
    pub fn label(&self) -> String {
        if self.number.trim().is_empty() {
            self.id.map(|id| id.to_string()).unwrap_or_default()
        } else {
            self.number.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInstrumentUtilization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub financial_instrument: Ref,
    pub goods_declaration: Ref,
    pub utilized: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AirwayBill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iata_agent: Option<IataAgent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoodsDeclaration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomClearance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<CustomAgent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Packing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packer: Option<Packer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charges: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecoveryDone {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub amount: Decimal,
    pub currency: String,
    pub exchange_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DailyExpense {
    pub description: String,
    pub amount: Decimal,
}

/// Consignment 內的一筆貨物
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsignmentItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Commodity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging: Option<Packaging>,
    #[serde(default)]
    pub weight_per_unit: Decimal,
    #[serde(default)]
    pub commodity_per_unit_cost: Decimal,
    #[serde(default)]
    pub packaging_per_unit_cost: Decimal,
    #[serde(default)]
    pub quantity: Decimal,
    /// None 表示尚未評估損壞
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<Decimal>,
}

/// Aggregate root：一筆貨運的完整文件紀錄
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Consignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ConsignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consignee: Option<Consignee>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader: Option<Trader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airway_bill: Option<AirwayBill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goods_declaration: Option<GoodsDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_clearance: Option<CustomClearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packing: Option<Packing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_done: Option<RecoveryDone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_expenses: Option<Vec<DailyExpense>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goods: Option<Vec<ConsignmentItem>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ref_accepts_id_or_object() {
        let plain: Ref = serde_json::from_value(serde_json::json!(7)).unwrap();
        let nested: Ref =
            serde_json::from_value(serde_json::json!({"id": 7, "number": "LC-1"})).unwrap();

        assert_eq!(plain, Ref(7));
        assert_eq!(nested, Ref(7));
        assert_eq!(serde_json::to_value(nested).unwrap(), serde_json::json!(7));
    }

    #[test]
    fn test_status_keeps_unknown_labels() {
        let status: ConsignmentStatus =
            serde_json::from_value(serde_json::json!("On Hold")).unwrap();
        assert_eq!(status, ConsignmentStatus::Other("On Hold".to_string()));

        let cleared: ConsignmentStatus =
            serde_json::from_value(serde_json::json!("Custom Cleared")).unwrap();
        assert_eq!(cleared, ConsignmentStatus::CustomCleared);
        assert_eq!(
            serde_json::to_value(&cleared).unwrap(),
            serde_json::json!("Custom Cleared")
        );
    }

    #[test]
    fn test_consignment_tolerates_null_sections() {
        let consignment: Consignment = serde_json::from_value(serde_json::json!({
            "id": 4,
            "date": "2024-03-01",
            "status": "Pending",
            "trader": null,
            "goods": [{"id": 1, "quantity": 3, "weightPerUnit": 1.5, "damage": null}]
        }))
        .unwrap();

        assert!(consignment.trader.is_none());
        let goods = consignment.goods.unwrap();
        assert_eq!(goods[0].weight_per_unit, dec!(1.5));
        assert!(goods[0].damage.is_none());
    }

    #[test]
    fn test_reference_only_sections_parse() {
        let consignment: Consignment = serde_json::from_value(serde_json::json!({
            "id": 1,
            "status": "Pending",
            "trader": {"id": 4},
            "goodsDeclaration": {"id": 8},
            "recoveryDone": {"id": 2},
            "goods": [{"id": 5, "item": {"id": 3}}]
        }))
        .unwrap();

        assert_eq!(consignment.trader.and_then(|t| t.id), Some(4));
        assert_eq!(consignment.recovery_done.and_then(|r| r.id), Some(2));
        let goods = consignment.goods.unwrap();
        assert_eq!(goods[0].item.as_ref().and_then(|c| c.id), Some(3));
    }

    #[test]
    fn test_new_instrument_starts_with_full_balance() {
        let instrument = FinancialInstrument::new("LC-42", dec!(1200));
        assert_eq!(instrument.balance, dec!(1200));
        assert_eq!(instrument.label(), "LC-42");
    }
}
