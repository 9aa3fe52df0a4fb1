use crate::domain::model::Consignment;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// 精靈中的九個步驟，順序固定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    Consignee,
    Trader,
    AirwayBill,
    GoodsDeclaration,
    CustomClearance,
    Packing,
    RecoveryDone,
    GoodsPackaging,
    GoodsDamage,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 9] = [
        WorkflowStep::Consignee,
        WorkflowStep::Trader,
        WorkflowStep::AirwayBill,
        WorkflowStep::GoodsDeclaration,
        WorkflowStep::CustomClearance,
        WorkflowStep::Packing,
        WorkflowStep::RecoveryDone,
        WorkflowStep::GoodsPackaging,
        WorkflowStep::GoodsDamage,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Consignee => "consignee",
            Self::Trader => "trader",
            Self::AirwayBill => "airwayBill",
            Self::GoodsDeclaration => "goodsDeclaration",
            Self::CustomClearance => "customClearance",
            Self::Packing => "packing",
            Self::RecoveryDone => "recoveryDone",
            Self::GoodsPackaging => "goods/packaging",
            Self::GoodsDamage => "goods/damage",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.key() == key)
    }

    /// 該步驟在 consignment 上是否已完成
    pub fn is_complete(&self, consignment: &Consignment) -> bool {
        let goods = consignment.goods.as_deref().unwrap_or_default();
        match self {
            Self::Consignee => consignment.consignee.is_some(),
            Self::Trader => consignment.trader.is_some(),
            Self::AirwayBill => consignment.airway_bill.is_some(),
            Self::GoodsDeclaration => consignment.goods_declaration.is_some(),
            Self::CustomClearance => consignment.custom_clearance.is_some(),
            Self::Packing => consignment.packing.is_some(),
            Self::RecoveryDone => consignment.recovery_done.is_some(),
            // goods 類步驟只要任一筆完成即算完成
            Self::GoodsPackaging => goods.iter().any(|good| good.packaging.is_some()),
            Self::GoodsDamage => goods.iter().any(|good| good.damage.is_some()),
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStatus {
    steps: Vec<(WorkflowStep, bool)>,
}

impl WorkflowStatus {
    pub fn is_complete(&self, step: WorkflowStep) -> bool {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, done)| *done)
            .unwrap_or(false)
    }

    pub fn steps(&self) -> impl Iterator<Item = (WorkflowStep, bool)> + '_ {
        self.steps.iter().copied()
    }

    pub fn completed(&self) -> usize {
        self.steps.iter().filter(|(_, done)| *done).count()
    }

    pub fn all_complete(&self) -> bool {
        self.completed() == self.steps.len()
    }
}

impl Serialize for WorkflowStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.steps.len()))?;
        for (step, done) in &self.steps {
            map.serialize_entry(step.key(), done)?;
        }
        map.end()
    }
}

/// deriveStatus：純函式，不保留任何狀態
pub fn derive_status(consignment: &Consignment) -> WorkflowStatus {
    WorkflowStatus {
        steps: WorkflowStep::ALL
            .into_iter()
            .map(|step| (step, step.is_complete(consignment)))
            .collect(),
    }
}
