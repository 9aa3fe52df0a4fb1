use crate::domain::model::{
    AirwayBill, Consignee, Consignment, ConsignmentItem, ConsignmentStatus, CustomAgent,
    CustomClearance, EntityId, GoodsDeclaration, IataAgent, Packer, Packing, RecoveryDone, Trader,
};
use crate::utils::error::{DeskError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    pub item_id: Option<EntityId>,
    pub commodity: String,
    pub packaging: String,
    pub quantity: Decimal,
    pub weight_per_unit: Decimal,
    pub total_weight: Decimal,
    pub commodity_per_unit_cost: Decimal,
    pub total_commodity_cost: Decimal,
    pub packaging_per_unit_cost: Decimal,
    pub total_packaging_cost: Decimal,
    pub total_cost: Decimal,
    pub damage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub weight: Decimal,
    pub commodity_cost: Decimal,
    pub packaging_cost: Decimal,
    pub cost: Decimal,
    pub damage: Decimal,
}

/// 列印或匯出用的扁平化發票資料
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    pub consignment_id: Option<EntityId>,
    pub date: Option<NaiveDate>,
    pub status: ConsignmentStatus,
    pub trader: Trader,
    pub consignee: Consignee,
    pub airway_bill: AirwayBill,
    pub iata_agent: IataAgent,
    pub goods_declaration: GoodsDeclaration,
    pub custom_clearance: CustomClearance,
    pub custom_agent: CustomAgent,
    pub packing: Packing,
    pub packer: Packer,
    pub recovery: RecoveryDone,
    pub lines: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
}

fn require<'a, T>(value: &'a Option<T>, section: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| DeskError::IncompleteAggregate {
        section: section.to_string(),
    })
}

fn project_line(index: usize, good: &ConsignmentItem) -> Result<InvoiceLine> {
    let item = require(&good.item, &format!("goods[{}].item", index))?;
    let packaging = require(&good.packaging, &format!("goods[{}].packaging", index))?;
    let damage = *require(&good.damage, &format!("goods[{}].damage", index))?;

    let total_commodity_cost = good.commodity_per_unit_cost * good.quantity;
    let total_packaging_cost = good.packaging_per_unit_cost * good.quantity;

    Ok(InvoiceLine {
        item_id: good.id,
        commodity: item.name.clone(),
        packaging: packaging.name.clone(),
        quantity: good.quantity,
        weight_per_unit: good.weight_per_unit,
        total_weight: good.weight_per_unit * good.quantity,
        commodity_per_unit_cost: good.commodity_per_unit_cost,
        total_commodity_cost,
        packaging_per_unit_cost: good.packaging_per_unit_cost,
        total_packaging_cost,
        total_cost: total_commodity_cost + total_packaging_cost,
        damage,
    })
}

/// projectInvoice：任何必要區段缺漏時，回報第一個缺少的區段
pub fn project_invoice(consignment: &Consignment) -> Result<InvoiceView> {
    let trader = require(&consignment.trader, "trader")?;
    let consignee = require(&consignment.consignee, "consignee")?;
    let airway_bill = require(&consignment.airway_bill, "airwayBill")?;
    let iata_agent = require(&airway_bill.iata_agent, "airwayBill.iataAgent")?;
    let goods_declaration = require(&consignment.goods_declaration, "goodsDeclaration")?;
    let custom_clearance = require(&consignment.custom_clearance, "customClearance")?;
    let custom_agent = require(&custom_clearance.ca, "customClearance.ca")?;
    let packing = require(&consignment.packing, "packing")?;
    let packer = require(&packing.packer, "packing.packer")?;

    let goods = require(&consignment.goods, "goods")?;
    if goods.is_empty() {
        return Err(DeskError::IncompleteAggregate {
            section: "goods".to_string(),
        });
    }
    let lines = goods
        .iter()
        .enumerate()
        .map(|(index, good)| project_line(index, good))
        .collect::<Result<Vec<_>>>()?;

    let recovery = require(&consignment.recovery_done, "recoveryDone")?;

    let totals = lines.iter().fold(InvoiceTotals::default(), |acc, line| InvoiceTotals {
        weight: acc.weight + line.total_weight,
        commodity_cost: acc.commodity_cost + line.total_commodity_cost,
        packaging_cost: acc.packaging_cost + line.total_packaging_cost,
        cost: acc.cost + line.total_cost,
        damage: acc.damage + line.damage,
    });

    Ok(InvoiceView {
        consignment_id: consignment.id,
        date: consignment.date,
        status: consignment.status.clone(),
        trader: trader.clone(),
        consignee: consignee.clone(),
        airway_bill: airway_bill.clone(),
        iata_agent: iata_agent.clone(),
        goods_declaration: goods_declaration.clone(),
        custom_clearance: custom_clearance.clone(),
        custom_agent: custom_agent.clone(),
        packing: packing.clone(),
        packer: packer.clone(),
        recovery: recovery.clone(),
        lines,
        totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Commodity, Packaging};
    use rust_decimal_macros::dec;

    fn complete() -> Consignment {
        Consignment {
            id: Some(1),
            date: NaiveDate::from_ymd_opt(2024, 2, 10),
            status: ConsignmentStatus::Fulfilled,
            trader: Some(Trader {
                id: Some(1),
                name: "Trader".to_string(),
                ..Default::default()
            }),
            consignee: Some(Consignee {
                id: Some(2),
                name: "Consignee".to_string(),
                ..Default::default()
            }),
            airway_bill: Some(AirwayBill {
                number: "AWB-1".to_string(),
                iata_agent: Some(IataAgent {
                    id: Some(3),
                    name: "Agent".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            goods_declaration: Some(GoodsDeclaration {
                id: Some(9),
                number: "GD-9".to_string(),
                ..Default::default()
            }),
            custom_clearance: Some(CustomClearance {
                id: Some(4),
                ca: Some(CustomAgent {
                    id: Some(5),
                    name: "CA".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            packing: Some(Packing {
                id: Some(6),
                packer: Some(Packer {
                    id: Some(7),
                    name: "Packer".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            recovery_done: Some(RecoveryDone {
                id: Some(8),
                amount: dec!(1000),
                currency: "USD".to_string(),
                exchange_rate: dec!(278.5),
            }),
            daily_expenses: None,
            goods: Some(vec![
                ConsignmentItem {
                    id: Some(11),
                    item: Some(Commodity {
                        id: Some(1),
                        name: "Mango".to_string(),
                        ..Default::default()
                    }),
                    packaging: Some(Packaging {
                        id: Some(1),
                        name: "Carton".to_string(),
                        ..Default::default()
                    }),
                    weight_per_unit: dec!(2.5),
                    commodity_per_unit_cost: dec!(10),
                    packaging_per_unit_cost: dec!(1.5),
                    quantity: dec!(4),
                    damage: Some(dec!(0)),
                },
                ConsignmentItem {
                    id: Some(12),
                    item: Some(Commodity {
                        id: Some(2),
                        name: "Kinnow".to_string(),
                        ..Default::default()
                    }),
                    packaging: Some(Packaging {
                        id: Some(2),
                        name: "Crate".to_string(),
                        ..Default::default()
                    }),
                    weight_per_unit: dec!(1),
                    commodity_per_unit_cost: dec!(3),
                    packaging_per_unit_cost: dec!(0.5),
                    quantity: dec!(10),
                    damage: Some(dec!(1.25)),
                },
            ]),
        }
    }

    #[test]
    fn test_line_and_grand_totals() {
        let view = project_invoice(&complete()).unwrap();

        let first = &view.lines[0];
        assert_eq!(first.total_weight, dec!(10));
        assert_eq!(first.total_commodity_cost, dec!(40));
        assert_eq!(first.total_packaging_cost, dec!(6));
        assert_eq!(first.total_cost, dec!(46));

        assert_eq!(view.totals.weight, dec!(20));
        assert_eq!(view.totals.commodity_cost, dec!(70));
        assert_eq!(view.totals.packaging_cost, dec!(11));
        assert_eq!(view.totals.cost, dec!(81));
        assert_eq!(view.totals.damage, dec!(1.25));
        assert_eq!(view.packer.name, "Packer");
    }

    #[test]
    fn test_missing_recovery_is_named() {
        let mut consignment = complete();
        consignment.recovery_done = None;

        match project_invoice(&consignment) {
            Err(DeskError::IncompleteAggregate { section }) => {
                assert_eq!(section, "recoveryDone")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_first_missing_section_wins() {
        let mut consignment = complete();
        consignment.trader = None;
        consignment.packing = None;

        match project_invoice(&consignment) {
            Err(DeskError::IncompleteAggregate { section }) => assert_eq!(section, "trader"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_nested_agent_is_required() {
        let mut consignment = complete();
        if let Some(clearance) = consignment.custom_clearance.as_mut() {
            clearance.ca = None;
        }

        match project_invoice(&consignment) {
            Err(DeskError::IncompleteAggregate { section }) => {
                assert_eq!(section, "customClearance.ca")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unassessed_damage_blocks_invoice() {
        let mut consignment = complete();
        if let Some(goods) = consignment.goods.as_mut() {
            goods[1].damage = None;
        }

        match project_invoice(&consignment) {
            Err(DeskError::IncompleteAggregate { section }) => {
                assert_eq!(section, "goods[1].damage")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_projection_is_deterministic() {
        let consignment = complete();
        assert_eq!(
            project_invoice(&consignment).unwrap(),
            project_invoice(&consignment).unwrap()
        );
    }
}
