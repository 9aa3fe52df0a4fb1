//! Financial instrument utilization ledger.
//!
//! An FIU records how much of one instrument was drawn against one goods
//! declaration. Re-submitting the same pair first gives back the previous draw
//! and then deducts the new amount, so the balance always equals
//! `amount - sum(utilized)` as long as each pair has one FIU. The balance never
//! goes negative. A batch is not a transaction: each instrument commits or
//! fails on its own and the report says which.

use crate::core::repository::{FinancialInstrumentRepository, FiuRepository, Raw};
use crate::domain::model::{EntityId, FinancialInstrument, FinancialInstrumentUtilization, Ref};
use crate::domain::ports::{Backend, Credential};
use crate::utils::error::{DeskError, ErrorCategory, Result};
use crate::utils::validation::validate_non_negative;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilizationRequest {
    pub instrument_id: EntityId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum UtilizationOutcome {
    Committed {
        utilization: FinancialInstrumentUtilization,
    },
    Failed {
        category: ErrorCategory,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub instrument_id: EntityId,
    pub outcome: UtilizationOutcome,
}

impl BatchEntry {
    pub fn is_committed(&self) -> bool {
        matches!(self.outcome, UtilizationOutcome::Committed { .. })
    }
}

/// 整批的提交情況
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSummary {
    AllCommitted,
    Partial,
    NoneCommitted,
}

/// 批次結果：每個金融工具各自成功或失敗
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub goods_declaration_id: EntityId,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn committed(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.is_committed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.is_committed())
    }

    pub fn all_committed(&self) -> bool {
        self.entries.iter().all(BatchEntry::is_committed)
    }

    /// 部分成功、部分失敗
    pub fn is_partial(&self) -> bool {
        self.summary() == BatchSummary::Partial
    }

    /// 空批次視為全部成功
    pub fn summary(&self) -> BatchSummary {
        match (self.committed().next(), self.failed().next()) {
            (_, None) => BatchSummary::AllCommitted,
            (Some(_), Some(_)) => BatchSummary::Partial,
            (None, Some(_)) => BatchSummary::NoneCommitted,
        }
    }
}

pub struct UtilizationLedger<B> {
    instruments: FinancialInstrumentRepository<B>,
    utilizations: FiuRepository<B>,
}

impl<B: Backend> UtilizationLedger<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            instruments: FinancialInstrumentRepository::new(Arc::clone(&backend)),
            utilizations: FiuRepository::new(backend),
        }
    }

    /// 找出同一組 (instrument, declaration) 既有的 FIU
    pub async fn find_utilization(
        &self,
        instrument_id: EntityId,
        goods_declaration_id: EntityId,
        credential: &Credential,
    ) -> Result<Option<FinancialInstrumentUtilization>> {
        Ok(self
            .find_utilization_raw(instrument_id, goods_declaration_id, credential)
            .await?
            .map(|(fiu, _)| fiu))
    }

    async fn find_utilization_raw(
        &self,
        instrument_id: EntityId,
        goods_declaration_id: EntityId,
        credential: &Credential,
    ) -> Result<Option<(FinancialInstrumentUtilization, Raw)>> {
        let mut matches = self
            .utilizations
            .list_with_raw(credential)
            .await?
            .into_iter()
            .filter(|(fiu, _)| {
                fiu.financial_instrument == Ref(instrument_id)
                    && fiu.goods_declaration == Ref(goods_declaration_id)
            });

        let first = matches.next();
        let extra = matches.count();
        if extra > 0 {
            tracing::warn!(
                "Found {} FIU records for instrument {} / declaration {}, using the first",
                extra + 1,
                instrument_id,
                goods_declaration_id
            );
        }
        Ok(first)
    }

    pub async fn utilizations_for_declaration(
        &self,
        goods_declaration_id: EntityId,
        credential: &Credential,
    ) -> Result<Vec<FinancialInstrumentUtilization>> {
        Ok(self
            .utilizations
            .list(credential)
            .await?
            .into_iter()
            .filter(|fiu| fiu.goods_declaration == Ref(goods_declaration_id))
            .collect())
    }

    /// applyUtilization(financialInstrumentId, goodsDeclarationId, requestedAmount)
    pub async fn apply_utilization(
        &self,
        instrument_id: EntityId,
        goods_declaration_id: EntityId,
        requested: Decimal,
        credential: &Credential,
    ) -> Result<FinancialInstrumentUtilization> {
        validate_non_negative("utilized", requested)?;

        let (instrument, instrument_raw) = self
            .instruments
            .get_with_raw(instrument_id, credential)
            .await?;
        let existing = self
            .find_utilization_raw(instrument_id, goods_declaration_id, credential)
            .await?;

        // 先退回這組先前扣除的金額，再扣新的金額
        let previous_balance = instrument.balance;
        let restored = previous_balance
            + existing
                .as_ref()
                .map(|(fiu, _)| fiu.utilized)
                .unwrap_or_default();
        let new_balance = restored - requested;
        if new_balance < Decimal::ZERO {
            tracing::warn!(
                "Rejected utilization of {} on instrument {} (available {})",
                requested,
                instrument.label(),
                restored
            );
            return Err(DeskError::InsufficientBalance {
                instrument: instrument.label(),
                available: restored,
                requested,
            });
        }

        let balance_patch = amount_field("balance", new_balance)?;
        let utilized_patch = amount_field("utilized", requested)?;

        // 只覆蓋 balance，工具紀錄上的其他欄位原樣寫回
        self.instruments
            .update_fields(instrument_id, &instrument_raw, balance_patch, credential)
            .await?;

        let upserted = match existing {
            Some((fiu, raw)) => match fiu.id {
                Some(fiu_id) => {
                    self.utilizations
                        .update_fields(fiu_id, &raw, utilized_patch, credential)
                        .await
                }
                None => Err(DeskError::validation(
                    "id",
                    "stored utilization record has no id",
                )),
            },
            None => {
                let fiu = FinancialInstrumentUtilization {
                    id: None,
                    financial_instrument: Ref(instrument_id),
                    goods_declaration: Ref(goods_declaration_id),
                    utilized: requested,
                };
                self.utilizations.create(&fiu, credential).await
            }
        };

        match upserted {
            Ok(fiu) => {
                tracing::info!(
                    "Instrument {} balance {} -> {} for declaration {}",
                    instrument.label(),
                    previous_balance,
                    new_balance,
                    goods_declaration_id
                );
                Ok(fiu)
            }
            Err(e) => {
                self.restore_instrument(instrument_id, &instrument_raw, credential)
                    .await;
                Err(e)
            }
        }
    }

    /// 同一張 goods declaration 的多筆工具；每筆獨立提交，不會回滾已成功的筆數
    pub async fn apply_batch(
        &self,
        goods_declaration_id: EntityId,
        requests: &[UtilizationRequest],
        credential: &Credential,
    ) -> Result<BatchReport> {
        let mut seen = HashSet::new();
        for request in requests {
            if !seen.insert(request.instrument_id) {
                return Err(DeskError::validation(
                    "financialInstrument",
                    format!(
                        "instrument {} selected more than once",
                        request.instrument_id
                    ),
                ));
            }
            validate_non_negative("utilized", request.amount)?;
        }

        let mut entries = Vec::with_capacity(requests.len());
        for request in requests {
            let outcome = match self
                .apply_utilization(
                    request.instrument_id,
                    goods_declaration_id,
                    request.amount,
                    credential,
                )
                .await
            {
                Ok(utilization) => UtilizationOutcome::Committed { utilization },
                Err(e) => {
                    tracing::warn!(
                        "Utilization of instrument {} failed: {}",
                        request.instrument_id,
                        e
                    );
                    UtilizationOutcome::Failed {
                        category: e.category(),
                        reason: e.to_string(),
                    }
                }
            };
            entries.push(BatchEntry {
                instrument_id: request.instrument_id,
                outcome,
            });
        }

        let report = BatchReport {
            goods_declaration_id,
            entries,
        };
        match report.summary() {
            BatchSummary::AllCommitted => {}
            BatchSummary::Partial => tracing::warn!(
                "Declaration {}: {} committed, {} failed",
                goods_declaration_id,
                report.committed().count(),
                report.failed().count()
            ),
            BatchSummary::NoneCommitted => tracing::error!(
                "Declaration {}: all {} utilizations failed",
                goods_declaration_id,
                report.entries.len()
            ),
        }
        Ok(report)
    }

    /// 刪除一筆 FIU 並把金額還給工具
    pub async fn release_utilization(
        &self,
        fiu_id: EntityId,
        credential: &Credential,
    ) -> Result<FinancialInstrument> {
        let fiu = self.utilizations.get(fiu_id, credential).await?;
        let instrument_id = fiu.financial_instrument.0;
        let (instrument, instrument_raw) = self
            .instruments
            .get_with_raw(instrument_id, credential)
            .await?;

        let balance_patch = amount_field("balance", instrument.balance + fiu.utilized)?;
        let instrument = self
            .instruments
            .update_fields(instrument_id, &instrument_raw, balance_patch, credential)
            .await?;

        if let Err(e) = self.utilizations.delete(fiu_id, credential).await {
            self.restore_instrument(instrument_id, &instrument_raw, credential)
                .await;
            return Err(e);
        }

        tracing::info!(
            "Released {} back to instrument {}",
            fiu.utilized,
            instrument.label()
        );
        Ok(instrument)
    }

    /// 把讀取時的原始紀錄整筆寫回
    async fn restore_instrument(
        &self,
        instrument_id: EntityId,
        raw: &Raw,
        credential: &Credential,
    ) {
        if let Err(e) = self
            .instruments
            .update_fields(instrument_id, raw, Raw::new(), credential)
            .await
        {
            tracing::error!(
                "Could not restore balance {} on instrument {}: {}",
                raw.get("balance").cloned().unwrap_or_default(),
                instrument_id,
                e
            );
        }
    }
}

fn amount_field(key: &str, amount: Decimal) -> Result<Raw> {
    let mut fields = Raw::new();
    fields.insert(key.to_string(), serde_json::to_value(amount)?);
    Ok(fields)
}
