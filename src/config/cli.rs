use crate::config::DeskConfig;
use crate::core::ledger::UtilizationRequest;
use crate::domain::model::EntityId;
use crate::domain::ports::Credential;
use crate::utils::error::{DeskError, Result};
use crate::utils::validation::Validate;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "consignment-desk")]
#[command(about = "Back-office desk for consignments, financial instruments and invoices")]
pub struct Cli {
    /// TOML 配置檔
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 覆寫配置檔中的 backend.base_url
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[arg(long, global = true, env = "CONSIGNMENT_DESK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 建立新的 consignment
    Create {
        #[arg(long)]
        date: NaiveDate,
    },
    Show {
        id: EntityId,
    },
    /// 顯示九個步驟的完成狀態
    Status {
        id: EntityId,
    },
    /// 提交一個精靈步驟，例如 `step 3 packing --data '{"charges": 40}'`
    Step {
        id: EntityId,
        step: String,
        #[arg(long)]
        data: String,
    },
    Goods {
        id: EntityId,
        #[arg(long)]
        commodity: EntityId,
        #[arg(long)]
        weight_per_unit: Decimal,
        #[arg(long)]
        unit_cost: Decimal,
        #[arg(long)]
        quantity: Decimal,
    },
    Packaging {
        item: EntityId,
        #[arg(long)]
        packaging: EntityId,
        #[arg(long)]
        unit_cost: Decimal,
    },
    Damage {
        item: EntityId,
        #[arg(long)]
        amount: Decimal,
    },
    /// 對一張報單動用多個金融工具，格式 `--draw <instrument>=<amount>`
    Utilize {
        goods_declaration: EntityId,
        #[arg(long = "draw", value_parser = parse_draw, required = true)]
        draws: Vec<UtilizationRequest>,
    },
    Release {
        fiu: EntityId,
    },
    Invoice {
        id: EntityId,
    },
}

fn parse_draw(raw: &str) -> std::result::Result<UtilizationRequest, String> {
    let (instrument, amount) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <instrument>=<amount>, got '{}'", raw))?;
    Ok(UtilizationRequest {
        instrument_id: instrument
            .trim()
            .parse()
            .map_err(|e| format!("invalid instrument id '{}': {}", instrument, e))?,
        amount: amount
            .trim()
            .parse()
            .map_err(|e| format!("invalid amount '{}': {}", amount, e))?,
    })
}

impl Cli {
    /// 合併配置檔與命令列參數，命令列優先
    pub fn desk_config(&self) -> Result<DeskConfig> {
        let mut config = match (&self.config, &self.base_url) {
            (Some(path), _) => DeskConfig::from_file(path)?,
            (None, Some(base_url)) => DeskConfig::new(base_url.clone()),
            (None, None) => {
                return Err(DeskError::MissingConfig {
                    field: "backend.base_url (--config or --base-url)".to_string(),
                })
            }
        };
        if let Some(base_url) = &self.base_url {
            config.backend.base_url = base_url.clone();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn credential(&self) -> Result<Credential> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(Credential::bearer(token)),
            _ => Err(DeskError::SessionExpired),
        }
    }
}
