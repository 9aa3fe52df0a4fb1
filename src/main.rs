use clap::Parser;
use consignment_desk::config::cli::{Cli, Command};
use consignment_desk::core::ledger::BatchSummary;
use consignment_desk::core::workflow::NewGood;
use consignment_desk::domain::ports::ConfigProvider;
use consignment_desk::utils::error::ErrorSeverity;
use consignment_desk::utils::logger;
use consignment_desk::{
    derive_status, project_invoice, ConsignmentStore, ConsignmentWorkflow, Credential, DeskConfig,
    DeskError, RestBackend, StepSubmission, UtilizationLedger,
};
use serde_json::Value;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.desk_config() {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose, None);
            tracing::error!("❌ Configuration validation failed: {}", e);
            fail(&e);
        }
    };

    // 初始化日誌
    if config.log_format_json() {
        logger::init_json_logger(cli.verbose, config.logging.level.as_deref());
    } else {
        logger::init_cli_logger(cli.verbose, config.logging.level.as_deref());
    }
    tracing::debug!("Command: {:?}", cli.command);

    let credential = match cli.credential() {
        Ok(credential) => credential,
        Err(e) => fail(&e),
    };

    match run(&cli.command, &config, &credential).await {
        Ok((output, summary)) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            match summary {
                BatchSummary::AllCommitted => {}
                BatchSummary::Partial => {
                    tracing::warn!("⚠️ Some utilizations failed, see the report");
                    std::process::exit(2);
                }
                BatchSummary::NoneCommitted => {
                    tracing::error!("❌ No utilization was committed, see the report");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => fail(&e),
    }

    Ok(())
}

async fn run(
    command: &Command,
    config: &DeskConfig,
    credential: &Credential,
) -> consignment_desk::Result<(Value, BatchSummary)> {
    let backend = Arc::new(RestBackend::from_config(config)?);
    let store = ConsignmentStore::new(Arc::clone(&backend))
        .with_optimistic_concurrency(config.optimistic_concurrency());
    let workflow = ConsignmentWorkflow::new(Arc::clone(&backend), store.clone())
        .with_policy(config.transition_policy());
    let ledger = UtilizationLedger::new(Arc::clone(&backend));

    let output = match command {
        Command::Create { date } => serde_json::to_value(store.create(*date, credential).await?)?,
        Command::Show { id } => serde_json::to_value(store.get(*id, credential).await?)?,
        Command::Status { id } => {
            let consignment = store.get(*id, credential).await?;
            serde_json::to_value(derive_status(&consignment))?
        }
        Command::Step { id, step, data } => {
            let fields: Value = serde_json::from_str(data)?;
            let submission = StepSubmission::from_json(step, fields)?;
            serde_json::to_value(workflow.submit_step(*id, submission, credential).await?)?
        }
        Command::Goods {
            id,
            commodity,
            weight_per_unit,
            unit_cost,
            quantity,
        } => {
            let good = NewGood {
                commodity_id: *commodity,
                weight_per_unit: *weight_per_unit,
                commodity_per_unit_cost: *unit_cost,
                quantity: *quantity,
            };
            serde_json::to_value(workflow.add_goods(*id, &[good], credential).await?)?
        }
        Command::Packaging {
            item,
            packaging,
            unit_cost,
        } => serde_json::to_value(
            workflow
                .assign_packaging(*item, *packaging, *unit_cost, credential)
                .await?,
        )?,
        Command::Damage { item, amount } => {
            serde_json::to_value(workflow.assess_damage(*item, *amount, credential).await?)?
        }
        Command::Utilize {
            goods_declaration,
            draws,
        } => {
            let report = ledger
                .apply_batch(*goods_declaration, draws, credential)
                .await?;
            let summary = report.summary();
            return Ok((serde_json::to_value(report)?, summary));
        }
        Command::Release { fiu } => {
            serde_json::to_value(ledger.release_utilization(*fiu, credential).await?)?
        }
        Command::Invoice { id } => {
            let consignment = store.get(*id, credential).await?;
            serde_json::to_value(project_invoice(&consignment)?)?
        }
    };

    Ok((output, BatchSummary::AllCommitted))
}

fn fail(e: &DeskError) -> ! {
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
