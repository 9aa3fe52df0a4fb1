pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;
pub use config::DeskConfig;

pub use adapters::RestBackend;
pub use crate::core::{
    aggregate::{ConsignmentStore, ConsignmentUpdate},
    invoice::{project_invoice, InvoiceView},
    ledger::{BatchReport, UtilizationLedger, UtilizationRequest},
    status::{derive_status, WorkflowStatus, WorkflowStep},
    workflow::{ConsignmentWorkflow, StepSubmission},
};
pub use domain::ports::{Backend, Credential};
pub use utils::error::{DeskError, Result};
