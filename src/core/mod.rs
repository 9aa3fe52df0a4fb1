pub mod aggregate;
pub mod invoice;
pub mod ledger;
pub mod repository;
pub mod status;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::domain::model::{Collection, Consignment, ConsignmentItem, ConsignmentStatus};
pub use crate::domain::ports::{Backend, ConfigProvider, Credential, Resource};
pub use crate::utils::error::Result;
