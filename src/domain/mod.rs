// Domain layer: entity records and ports (interfaces) to the persistence service.

pub mod model;
pub mod ports;
