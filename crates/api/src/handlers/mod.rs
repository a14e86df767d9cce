pub mod alerts;
pub mod targets;
