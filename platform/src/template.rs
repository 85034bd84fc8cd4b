pub mod airflow;
pub mod compute;
pub mod jobs;
pub mod network;
pub mod registry;
pub mod storage;
pub mod warehouse;

mod template;

pub use template::{CfnResource, Template};
