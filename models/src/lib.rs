//! Building blocks for slowly draining a Kubernetes Node.
//!
//! A drain cordons the Node, classifies its Pods into infrastructure and application sets by namespace, and then
//! deletes the application Pods one at a time, pausing after each deletion.
pub mod constants;
pub mod drain;
pub mod node;
pub mod telemetry;
pub mod workload;
