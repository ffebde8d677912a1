//! 内存数据面
//!
//! 内存假交换机（幂等下发）、按流表逐跳转发的探测器，以及链路 / 节点故障场景。

mod memory;
mod probe;
mod scenario;

pub use memory::MemoryFabric;
pub use probe::{PingReport, Probe, TraceOutcome};
pub use scenario::{Scenario, ScenarioReport};
