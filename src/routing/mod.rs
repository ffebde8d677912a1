//! 路由编译模块
//!
//! 流表规则模型、agg 子网组计算，以及按交换机编译主动式转发规则。

mod compiler;
mod rule;
mod subnet;

pub use compiler::{CompilerOpts, ForwardingPlan, RoutingCompiler, RuleTable, UplinkPolicy};
pub use rule::{
    Action, DOWNSTREAM_PRIORITY, DstMatch, FlowMatch, FlowRule, TrafficClass, UPSTREAM_PRIORITY,
};
pub use subnet::{ShapeSupport, subnet_group};
