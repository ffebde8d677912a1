//! 故障场景
//!
//! 在探测器上施加链路 / 节点故障，然后做一次全主机对 ping。
//! 流表始终是编译好的静态表，场景只改变链路状态。

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::info;

use super::probe::{PingReport, Probe};
use crate::net::{Endpoint, HostId, SwitchId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// 无故障
    Bootstrap,
    /// edge#1 断开全部链路
    NodeFailure,
    /// edge#1 断开后恢复
    NodeRecovery,
    /// edge#1 <-> agg#1 断开
    LinkFailure,
    /// edge#1 <-> agg#1 断开后恢复
    LinkRecovery,
    /// core#1 <-> agg#1 断开
    PartitionedFabric,
    /// core#1、core#2 与 agg#1 之间的链路全部断开
    PartitionedFabricPlane,
}

impl Scenario {
    pub const ALL: [Scenario; 7] = [
        Scenario::Bootstrap,
        Scenario::NodeFailure,
        Scenario::NodeRecovery,
        Scenario::LinkFailure,
        Scenario::LinkRecovery,
        Scenario::PartitionedFabric,
        Scenario::PartitionedFabricPlane,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Bootstrap => "bootstrap",
            Scenario::NodeFailure => "node-failure",
            Scenario::NodeRecovery => "node-recovery",
            Scenario::LinkFailure => "link-failure",
            Scenario::LinkRecovery => "link-recovery",
            Scenario::PartitionedFabric => "partitioned-fabric",
            Scenario::PartitionedFabricPlane => "partitioned-fabric-plane",
        }
    }

    /// 把场景的链路状态变化施加到探测器上
    pub fn apply(self, probe: &mut Probe<'_>) {
        let edge1 = Endpoint::Switch(SwitchId::edge(1));
        let agg1 = Endpoint::Switch(SwitchId::agg(1));
        match self {
            Scenario::Bootstrap => {}
            Scenario::NodeFailure => probe.fail_switch(SwitchId::edge(1)),
            Scenario::NodeRecovery => {
                probe.fail_switch(SwitchId::edge(1));
                probe.restore_switch(SwitchId::edge(1));
            }
            Scenario::LinkFailure => probe.fail_link(edge1, agg1),
            Scenario::LinkRecovery => {
                probe.fail_link(edge1, agg1);
                probe.restore_link(edge1, agg1);
            }
            Scenario::PartitionedFabric => {
                probe.fail_link(Endpoint::Switch(SwitchId::core(1)), agg1);
            }
            Scenario::PartitionedFabricPlane => {
                probe.fail_link(Endpoint::Switch(SwitchId::core(1)), agg1);
                probe.fail_link(Endpoint::Switch(SwitchId::core(2)), agg1);
            }
        }
    }

    pub fn run(self, probe: &mut Probe<'_>) -> ScenarioReport {
        self.apply(probe);
        let ping = probe.ping_all();
        info!(
            scenario = self.as_str(),
            sent = ping.sent,
            dropped = ping.dropped,
            "场景执行完成"
        );
        ScenarioReport { scenario: self, ping }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.as_str() == s)
            .ok_or_else(|| format!("unknown scenario `{s}`"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub ping: PingReport,
}

impl ScenarioReport {
    /// 所有失败的主机对都涉及 `hosts` 中的某台主机
    pub fn failures_only_involve(&self, hosts: &[HostId]) -> bool {
        self.ping
            .failures
            .iter()
            .all(|(src, dst)| hosts.contains(src) || hosts.contains(dst))
    }
}
