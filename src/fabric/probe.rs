//! 数据面探测
//!
//! 按流表把一个探测包从源主机一跳一跳地送下去：每台交换机取优先级最高的
//! 匹配表项（同优先级先装先得），沿输出端口走到对端。链路 / 交换机可以被
//! 故障掉，用来复现链路故障、节点故障等场景下的可达性。

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::{debug, trace};

use super::memory::MemoryFabric;
use crate::net::{AddressPlan, Endpoint, HostId, SwitchId};
use crate::routing::{FlowRule, ForwardingPlan, TrafficClass};
use crate::topo::fat_tree::FatTreeTopology;

/// 单个探测包的结局
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TraceOutcome {
    Delivered { path: Vec<Endpoint> },
    Dropped { at: Endpoint, path: Vec<Endpoint> },
    Looped { path: Vec<Endpoint> },
}

impl TraceOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, TraceOutcome::Delivered { .. })
    }

    pub fn path(&self) -> &[Endpoint] {
        match self {
            TraceOutcome::Delivered { path }
            | TraceOutcome::Dropped { path, .. }
            | TraceOutcome::Looped { path } => path,
        }
    }
}

/// 全主机对 ping 的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PingReport {
    pub sent: usize,
    pub dropped: usize,
    pub failures: Vec<(HostId, HostId)>,
}

impl PingReport {
    pub fn loss_ratio(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.dropped as f64 / self.sent as f64
        }
    }
}

pub struct Probe<'a> {
    topo: &'a FatTreeTopology,
    addrs: &'a AddressPlan,
    tables: BTreeMap<SwitchId, Vec<FlowRule>>,
    down_links: HashSet<(Endpoint, Endpoint)>,
    down_switches: HashSet<SwitchId>,
}

fn link_key(a: Endpoint, b: Endpoint) -> (Endpoint, Endpoint) {
    let rank = |e: &Endpoint| match e {
        Endpoint::Switch(s) => (0, s.layer as usize, s.index, 0),
        Endpoint::Host(h) => (1, 0, h.edge, h.slot),
    };
    if rank(&a) <= rank(&b) { (a, b) } else { (b, a) }
}

impl<'a> Probe<'a> {
    pub fn new(
        topo: &'a FatTreeTopology,
        addrs: &'a AddressPlan,
        tables: BTreeMap<SwitchId, Vec<FlowRule>>,
    ) -> Self {
        Self {
            topo,
            addrs,
            tables,
            down_links: HashSet::new(),
            down_switches: HashSet::new(),
        }
    }

    /// 直接用编译结果作为流表
    pub fn from_plan(topo: &'a FatTreeTopology, addrs: &'a AddressPlan, plan: &ForwardingPlan) -> Self {
        let tables = plan
            .iter()
            .map(|t| (t.switch, t.rules.clone()))
            .collect();
        Self::new(topo, addrs, tables)
    }

    /// 用内存交换机里实际装上的流表
    pub fn from_fabric(topo: &'a FatTreeTopology, addrs: &'a AddressPlan, fabric: &MemoryFabric) -> Self {
        Self::new(topo, addrs, fabric.snapshot())
    }

    /// 探测时使用的流表
    pub fn table(&self, sw: SwitchId) -> Option<&[FlowRule]> {
        self.tables.get(&sw).map(Vec::as_slice)
    }

    pub fn fail_link(&mut self, a: Endpoint, b: Endpoint) {
        debug!(a = %a, b = %b, "链路故障");
        self.down_links.insert(link_key(a, b));
    }

    pub fn restore_link(&mut self, a: Endpoint, b: Endpoint) {
        debug!(a = %a, b = %b, "链路恢复");
        self.down_links.remove(&link_key(a, b));
    }

    /// 断开交换机的全部链路
    pub fn fail_switch(&mut self, sw: SwitchId) {
        debug!(switch = %sw, "节点故障");
        self.down_switches.insert(sw);
    }

    pub fn restore_switch(&mut self, sw: SwitchId) {
        debug!(switch = %sw, "节点恢复");
        self.down_switches.remove(&sw);
    }

    fn link_up(&self, a: Endpoint, b: Endpoint) -> bool {
        let switch_down = |e: Endpoint| matches!(e, Endpoint::Switch(s) if self.down_switches.contains(&s));
        !switch_down(a) && !switch_down(b) && !self.down_links.contains(&link_key(a, b))
    }

    /// 所有命中的表项，按生效顺序排列（优先级降序，同优先级按安装顺序）
    pub fn matching(&self, sw: SwitchId, class: TrafficClass, dst: Ipv4Addr) -> Vec<&FlowRule> {
        let mut hits: Vec<&FlowRule> = self
            .tables
            .get(&sw)
            .map(|rules| rules.iter().filter(|r| r.matcher.matches(class, dst)).collect())
            .unwrap_or_default();
        hits.sort_by(|a, b| b.priority.cmp(&a.priority));
        hits
    }

    pub fn lookup(&self, sw: SwitchId, class: TrafficClass, dst: Ipv4Addr) -> Option<&FlowRule> {
        self.matching(sw, class, dst).into_iter().next()
    }

    #[tracing::instrument(skip(self), fields(src = %src, dst = %dst, class = class.as_str()))]
    pub fn trace(&self, src: HostId, dst: HostId, class: TrafficClass) -> TraceOutcome {
        let mut path = vec![Endpoint::Host(src)];
        if src == dst {
            return TraceOutcome::Delivered { path };
        }
        let Some(dst_addr) = self.addrs.addr_of(dst) else {
            return TraceOutcome::Dropped { at: Endpoint::Host(src), path };
        };

        let first = self.topo.edge_of(src);
        if !self.link_up(Endpoint::Host(src), Endpoint::Switch(first)) {
            return TraceOutcome::Dropped { at: Endpoint::Host(src), path };
        }

        let mut visited = HashSet::new();
        let mut here = first;
        loop {
            path.push(Endpoint::Switch(here));
            if !visited.insert(here) {
                return TraceOutcome::Looped { path };
            }
            let at = Endpoint::Switch(here);
            let Some(rule) = self.lookup(here, class, dst_addr.0) else {
                trace!(switch = %here, "无匹配表项");
                return TraceOutcome::Dropped { at, path };
            };
            let Some(next) = self.topo.peer(here, rule.out_port()) else {
                return TraceOutcome::Dropped { at, path };
            };
            if !self.link_up(at, next) {
                trace!(switch = %here, next = %next, "链路不可用");
                return TraceOutcome::Dropped { at, path };
            }
            match next {
                Endpoint::Switch(sw) => here = sw,
                Endpoint::Host(h) => {
                    path.push(next);
                    return if h == dst {
                        TraceOutcome::Delivered { path }
                    } else {
                        TraceOutcome::Dropped { at: next, path }
                    };
                }
            }
        }
    }

    /// 一次 ping：先 ARP 解析，再 IP 请求 + 回应
    pub fn ping(&self, src: HostId, dst: HostId) -> bool {
        self.trace(src, dst, TrafficClass::Arp).is_delivered()
            && self.trace(src, dst, TrafficClass::Ip).is_delivered()
            && self.trace(dst, src, TrafficClass::Ip).is_delivered()
    }

    /// 所有有序主机对互 ping
    pub fn ping_all(&self) -> PingReport {
        let mut report = PingReport::default();
        for &src in &self.topo.hosts {
            for &dst in &self.topo.hosts {
                if src == dst {
                    continue;
                }
                report.sent += 1;
                if !self.ping(src, dst) {
                    report.dropped += 1;
                    report.failures.push((src, dst));
                }
            }
        }
        debug!(sent = report.sent, dropped = report.dropped, "ping_all 完成");
        report
    }
}
