//! 主动式路由表编译
//!
//! 每台交换机的规则只取决于它自己的层级/序号、`k`、`d` 和编址约定，
//! 不依赖其他交换机的状态，因此各交换机的编译彼此独立。
//!
//! - edge：每台主机一条精确下行规则，走 `k/2 + slot` 号端口
//! - agg：每个同 pod edge 子网一条 `/16` 下行规则，走 `k/2 + j` 号端口
//! - core：全部 edge 子网按 pod 分组，第 `p` 组走 `p` 号端口
//! - edge / agg 上行：按目的槽位后缀选上联端口 `((slot-1) mod k/2) + 1`
//!
//! 每个逻辑目的地都同时生成 ARP 和 IP 两条规则，输出端口一致。

use std::collections::BTreeMap;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::rule::{DOWNSTREAM_PRIORITY, DstMatch, FlowRule, TrafficClass, UPSTREAM_PRIORITY};
use super::subnet::{ShapeSupport, subnet_group};
use crate::error::FabricError;
use crate::net::{AddressPlan, Layer, SwitchId};
use crate::topo::fat_tree::FatTreeTopology;

/// edge / agg 的上行规则策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UplinkPolicy {
    /// 按目的槽位后缀严格轮转到上联端口
    #[default]
    SlotIndexed,
    /// 只编译下行规则，上行交给外部默认路由
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOpts {
    pub shapes: ShapeSupport,
    pub uplink: UplinkPolicy,
}

/// 一台交换机的有序规则表（编译期只追加）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub switch: SwitchId,
    pub rules: Vec<FlowRule>,
}

impl RuleTable {
    pub fn new(switch: SwitchId) -> Self {
        Self {
            switch,
            rules: Vec::new(),
        }
    }

    /// 同一目的地的 ARP + IP 规则
    fn push_both(&mut self, priority: u16, dst: DstMatch, port: u32) {
        for class in TrafficClass::ALL {
            self.rules.push(FlowRule::output(priority, class, dst, port));
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// 全网的编译结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardingPlan {
    pub k: usize,
    pub density: usize,
    /// 按交换机身份升序
    pub tables: Vec<RuleTable>,
}

impl ForwardingPlan {
    pub fn table(&self, sw: SwitchId) -> Option<&RuleTable> {
        self.tables
            .binary_search_by_key(&sw, |t| t.switch)
            .ok()
            .map(|i| &self.tables[i])
    }

    pub fn total_rules(&self) -> usize {
        self.tables.iter().map(RuleTable::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleTable> {
        self.tables.iter()
    }

    /// 每台交换机一段 `ovs-ofctl add-flows` 输入
    pub fn to_ofctl(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            out.push_str(&format!("# {}\n", table.switch.node_name()));
            for rule in &table.rules {
                out.push_str(&rule.ofctl_spec());
                out.push('\n');
            }
        }
        out
    }
}

pub struct RoutingCompiler<'a> {
    topo: &'a FatTreeTopology,
    addrs: &'a AddressPlan,
    opts: CompilerOpts,
}

impl<'a> RoutingCompiler<'a> {
    /// 在编译前检查拓扑形状是否受支持
    pub fn new(
        topo: &'a FatTreeTopology,
        addrs: &'a AddressPlan,
        opts: CompilerOpts,
    ) -> Result<Self, FabricError> {
        let encodable = topo.edge_count() <= u8::MAX as usize && topo.density <= u8::MAX as usize;
        let supported = match opts.shapes {
            ShapeSupport::General => encodable,
            ShapeSupport::Reference => encodable && matches!(topo.k, 4 | 8),
        };
        if !supported {
            return Err(FabricError::UnsupportedTopology { k: topo.k });
        }
        if addrs.len() != topo.host_count() {
            return Err(FabricError::InvalidParameter(format!(
                "address plan covers {} hosts, topology has {}",
                addrs.len(),
                topo.host_count()
            )));
        }
        Ok(Self { topo, addrs, opts })
    }

    pub fn opts(&self) -> CompilerOpts {
        self.opts
    }

    #[tracing::instrument(skip(self), fields(switch = %sw))]
    pub fn compile_switch(&self, sw: SwitchId) -> Result<RuleTable, FabricError> {
        if !self.topo.contains(sw) {
            return Err(FabricError::InvalidParameter(format!(
                "switch {sw} is not part of the k={} fat-tree",
                self.topo.k
            )));
        }

        let mut table = RuleTable::new(sw);
        match sw.layer {
            Layer::Edge => self.edge_rules(sw, &mut table)?,
            Layer::Agg => self.agg_rules(sw, &mut table)?,
            Layer::Core => self.core_rules(&mut table),
        }

        if table.is_empty() {
            return Err(FabricError::EmptyRuleSet(sw));
        }
        debug!(rules = table.len(), "编译完成");
        Ok(table)
    }

    fn edge_rules(&self, sw: SwitchId, table: &mut RuleTable) -> Result<(), FabricError> {
        let half = self.topo.half();
        for &host in self.topo.hosts_of(sw) {
            let addr = self.addrs.addr_of(host).ok_or_else(|| {
                FabricError::InvalidParameter(format!("host {host} has no address"))
            })?;
            table.push_both(DOWNSTREAM_PRIORITY, DstMatch::host(addr), (half + host.slot) as u32);
        }
        self.uplink_rules(table);
        Ok(())
    }

    fn agg_rules(&self, sw: SwitchId, table: &mut RuleTable) -> Result<(), FabricError> {
        let half = self.topo.half();
        let group = subnet_group(self.topo.k, sw.index, self.opts.shapes)?;
        for (j, edge) in group.into_iter().enumerate() {
            table.push_both(
                DOWNSTREAM_PRIORITY,
                DstMatch::edge_subnet(edge as u8),
                (half + j + 1) as u32,
            );
        }
        self.uplink_rules(table);
        Ok(())
    }

    fn core_rules(&self, table: &mut RuleTable) {
        let half = self.topo.half();
        let mut port = 1;
        let mut in_group = 0;
        for edge in 1..=self.topo.edge_count() {
            table.push_both(DOWNSTREAM_PRIORITY, DstMatch::edge_subnet(edge as u8), port);
            in_group += 1;
            if in_group == half {
                port += 1;
                in_group = 0;
            }
        }
    }

    fn uplink_rules(&self, table: &mut RuleTable) {
        if self.opts.uplink == UplinkPolicy::None {
            return;
        }
        let half = self.topo.half();
        for slot in 1..=self.topo.density {
            let uplink = ((slot - 1) % half + 1) as u32;
            table.push_both(UPSTREAM_PRIORITY, DstMatch::slot_suffix(slot as u8), uplink);
        }
    }

    /// 依次编译全部交换机
    pub fn compile_all(&self) -> Result<ForwardingPlan, FabricError> {
        let mut tables = BTreeMap::new();
        for sw in self.topo.all_switches() {
            tables.insert(sw, self.compile_switch(sw)?);
        }
        Ok(self.finish(tables))
    }

    /// 用 `workers` 个线程并行编译；结果与 [`compile_all`](Self::compile_all) 完全一致
    pub fn compile_all_parallel(&self, workers: usize) -> Result<ForwardingPlan, FabricError> {
        let switches: Vec<SwitchId> = self.topo.all_switches().collect();
        let chunk = switches.len().div_ceil(workers.max(1)).max(1);

        let results: Vec<Result<Vec<RuleTable>, FabricError>> = thread::scope(|s| {
            let handles: Vec<_> = switches
                .chunks(chunk)
                .map(|part| {
                    s.spawn(move || {
                        part.iter()
                            .map(|&sw| self.compile_switch(sw))
                            .collect::<Result<Vec<_>, _>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        let mut tables = BTreeMap::new();
        for part in results {
            for table in part? {
                tables.insert(table.switch, table);
            }
        }
        Ok(self.finish(tables))
    }

    fn finish(&self, tables: BTreeMap<SwitchId, RuleTable>) -> ForwardingPlan {
        let plan = ForwardingPlan {
            k: self.topo.k,
            density: self.topo.density,
            tables: tables.into_values().collect(),
        };
        info!(
            k = plan.k,
            density = plan.density,
            switches = plan.tables.len(),
            rules = plan.total_rules(),
            "🧭 转发计划编译完成"
        );
        plan
    }
}
