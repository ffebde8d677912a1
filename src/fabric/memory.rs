//! 内存中的假交换机
//!
//! 实现 [`RuleInstaller`]，按 (表, 优先级, 匹配) upsert，重复下发不会产生重复表项。
//! 可以把交换机设为不可达、让前几次下发失败、或者给下发加延迟，用来验证重试和超时。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::InstallError;
use crate::install::RuleInstaller;
use crate::net::SwitchId;
use crate::routing::FlowRule;
use crate::topo::fat_tree::FatTreeTopology;

#[derive(Debug, Default)]
struct FabricState {
    tables: BTreeMap<SwitchId, Vec<FlowRule>>,
    port_limits: HashMap<SwitchId, u32>,
    unreachable: HashSet<SwitchId>,
    fail_next: HashMap<SwitchId, u32>,
    delays: HashMap<SwitchId, Duration>,
    attempts: HashMap<SwitchId, u32>,
}

#[derive(Debug, Default)]
pub struct MemoryFabric {
    state: Mutex<FabricState>,
}

impl MemoryFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按拓扑记录每台交换机的端口数，越界的输出端口会被拒绝
    pub fn for_topology(topo: &FatTreeTopology) -> Self {
        let fabric = Self::new();
        {
            let mut st = fabric.lock();
            for sw in topo.all_switches() {
                st.port_limits.insert(sw, topo.port_count(sw) as u32);
            }
        }
        fabric
    }

    fn lock(&self) -> MutexGuard<'_, FabricState> {
        // 持锁期间不会 panic，中毒状态里的数据仍然一致
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_unreachable(&self, switch: SwitchId, unreachable: bool) {
        let mut st = self.lock();
        if unreachable {
            st.unreachable.insert(switch);
        } else {
            st.unreachable.remove(&switch);
        }
    }

    /// 接下来 `n` 次下发返回不可达
    pub fn fail_next(&self, switch: SwitchId, n: u32) {
        self.lock().fail_next.insert(switch, n);
    }

    pub fn set_delay(&self, switch: SwitchId, delay: Duration) {
        self.lock().delays.insert(switch, delay);
    }

    pub fn attempts(&self, switch: SwitchId) -> u32 {
        self.lock().attempts.get(&switch).copied().unwrap_or(0)
    }

    pub fn flows(&self, switch: SwitchId) -> Vec<FlowRule> {
        self.lock().tables.get(&switch).cloned().unwrap_or_default()
    }

    /// 当前全网流表
    pub fn snapshot(&self) -> BTreeMap<SwitchId, Vec<FlowRule>> {
        self.lock().tables.clone()
    }

    /// 撤销某台交换机的全部表项
    pub fn clear(&self, switch: SwitchId) {
        self.lock().tables.remove(&switch);
    }
}

#[async_trait]
impl RuleInstaller for MemoryFabric {
    async fn install(&self, switch: SwitchId, rules: &[FlowRule]) -> Result<(), InstallError> {
        let delay = {
            let mut st = self.lock();
            *st.attempts.entry(switch).or_insert(0) += 1;
            st.delays.get(&switch).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut st = self.lock();
        if st.unreachable.contains(&switch) {
            return Err(InstallError::Unreachable {
                switch,
                reason: "switch marked unreachable".to_string(),
            });
        }
        if let Some(left) = st.fail_next.get_mut(&switch) {
            if *left > 0 {
                *left -= 1;
                return Err(InstallError::Unreachable {
                    switch,
                    reason: "injected control channel failure".to_string(),
                });
            }
        }
        if let Some(&limit) = st.port_limits.get(&switch) {
            if let Some(bad) = rules.iter().find(|r| r.out_port() == 0 || r.out_port() > limit) {
                return Err(InstallError::Rejected {
                    switch,
                    reason: format!("output port {} outside 1..={limit}", bad.out_port()),
                });
            }
        }

        let table = st.tables.entry(switch).or_default();
        for rule in rules {
            match table.iter_mut().find(|cur| cur.same_entry(rule)) {
                Some(cur) => *cur = *rule,
                None => table.push(*rule),
            }
        }
        trace!(entries = table.len(), "表项已更新");
        debug!(switch = %switch, rules = rules.len(), "内存交换机下发完成");
        Ok(())
    }
}
