//! 主机编址
//!
//! 主机地址形如 `10.<edge>.0.<slot>`：第二段是 edge 交换机序号，
//! 第四段是主机在该 edge 下的槽位（1..=d）。地址是主机身份的纯函数。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::id::{HostId, SwitchId};
use crate::error::FabricError;
use crate::topo::fat_tree::FatTreeTopology;

/// 地址第一段
pub const ADDR_PREFIX: u8 = 10;
/// 地址第三段
pub const ADDR_FILL: u8 = 0;

/// 结构化主机地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostAddr(pub Ipv4Addr);

impl HostAddr {
    /// 由主机身份直接算出地址；超出单字节范围时失败
    pub fn for_host(host: HostId) -> Result<Self, FabricError> {
        let edge = u8::try_from(host.edge).map_err(|_| FabricError::InvalidParameter(format!(
            "edge index {} does not fit the address convention",
            host.edge
        )))?;
        let slot = u8::try_from(host.slot).map_err(|_| FabricError::InvalidParameter(format!(
            "host slot {} does not fit the address convention",
            host.slot
        )))?;
        Ok(Self(Ipv4Addr::new(ADDR_PREFIX, edge, ADDR_FILL, slot)))
    }

    pub fn edge_index(&self) -> usize {
        self.0.octets()[1] as usize
    }

    pub fn slot(&self) -> usize {
        self.0.octets()[3] as usize
    }

    /// 按编址约定反推拓扑位置（不查表）
    pub fn host(&self) -> HostId {
        HostId::new(self.edge_index(), self.slot())
    }
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 主机 <-> 地址 的双向映射
#[derive(Debug, Clone, Default)]
pub struct AddressPlan {
    density: usize,
    by_host: BTreeMap<HostId, HostAddr>,
    by_addr: HashMap<HostAddr, HostId>,
}

impl AddressPlan {
    /// `10.<edge>.0.<slot>` 能否容纳该形状
    pub fn check_capacity(edges: usize, density: usize) -> Result<(), FabricError> {
        if edges > u8::MAX as usize || density > u8::MAX as usize {
            return Err(FabricError::AddressSpaceExhausted { edges, density });
        }
        Ok(())
    }

    /// 按 edge 升序、槽位升序依次分配地址
    pub fn assign(topo: &FatTreeTopology) -> Result<Self, FabricError> {
        let expected = topo.edge_count() * topo.density;
        if topo.hosts.len() != expected {
            return Err(FabricError::InvalidParameter(format!(
                "topology has {} hosts, expected {} edges x {} density = {}",
                topo.hosts.len(),
                topo.edge_count(),
                topo.density,
                expected
            )));
        }
        Self::check_capacity(topo.edge_count(), topo.density)?;

        let mut plan = Self {
            density: topo.density,
            by_host: BTreeMap::new(),
            by_addr: HashMap::with_capacity(expected),
        };

        let mut edge = 1;
        let mut slot = 1;
        for &host in &topo.hosts {
            if host != HostId::new(edge, slot) {
                return Err(FabricError::InvalidParameter(format!(
                    "host {host} out of order, expected {}",
                    HostId::new(edge, slot)
                )));
            }
            let addr = HostAddr::for_host(host)?;
            plan.by_host.insert(host, addr);
            plan.by_addr.insert(addr, host);

            slot += 1;
            if slot == topo.density + 1 {
                slot = 1;
                edge += 1;
            }
        }

        debug!(hosts = plan.len(), "主机地址分配完成");
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }

    pub fn density(&self) -> usize {
        self.density
    }

    pub fn addr_of(&self, host: HostId) -> Option<HostAddr> {
        self.by_host.get(&host).copied()
    }

    pub fn host_of(&self, addr: HostAddr) -> Option<HostId> {
        self.by_addr.get(&addr).copied()
    }

    /// 地址对应的 (edge 交换机, 槽位)
    pub fn position_of(&self, addr: HostAddr) -> Option<(SwitchId, usize)> {
        self.host_of(addr)
            .map(|h| (SwitchId::edge(h.edge), h.slot))
    }

    /// 按主机顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (HostId, HostAddr)> + '_ {
        self.by_host.iter().map(|(h, a)| (*h, *a))
    }
}
