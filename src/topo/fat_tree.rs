//! Fat-tree 拓扑构建
//!
//! 拓扑只由 `k`（pod 数）和 `d`（每台 edge 交换机下挂的主机数）决定：
//! - core：`(k/2)^2` 台
//! - agg / edge：各 `k^2/2` 台，每个 pod `k/2` 台，pod 内全互联
//! - host：`edge * d` 台
//!
//! 邻接关系与端口号全部按 `k`、`d` 现算，不单独存储，保证一致。
//!
//! 端口编号与仿真器挂链路的顺序一致：
//! - core：端口 `p` 连第 `p` 个 pod
//! - agg：`1..=k/2` 上联 core，`k/2+1..=k` 下联本 pod 的 edge
//! - edge：`1..=k/2` 上联本 pod 的 agg，`k/2+1..=k/2+d` 下联主机
//! - host：只有端口 1

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FabricError;
use crate::net::{Endpoint, HostId, Layer, SwitchId};

/// 各层链路带宽（Mbps），只透传给仿真器，编译器不关心
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkBandwidth {
    pub core_agg_mbps: u64,
    pub agg_edge_mbps: u64,
    pub edge_host_mbps: u64,
}

impl Default for LinkBandwidth {
    fn default() -> Self {
        Self {
            core_agg_mbps: 10,
            agg_edge_mbps: 10,
            edge_host_mbps: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FatTreeOpts {
    pub k: usize,
    pub density: usize,
    pub bandwidth: LinkBandwidth,
}

impl Default for FatTreeOpts {
    fn default() -> Self {
        Self {
            k: 4,
            density: 2,
            bandwidth: LinkBandwidth::default(),
        }
    }
}

/// 一条双向物理链路（仿真器按 `links()` 的顺序创建）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: Endpoint,
    pub a_port: u32,
    pub b: Endpoint,
    pub b_port: u32,
    pub bandwidth_mbps: u64,
}

#[derive(Debug, Clone)]
pub struct FatTreeTopology {
    pub k: usize,
    pub density: usize,
    pub bandwidth: LinkBandwidth,
    pub core_switches: Vec<SwitchId>,
    pub agg_switches: Vec<SwitchId>,
    pub edge_switches: Vec<SwitchId>,
    pub hosts: Vec<HostId>,
}

impl FatTreeTopology {
    /// 按 `(k, d)` 构建，带宽取默认值
    pub fn new(k: usize, density: usize) -> Result<Self, FabricError> {
        build_fat_tree(&FatTreeOpts {
            k,
            density,
            ..FatTreeOpts::default()
        })
    }

    pub fn half(&self) -> usize {
        self.k / 2
    }

    pub fn pod_count(&self) -> usize {
        self.k
    }

    pub fn core_count(&self) -> usize {
        self.half() * self.half()
    }

    pub fn agg_count(&self) -> usize {
        self.k * self.k / 2
    }

    pub fn edge_count(&self) -> usize {
        self.k * self.k / 2
    }

    pub fn host_count(&self) -> usize {
        self.edge_count() * self.density
    }

    pub fn switches(&self, layer: Layer) -> &[SwitchId] {
        match layer {
            Layer::Core => &self.core_switches,
            Layer::Agg => &self.agg_switches,
            Layer::Edge => &self.edge_switches,
        }
    }

    /// 所有交换机：core → agg → edge，层内按序号升序
    pub fn all_switches(&self) -> impl Iterator<Item = SwitchId> + '_ {
        Layer::ALL
            .into_iter()
            .flat_map(move |layer| self.switches(layer).iter().copied())
    }

    pub fn contains(&self, sw: SwitchId) -> bool {
        sw.index >= 1 && sw.index <= self.switches(sw.layer).len()
    }

    pub fn contains_host(&self, host: HostId) -> bool {
        host.edge >= 1
            && host.edge <= self.edge_count()
            && host.slot >= 1
            && host.slot <= self.density
    }

    /// 第 `pod` 个 pod（0 起始）里位置 `pos`（0 起始）的 edge 交换机
    pub fn edge(&self, pod: usize, pos: usize) -> Option<SwitchId> {
        self.positional(&self.edge_switches, pod, pos)
    }

    /// 第 `pod` 个 pod（0 起始）里位置 `pos`（0 起始）的 agg 交换机
    pub fn agg(&self, pod: usize, pos: usize) -> Option<SwitchId> {
        self.positional(&self.agg_switches, pod, pos)
    }

    /// 第 `group` 组 core 中的第 `pos` 台（均 0 起始）；第 `group` 组连接各 pod 中位置 `group` 的 agg
    pub fn core(&self, group: usize, pos: usize) -> Option<SwitchId> {
        self.positional(&self.core_switches, group, pos)
    }

    /// 第 `pod` 个 pod 里第 `edge` 台 edge 下的第 `pos` 台主机，三个参数都从 0 起；
    /// 返回的 [`HostId::slot`] 从 1 起，即 `host(0, 0, 0) == HostId::new(1, 1)`
    pub fn host(&self, pod: usize, edge: usize, pos: usize) -> Option<HostId> {
        if pos >= self.density {
            return None;
        }
        let e = self.edge(pod, edge)?;
        self.hosts.get((e.index - 1) * self.density + pos).copied()
    }

    fn positional(&self, layer: &[SwitchId], group: usize, pos: usize) -> Option<SwitchId> {
        let h = self.half();
        if pos >= h {
            return None;
        }
        layer.get(group.checked_mul(h)?.checked_add(pos)?).copied()
    }

    /// agg / edge 所在 pod（0 起始）；core 或不在拓扑里的交换机返回 `None`
    pub fn pod_of(&self, sw: SwitchId) -> Option<usize> {
        if !self.contains(sw) {
            return None;
        }
        match sw.layer {
            Layer::Core => None,
            Layer::Agg | Layer::Edge => Some((sw.index - 1) / self.half()),
        }
    }

    /// agg / edge 在 pod 内的位置；core 返回所在组号
    pub fn position(&self, sw: SwitchId) -> Option<usize> {
        if !self.contains(sw) {
            return None;
        }
        Some(match sw.layer {
            Layer::Core => (sw.index - 1) / self.half(),
            Layer::Agg | Layer::Edge => (sw.index - 1) % self.half(),
        })
    }

    /// edge 交换机下挂的主机；非 edge 或不存在的交换机返回空切片
    pub fn hosts_of(&self, edge: SwitchId) -> &[HostId] {
        if edge.layer != Layer::Edge || !self.contains(edge) {
            return &[];
        }
        let start = (edge.index - 1) * self.density;
        &self.hosts[start..start + self.density]
    }

    pub fn edge_of(&self, host: HostId) -> SwitchId {
        SwitchId::edge(host.edge)
    }

    /// edge 交换机上联的 agg，按上联端口顺序
    pub fn aggs_of_edge(&self, edge: SwitchId) -> Vec<SwitchId> {
        (1..=self.half())
            .filter_map(|port| match self.peer(edge, port as u32) {
                Some(Endpoint::Switch(sw)) => Some(sw),
                _ => None,
            })
            .collect()
    }

    /// agg 交换机下联的 edge，按下联端口顺序
    pub fn edges_of_agg(&self, agg: SwitchId) -> Vec<SwitchId> {
        let h = self.half();
        (h + 1..=2 * h)
            .filter_map(|port| match self.peer(agg, port as u32) {
                Some(Endpoint::Switch(sw)) => Some(sw),
                _ => None,
            })
            .collect()
    }

    /// agg 交换机上联的 core，按上联端口顺序
    pub fn cores_of_agg(&self, agg: SwitchId) -> Vec<SwitchId> {
        (1..=self.half())
            .filter_map(|port| match self.peer(agg, port as u32) {
                Some(Endpoint::Switch(sw)) => Some(sw),
                _ => None,
            })
            .collect()
    }

    /// core 交换机下联的 agg，每个 pod 一台，按端口顺序
    pub fn aggs_of_core(&self, core: SwitchId) -> Vec<SwitchId> {
        (1..=self.k)
            .filter_map(|port| match self.peer(core, port as u32) {
                Some(Endpoint::Switch(sw)) => Some(sw),
                _ => None,
            })
            .collect()
    }

    pub fn port_count(&self, sw: SwitchId) -> usize {
        match sw.layer {
            Layer::Core | Layer::Agg => self.k,
            Layer::Edge => self.half() + self.density,
        }
    }

    /// 交换机端口对端；端口越界或交换机不存在时返回 `None`
    pub fn peer(&self, sw: SwitchId, port: u32) -> Option<Endpoint> {
        if !self.contains(sw) || port == 0 || port as usize > self.port_count(sw) {
            return None;
        }
        let h = self.half();
        let port = port as usize;
        let peer = match sw.layer {
            Layer::Core => {
                let group = (sw.index - 1) / h;
                Endpoint::Switch(SwitchId::agg((port - 1) * h + group + 1))
            }
            Layer::Agg => {
                let pod = (sw.index - 1) / h;
                let pos = (sw.index - 1) % h;
                if port <= h {
                    Endpoint::Switch(SwitchId::core(pos * h + port))
                } else {
                    Endpoint::Switch(SwitchId::edge(pod * h + port - h))
                }
            }
            Layer::Edge => {
                let pod = (sw.index - 1) / h;
                if port <= h {
                    Endpoint::Switch(SwitchId::agg(pod * h + port))
                } else {
                    Endpoint::Host(HostId::new(sw.index, port - h))
                }
            }
        };
        Some(peer)
    }

    /// `from` 上通往相邻节点 `to` 的端口
    pub fn port_towards(&self, from: SwitchId, to: Endpoint) -> Option<u32> {
        (1..=self.port_count(from) as u32).find(|&p| self.peer(from, p) == Some(to))
    }

    /// 主机挂在所属 edge 交换机上的端口
    pub fn host_port(&self, host: HostId) -> u32 {
        (self.half() + host.slot) as u32
    }

    /// 全部物理链路，顺序为 core-agg、agg-edge、edge-host
    pub fn links(&self) -> Vec<LinkSpec> {
        let h = self.half();
        let bw = self.bandwidth;
        let mut links = Vec::with_capacity(self.core_count() * self.k + self.agg_count() * h + self.host_count());

        for pod in 0..self.k {
            for i in 0..h {
                for j in 0..h {
                    links.push(LinkSpec {
                        a: Endpoint::Switch(SwitchId::core(i * h + j + 1)),
                        a_port: (pod + 1) as u32,
                        b: Endpoint::Switch(SwitchId::agg(pod * h + i + 1)),
                        b_port: (j + 1) as u32,
                        bandwidth_mbps: bw.core_agg_mbps,
                    });
                }
            }
        }

        for pod in 0..self.k {
            for i in 0..h {
                for j in 0..h {
                    links.push(LinkSpec {
                        a: Endpoint::Switch(SwitchId::agg(pod * h + i + 1)),
                        a_port: (h + j + 1) as u32,
                        b: Endpoint::Switch(SwitchId::edge(pod * h + j + 1)),
                        b_port: (i + 1) as u32,
                        bandwidth_mbps: bw.agg_edge_mbps,
                    });
                }
            }
        }

        for &edge in &self.edge_switches {
            for &host in self.hosts_of(edge) {
                links.push(LinkSpec {
                    a: Endpoint::Switch(edge),
                    a_port: self.host_port(host),
                    b: Endpoint::Host(host),
                    b_port: 1,
                    bandwidth_mbps: bw.edge_host_mbps,
                });
            }
        }

        links
    }
}

/// 单个拓扑允许的主机数上限（同时限制了各层交换机数）
pub const MAX_HOSTS: usize = 1 << 20;

pub fn build_fat_tree(opts: &FatTreeOpts) -> Result<FatTreeTopology, FabricError> {
    let k = opts.k;
    if k < 2 || k % 2 != 0 {
        return Err(FabricError::InvalidParameter(format!(
            "fat-tree k must be even and >= 2, got {k}"
        )));
    }
    if opts.density < 1 {
        return Err(FabricError::InvalidParameter(format!(
            "host density must be >= 1, got {}",
            opts.density
        )));
    }

    let half = k / 2;
    let overflow = || {
        FabricError::InvalidParameter(format!(
            "fat-tree k={k} density={} overflows the switch / host count",
            opts.density
        ))
    };
    let cores = half.checked_mul(half).ok_or_else(overflow)?;
    let edges = k.checked_mul(half).ok_or_else(overflow)?;
    let host_total = edges.checked_mul(opts.density).ok_or_else(overflow)?;
    if host_total > MAX_HOSTS {
        return Err(FabricError::InvalidParameter(format!(
            "fat-tree k={k} density={} needs {host_total} hosts, limit is {MAX_HOSTS}",
            opts.density
        )));
    }

    let core_switches: Vec<SwitchId> = (1..=cores).map(SwitchId::core).collect();
    let agg_switches: Vec<SwitchId> = (1..=edges).map(SwitchId::agg).collect();
    let edge_switches: Vec<SwitchId> = (1..=edges).map(SwitchId::edge).collect();

    let mut hosts = Vec::with_capacity(host_total);
    for edge in &edge_switches {
        for slot in 1..=opts.density {
            hosts.push(HostId::new(edge.index, slot));
        }
    }

    debug!(
        k,
        density = opts.density,
        cores = core_switches.len(),
        aggs = agg_switches.len(),
        edges = edge_switches.len(),
        hosts = hosts.len(),
        "构建 fat-tree 拓扑"
    );

    Ok(FatTreeTopology {
        k,
        density: opts.density,
        bandwidth: opts.bandwidth,
        core_switches,
        agg_switches,
        edge_switches,
        hosts,
    })
}
