//! 标识符类型
//!
//! 交换机与主机的类型化身份：层级 + 1 起始的层内序号。
//! 名称（`3001`、`h001`）只由身份生成，从不反向解析。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 交换机层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Core,
    Agg,
    Edge,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Core, Layer::Agg, Layer::Edge];

    /// 仿真器节点名使用的层级前缀数字
    pub fn digit(self) -> u8 {
        match self {
            Layer::Core => 1,
            Layer::Agg => 2,
            Layer::Edge => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Layer::Core => "core",
            Layer::Agg => "agg",
            Layer::Edge => "edge",
        }
    }
}

/// 交换机标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SwitchId {
    pub layer: Layer,
    /// 层内序号，从 1 开始
    pub index: usize,
}

impl SwitchId {
    pub fn core(index: usize) -> Self {
        Self { layer: Layer::Core, index }
    }

    pub fn agg(index: usize) -> Self {
        Self { layer: Layer::Agg, index }
    }

    pub fn edge(index: usize) -> Self {
        Self { layer: Layer::Edge, index }
    }

    /// 仿真器里的交换机名，例如 `1001`、`2010`、`3032`
    pub fn node_name(&self) -> String {
        format!("{}{:03}", self.layer.digit(), self.index)
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.layer.as_str(), self.index)
    }
}

/// 主机标识符：所属 edge 交换机 + 本地槽位（1..=d）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostId {
    pub edge: usize,
    pub slot: usize,
}

impl HostId {
    pub fn new(edge: usize, slot: usize) -> Self {
        Self { edge, slot }
    }

    /// 全局序号（1 起始），按 edge 升序再按 slot 升序
    pub fn ordinal(&self, density: usize) -> usize {
        (self.edge - 1) * density + self.slot
    }

    /// 仿真器里的主机名，例如 `h001`
    pub fn node_name(&self, density: usize) -> String {
        format!("h{:03}", self.ordinal(density))
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host({}.{})", self.edge, self.slot)
    }
}

/// 链路端点：交换机或主机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    Switch(SwitchId),
    Host(HostId),
}

impl From<SwitchId> for Endpoint {
    fn from(id: SwitchId) -> Self {
        Endpoint::Switch(id)
    }
}

impl From<HostId> for Endpoint {
    fn from(id: HostId) -> Self {
        Endpoint::Host(id)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Switch(s) => s.fmt(f),
            Endpoint::Host(h) => h.fmt(f),
        }
    }
}
