//! 流表规则
//!
//! 一条规则 = 匹配（流量类别 + 目的地址/掩码）+ 输出端口 + 优先级。
//! 所有规则都装在 table 0，idle / hard timeout 均为 0（永久）。

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::net::{ADDR_FILL, ADDR_PREFIX, HostAddr};

/// 下行规则（精确主机 / edge 子网）的优先级
pub const DOWNSTREAM_PRIORITY: u16 = 10;
/// 上行规则（按槽位后缀分流）的优先级
pub const UPSTREAM_PRIORITY: u16 = 1;

/// 流量类别：地址解析（ARP）或 IP 数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClass {
    Arp,
    Ip,
}

impl TrafficClass {
    pub const ALL: [TrafficClass; 2] = [TrafficClass::Arp, TrafficClass::Ip];

    pub fn as_str(self) -> &'static str {
        match self {
            TrafficClass::Arp => "arp",
            TrafficClass::Ip => "ip",
        }
    }
}

/// 目的地址匹配：`addr/mask`，mask 可以不连续（后缀匹配）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DstMatch {
    pub addr: Ipv4Addr,
    pub mask: Ipv4Addr,
}

impl DstMatch {
    /// 精确匹配某台主机
    pub fn host(addr: HostAddr) -> Self {
        Self {
            addr: addr.0,
            mask: Ipv4Addr::BROADCAST,
        }
    }

    /// `10.<edge>.0.0/16`：某台 edge 交换机下的所有主机
    pub fn edge_subnet(edge: u8) -> Self {
        Self {
            addr: Ipv4Addr::new(ADDR_PREFIX, edge, ADDR_FILL, 0),
            mask: Ipv4Addr::new(255, 255, 0, 0),
        }
    }

    /// `0.0.0.<slot>/0.0.0.255`：任意 edge 下槽位为 `slot` 的主机
    pub fn slot_suffix(slot: u8) -> Self {
        Self {
            addr: Ipv4Addr::new(0, 0, 0, slot),
            mask: Ipv4Addr::new(0, 0, 0, 255),
        }
    }

    pub fn matches(&self, ip: Ipv4Addr) -> bool {
        let mask = u32::from(self.mask);
        u32::from(ip) & mask == u32::from(self.addr) & mask
    }

    /// 掩码连续时返回前缀长度
    pub fn prefix_len(&self) -> Option<u32> {
        let mask = u32::from(self.mask);
        let len = mask.leading_ones();
        (mask.checked_shl(len).unwrap_or(0) == 0).then_some(len)
    }
}

impl fmt::Display for DstMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix_len() {
            Some(32) => write!(f, "{}", self.addr),
            Some(len) => write!(f, "{}/{}", self.addr, len),
            None => write!(f, "{}/{}", self.addr, self.mask),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    pub class: TrafficClass,
    pub dst: DstMatch,
}

impl FlowMatch {
    pub fn matches(&self, class: TrafficClass, dst: Ipv4Addr) -> bool {
        self.class == class && self.dst.matches(dst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "port", rename_all = "snake_case")]
pub enum Action {
    Output(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRule {
    pub table: u8,
    pub priority: u16,
    #[serde(rename = "match")]
    pub matcher: FlowMatch,
    pub action: Action,
}

impl FlowRule {
    pub fn output(priority: u16, class: TrafficClass, dst: DstMatch, port: u32) -> Self {
        Self {
            table: 0,
            priority,
            matcher: FlowMatch { class, dst },
            action: Action::Output(port),
        }
    }

    pub fn out_port(&self) -> u32 {
        match self.action {
            Action::Output(port) => port,
        }
    }

    /// 同表、同优先级、同匹配即视为同一条流表项（下发时覆盖）
    pub fn same_entry(&self, other: &FlowRule) -> bool {
        self.table == other.table && self.priority == other.priority && self.matcher == other.matcher
    }

    /// `ovs-ofctl add-flow(s)` 的流描述语法
    pub fn ofctl_spec(&self) -> String {
        let Action::Output(port) = self.action;
        format!(
            "table={},idle_timeout=0,hard_timeout=0,priority={},{},nw_dst={},actions=output:{}",
            self.table,
            self.priority,
            self.matcher.class.as_str(),
            self.matcher.dst,
            port
        )
    }
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ofctl_spec())
    }
}
