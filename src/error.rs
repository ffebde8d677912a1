//! 错误类型
//!
//! 拓扑构建、地址分配、路由编译属于 [`FabricError`]；
//! 向交换机下发规则属于 [`InstallError`]（按交换机隔离，可重试）。

use thiserror::Error;

use crate::net::SwitchId;

/// 拓扑 / 编址 / 编译阶段的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FabricError {
    /// k / d 非法（构造期致命错误）
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// 当前策略无法编译该 k
    #[error("unsupported fat-tree shape: k={k}")]
    UnsupportedTopology { k: usize },
    /// `10.<edge>.0.<slot>` 编址放不下该拓扑
    #[error("address space exhausted: {edges} edge switches x {density} hosts")]
    AddressSpaceExhausted { edges: usize, density: usize },
    /// 非空层上的交换机没有编译出任何规则
    #[error("switch {0} compiled to an empty rule set")]
    EmptyRuleSet(SwitchId),
}

/// 规则下发错误（单个交换机范围内）
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("switch {switch} unreachable: {reason}")]
    Unreachable { switch: SwitchId, reason: String },
    #[error("switch {switch} rejected rule set: {reason}")]
    Rejected { switch: SwitchId, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    /// 只有不可达才值得重试；被拒绝的规则重发也还是会被拒绝。
    pub fn is_retryable(&self) -> bool {
        matches!(self, InstallError::Unreachable { .. })
    }

    pub fn switch(&self) -> Option<SwitchId> {
        match self {
            InstallError::Unreachable { switch, .. } | InstallError::Rejected { switch, .. } => {
                Some(*switch)
            }
            InstallError::Io(_) => None,
        }
    }
}

/// 配置文件读取 / 解析错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}
