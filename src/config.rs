//! 网络配置
//!
//! JSON 形式的 fabric 描述：形状参数、链路带宽、编译策略和下发参数。
//! 可选字段缺省时取默认值。

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FabricError};
use crate::install::InstallOpts;
use crate::net::AddressPlan;
use crate::routing::{CompilerOpts, ForwardingPlan, RoutingCompiler, ShapeSupport, UplinkPolicy};
use crate::topo::fat_tree::{FatTreeOpts, FatTreeTopology, LinkBandwidth, build_fat_tree};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricConfig {
    pub k: usize,
    pub density: usize,
    #[serde(default)]
    pub bandwidth: LinkBandwidth,
    #[serde(default)]
    pub uplink: UplinkPolicy,
    #[serde(default)]
    pub shapes: ShapeSupport,
    #[serde(default)]
    pub install: InstallSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallSettings {
    pub workers: usize,
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for InstallSettings {
    fn default() -> Self {
        let opts = InstallOpts::default();
        Self {
            workers: opts.workers,
            timeout_ms: opts.timeout.as_millis() as u64,
            retries: opts.retries,
            backoff_ms: opts.backoff.as_millis() as u64,
        }
    }
}

/// 构建好的拓扑、地址表和转发计划
#[derive(Debug, Clone)]
pub struct CompiledFabric {
    pub topo: FatTreeTopology,
    pub addrs: AddressPlan,
    pub plan: ForwardingPlan,
}

impl FabricConfig {
    pub fn new(k: usize, density: usize) -> Self {
        Self {
            k,
            density,
            bandwidth: LinkBandwidth::default(),
            uplink: UplinkPolicy::default(),
            shapes: ShapeSupport::default(),
            install: InstallSettings::default(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn topo_opts(&self) -> FatTreeOpts {
        FatTreeOpts {
            k: self.k,
            density: self.density,
            bandwidth: self.bandwidth,
        }
    }

    pub fn compiler_opts(&self) -> CompilerOpts {
        CompilerOpts {
            shapes: self.shapes,
            uplink: self.uplink,
        }
    }

    pub fn install_opts(&self) -> InstallOpts {
        InstallOpts {
            workers: self.install.workers,
            timeout: Duration::from_millis(self.install.timeout_ms),
            retries: self.install.retries,
            backoff: Duration::from_millis(self.install.backoff_ms),
        }
    }

    /// 拓扑 → 编址 → 编译
    pub fn compile(&self) -> Result<CompiledFabric, FabricError> {
        // 编址放不下的形状不构建拓扑
        AddressPlan::check_capacity(self.k.saturating_mul(self.k / 2), self.density)?;
        let topo = build_fat_tree(&self.topo_opts())?;
        let addrs = AddressPlan::assign(&topo)?;
        let plan = RoutingCompiler::new(&topo, &addrs, self.compiler_opts())?.compile_all()?;
        Ok(CompiledFabric { topo, addrs, plan })
    }
}
