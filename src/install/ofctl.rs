//! `ovs-ofctl` 下发
//!
//! 每台交换机一次 `ovs-ofctl -O OpenFlow13 add-flows <bridge> -`，规则从 stdin 写入。
//! 同匹配同优先级的 add 会覆盖原表项，重复下发是幂等的。

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use super::installer::RuleInstaller;
use crate::error::InstallError;
use crate::net::SwitchId;
use crate::routing::FlowRule;

#[derive(Debug, Clone)]
pub struct OfctlInstaller {
    pub ofctl: PathBuf,
    pub vsctl: PathBuf,
    pub protocol: String,
}

impl Default for OfctlInstaller {
    fn default() -> Self {
        Self {
            ofctl: PathBuf::from("ovs-ofctl"),
            vsctl: PathBuf::from("ovs-vsctl"),
            protocol: "OpenFlow13".to_string(),
        }
    }
}

impl OfctlInstaller {
    pub fn add_flows_args(&self, switch: SwitchId) -> Vec<String> {
        vec![
            "-O".to_string(),
            self.protocol.clone(),
            "add-flows".to_string(),
            switch.node_name(),
            "-".to_string(),
        ]
    }

    /// 批量下发时写入 stdin 的内容
    pub fn render_batch(rules: &[FlowRule]) -> String {
        let mut out = String::with_capacity(rules.len() * 96);
        for rule in rules {
            out.push_str(&rule.ofctl_spec());
            out.push('\n');
        }
        out
    }

    /// 把网桥协议设为 OpenFlow13
    pub async fn set_protocol13(&self, switch: SwitchId) -> Result<(), InstallError> {
        let bridge = switch.node_name();
        let out = Command::new(&self.vsctl)
            .args(["set", "bridge", bridge.as_str(), "protocols=OpenFlow13"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| InstallError::Unreachable {
                switch,
                reason: format!("failed to run {}: {e}", self.vsctl.display()),
            })?;
        if out.status.success() {
            Ok(())
        } else {
            Err(classify_failure(switch, &String::from_utf8_lossy(&out.stderr)))
        }
    }
}

/// 根据 stderr 区分连不上和规则被拒
pub fn classify_failure(switch: SwitchId, stderr: &str) -> InstallError {
    let reason = stderr.trim().to_string();
    let lower = reason.to_lowercase();
    let unreachable = ["failed to connect", "connection refused", "no such file", "not a bridge", "timed out"]
        .iter()
        .any(|needle| lower.contains(needle));
    if unreachable {
        InstallError::Unreachable { switch, reason }
    } else {
        InstallError::Rejected { switch, reason }
    }
}

#[async_trait]
impl RuleInstaller for OfctlInstaller {
    #[tracing::instrument(skip(self, rules), fields(switch = %switch, rules = rules.len()))]
    async fn install(&self, switch: SwitchId, rules: &[FlowRule]) -> Result<(), InstallError> {
        let batch = Self::render_batch(rules);
        trace!(batch = %batch, "add-flows 输入");

        let mut child = Command::new(&self.ofctl)
            .args(self.add_flows_args(switch))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InstallError::Unreachable {
                switch,
                reason: format!("failed to run {}: {e}", self.ofctl.display()),
            })?;

        let lost = |stage: &str, e: std::io::Error| InstallError::Unreachable {
            switch,
            reason: format!("{} {stage}: {e}", self.ofctl.display()),
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(batch.as_bytes())
                .await
                .map_err(|e| lost("stdin write failed", e))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| lost("stdin close failed", e))?;
        }

        let out = child
            .wait_with_output()
            .await
            .map_err(|e| lost("wait failed", e))?;
        if !out.status.success() {
            return Err(classify_failure(switch, &String::from_utf8_lossy(&out.stderr)));
        }
        debug!("ovs-ofctl add-flows 完成");
        Ok(())
    }
}
