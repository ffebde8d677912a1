//! 规则下发接口
//!
//! 编译器从不直接和交换机通信；下发走 [`RuleInstaller`]，
//! 具体传输（`ovs-ofctl`、内存假交换机……）由实现决定。

use async_trait::async_trait;

use crate::error::InstallError;
use crate::net::SwitchId;
use crate::routing::FlowRule;

/// 把一台交换机的整批规则推下去。
///
/// 实现必须是幂等的：重复下发同一批规则不能产生重复或冲突的表项。
#[async_trait]
pub trait RuleInstaller: Send + Sync {
    async fn install(&self, switch: SwitchId, rules: &[FlowRule]) -> Result<(), InstallError>;
}
