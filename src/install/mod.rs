//! 规则下发模块
//!
//! 下发接口、`ovs-ofctl` 实现，以及带并发上限 / 超时 / 重试的全网下发。

mod dispatch;
mod installer;
mod ofctl;

pub use dispatch::{InstallOpts, InstallReport, install_plan, install_switch};
pub use installer::RuleInstaller;
pub use ofctl::{OfctlInstaller, classify_failure};
