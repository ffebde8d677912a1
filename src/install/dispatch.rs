//! 并发下发
//!
//! 不同交换机之间并发（`workers` 个并发上限），同一台交换机串行：
//! 每台交换机只有一个任务，重试也在这个任务里顺序进行。
//! 每次下发都有超时，超时按不可达处理；一台失败不影响其它交换机。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::installer::RuleInstaller;
use crate::error::InstallError;
use crate::net::SwitchId;
use crate::routing::{FlowRule, ForwardingPlan};

#[derive(Debug, Clone)]
pub struct InstallOpts {
    pub workers: usize,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for InstallOpts {
    fn default() -> Self {
        Self {
            workers: 8,
            timeout: Duration::from_secs(5),
            retries: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// 一次全网下发的结果
#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<SwitchId>,
    pub failed: Vec<(SwitchId, InstallError)>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 向单台交换机下发，不可达时按指数退避重试
#[tracing::instrument(skip(installer, rules, opts), fields(switch = %switch, rules = rules.len()))]
pub async fn install_switch<I>(
    installer: &I,
    switch: SwitchId,
    rules: &[FlowRule],
    opts: &InstallOpts,
) -> Result<(), InstallError>
where
    I: RuleInstaller + ?Sized,
{
    let mut attempt = 0u32;
    let mut backoff = opts.backoff;
    loop {
        attempt += 1;
        let res = match tokio::time::timeout(opts.timeout, installer.install(switch, rules)).await {
            Ok(res) => res,
            Err(_) => Err(InstallError::Unreachable {
                switch,
                reason: format!("no answer within {:?}", opts.timeout),
            }),
        };
        match res {
            Ok(()) => {
                debug!(attempt, "下发成功");
                return Ok(());
            }
            Err(e) if e.is_retryable() && attempt <= opts.retries => {
                warn!(attempt, error = %e, backoff = ?backoff, "下发失败，稍后重试");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => {
                warn!(attempt, error = %e, "下发失败，放弃");
                return Err(e);
            }
        }
    }
}

/// 把整份转发计划推到全网
pub async fn install_plan<I>(
    installer: Arc<I>,
    plan: &ForwardingPlan,
    opts: &InstallOpts,
) -> InstallReport
where
    I: RuleInstaller + ?Sized + 'static,
{
    let permits = Arc::new(Semaphore::new(opts.workers.max(1)));
    let mut tasks = JoinSet::new();
    let mut pending: BTreeSet<SwitchId> = BTreeSet::new();

    for table in plan.iter() {
        let installer = Arc::clone(&installer);
        let permits = Arc::clone(&permits);
        let opts = opts.clone();
        let switch = table.switch;
        let rules = table.rules.clone();
        pending.insert(switch);
        tasks.spawn(async move {
            let res = match permits.acquire_owned().await {
                Ok(_permit) => install_switch(installer.as_ref(), switch, &rules, &opts).await,
                Err(_) => Err(InstallError::Unreachable {
                    switch,
                    reason: "worker pool closed".to_string(),
                }),
            };
            (switch, res)
        });
    }

    let mut report = InstallReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((switch, res)) => {
                pending.remove(&switch);
                match res {
                    Ok(()) => report.installed.push(switch),
                    Err(e) => report.failed.push((switch, e)),
                }
            }
            Err(e) => warn!(error = %e, "下发任务异常退出"),
        }
    }
    for switch in pending {
        report.failed.push((
            switch,
            InstallError::Unreachable {
                switch,
                reason: "install task aborted".to_string(),
            },
        ));
    }

    report.installed.sort();
    report.failed.sort_by_key(|(sw, _)| *sw);
    info!(
        installed = report.installed.len(),
        failed = report.failed.len(),
        "📦 转发计划下发完成"
    );
    report
}
