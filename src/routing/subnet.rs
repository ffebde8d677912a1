//! agg 交换机的子网组
//!
//! 子网组 = 与该 agg 同 pod 的 `k/2` 台 edge 的序号，顺序决定下行端口：
//! 第 `j` 个子网走 `k/2 + j` 号端口。

use serde::{Deserialize, Serialize};

use crate::error::FabricError;

/// 编译器接受哪些 `k`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeSupport {
    /// 任意偶数 k（受编址约定限制）
    #[default]
    General,
    /// 只接受 k = 4 / 8 的两张固定窗口表
    Reference,
}

/// agg `num`（1 起始）在 pod 内的位置（1 起始）：余数为 0 时取 pod 的最后一个位置
fn pod_position(half: usize, num: usize) -> usize {
    match num % half {
        0 => half,
        r => r,
    }
}

/// 求 agg `num` 的子网组（edge 序号，升序）
pub fn subnet_group(k: usize, num: usize, support: ShapeSupport) -> Result<Vec<usize>, FabricError> {
    if k < 2 || k % 2 != 0 || num == 0 {
        return Err(FabricError::InvalidParameter(format!(
            "subnet group needs even k >= 2 and num >= 1, got k={k} num={num}"
        )));
    }
    match support {
        ShapeSupport::General => Ok(general_window(k / 2, num)),
        ShapeSupport::Reference => reference_window(k, num),
    }
}

fn general_window(half: usize, num: usize) -> Vec<usize> {
    let first = num + 1 - pod_position(half, num);
    (first..first + half).collect()
}

fn reference_window(k: usize, num: usize) -> Result<Vec<usize>, FabricError> {
    let group = match (k, num % (k / 2)) {
        (4, 0) => vec![num - 1, num],
        (4, 1) => vec![num, num + 1],
        (8, 0) => vec![num - 3, num - 2, num - 1, num],
        (8, 1) => vec![num, num + 1, num + 2, num + 3],
        (8, 2) => vec![num - 1, num, num + 1, num + 2],
        (8, 3) => vec![num - 2, num - 1, num, num + 1],
        _ => return Err(FabricError::UnsupportedTopology { k }),
    };
    Ok(group)
}
