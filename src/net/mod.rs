//! 身份与编址模块
//!
//! 交换机 / 主机的类型化身份，以及主机地址分配。

// 子模块声明
mod addr;
mod id;

// 重新导出公共接口
pub use addr::{ADDR_FILL, ADDR_PREFIX, AddressPlan, HostAddr};
pub use id::{Endpoint, HostId, Layer, SwitchId};
