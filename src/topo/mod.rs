//! 拓扑模块

pub mod fat_tree;
