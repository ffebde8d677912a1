pub mod config;
pub mod error;
pub mod fabric;
pub mod install;
pub mod net;
pub mod routing;
pub mod topo;

#[cfg(test)]
mod test;
