mod config;
mod routing_table;
mod subnet_group;
