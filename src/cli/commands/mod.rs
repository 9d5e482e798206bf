pub mod bootstrap;
pub mod browse;
pub mod entity;
pub mod serve;
