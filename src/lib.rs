//! offline-shell 库
//! 离线缓存控制器以及承载它的 HTTP 服务，供集成测试和外部 crate 使用

pub mod application;
pub mod cli;
pub mod config;
pub mod consts;
pub mod controller;
pub mod error;
pub mod http;
pub mod middlewares;
pub mod utils;
