//! 数据模型模块
//! 用户、会话、角色权限、站点页面、社交连接与审计日志

pub mod audit;
pub mod auth;
pub mod role;
pub mod session;
pub mod site;
pub mod social;
pub mod user;
