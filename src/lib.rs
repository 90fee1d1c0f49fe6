//! site-auth：认证与分级 RBAC 服务
//! 会话凭证生命周期与站点/页面三级权限解析

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
