//! 数据库实体定义
//!
//! 四张表：账户（含注册公钥）、一次性配对码、离线凭证（voucher）、
//! 配对关系（canonical 无序对）。由 `migration` crate 负责建表。

pub mod account;
pub mod pairing;
pub mod pairing_code;
pub mod voucher;
