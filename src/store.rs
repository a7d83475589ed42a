pub mod dao;
pub mod kv;
pub mod models;
