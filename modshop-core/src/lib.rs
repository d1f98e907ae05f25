// src/lib.rs

pub mod db;
pub mod repositories;
pub mod platforms;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use db::Database;
pub use modshop_common::error::Error;
pub use modshop_common::models;
