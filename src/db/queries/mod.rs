//! Database queries, one module per entity

pub mod brand;
pub mod history;
pub mod location;
pub mod login_log;
pub mod municipality;
pub mod work_order;
