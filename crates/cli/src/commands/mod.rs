pub mod ask;
pub mod models;
pub mod status;
