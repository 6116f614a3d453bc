pub mod category;
pub mod ids;
pub mod profile;
pub mod task;
pub mod user;
mod validation;
