pub mod categories;
pub mod health;
pub mod profiles;
pub mod tasks;
pub mod users;
