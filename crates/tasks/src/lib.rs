pub mod cache;
pub mod client;
pub mod coordinator;
pub mod mutations;
pub mod store;

#[cfg(test)]
mod test_utils;

pub use cache::{QueryCache, QueryKey, QueryScope};
pub use client::HttpTaskStore;
pub use coordinator::{Collision, DragStart, Transition, handle_drop};
pub use store::{DbTaskStore, StoreError, TaskStore};
