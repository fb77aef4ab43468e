pub mod broadcaster;
pub mod db;
pub mod memory;

pub use broadcaster::{ConnectionId, RoomRegistry};
pub use db::DbAdapter;
pub use memory::MemoryStore;
