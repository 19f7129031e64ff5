pub mod db;
pub mod kv;
pub mod password;

pub use db::DbAdapter;
pub use kv::MemoryKvAdapter;
pub use password::Argon2Adapter;
