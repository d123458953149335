pub mod dto;
pub mod error;
pub mod fields;
pub mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use error::UserError;
pub use fields::{Balance, Email, Role};
pub use memory::MemoryUserStore;
pub use repo::{PgUserStore, UserStore};
pub use repo_types::{NewUser, Profile, User};
