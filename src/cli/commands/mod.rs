pub mod migrate;
pub mod perms;
pub mod user;
