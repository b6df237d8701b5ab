mod account;
mod listing;
mod perms;

pub use account::{user_create, user_delete, user_get, user_patch, user_private_get, user_verify_email};
pub use listing::{user_comics_get, user_messages_get};
pub use perms::user_perms_put;
