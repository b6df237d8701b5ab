mod message;
mod send;

pub use message::{message_delete, message_get, message_patch, message_read_put};
pub use send::message_send;
