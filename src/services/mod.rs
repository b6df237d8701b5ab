pub mod comics;
pub mod messages;
pub mod users;
