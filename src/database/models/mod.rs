pub mod comic;
pub mod message;
pub mod user;

pub use comic::{ComicDocument, ComicId};
pub use message::MessageDocument;
pub use user::{ProfileUpdate, UserDocument};
