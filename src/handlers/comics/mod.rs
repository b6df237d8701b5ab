mod comic;
mod comments;
mod pages;
mod script;

pub use comic::{comic_create, comic_delete, comic_get, comic_patch};
pub use comments::{comic_comment_delete, comic_comment_post, comic_comment_rating_put};
pub use pages::{comic_draft_post, comic_drafts_publish, comic_page_post};
pub use script::comic_script_verify;
