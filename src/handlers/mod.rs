// Request handlers, grouped by the collection they serve.
//
// Every `/api` route runs behind the `authenticate` middleware, which puts a
// `Session` in the request extensions. Handlers that need a signed-in user
// call `Session::require`; user-management routes go through
// `perm_to_get_user_in_api`.

pub mod comics;
pub mod email_taken;
pub mod messages;
pub mod root;
pub mod session;
pub mod users;
