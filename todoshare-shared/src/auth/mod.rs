/// Authorization for ToDos and Tasks
///
/// Authentication is handled by the external identity provider; the core
/// receives an already verified user id and only decides what that user may
/// do.
///
/// # Modules
///
/// - [`authorization`]: access resolution, write capability, owner checks

pub mod authorization;
