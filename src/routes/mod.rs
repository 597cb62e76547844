/// Router Module Index
///
/// Routing split by access level; each level's guard is applied as a layer in `create_router`.

/// Routes reachable without a token.
pub mod public;

/// Routes behind `auth_middleware`.
pub mod authenticated;

/// Routes behind `auth_middleware` and `admin_middleware`.
pub mod admin;
