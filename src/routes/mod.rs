mod auth;
mod health_check;
mod roles;
pub mod users;

pub use auth::{login, profile, refresh};
pub use health_check::health_check;
pub use roles::{assign_role, list_role_members, remove_role_member, RoleKind};
pub use users::{
    confirm_password_reset, create_user, delete_user, get_user, list_users,
    request_password_reset, update_user,
};
