mod config;
mod user;

pub use config::cmd_init_config;
pub use user::{CreateUserArgs, cmd_create_user, cmd_unlock_user};
