pub mod db;
pub mod listener;
pub mod notify;

pub use db::DbAdapter;
pub use listener::{run_change_listener, supervise_change_listener};
pub use notify::ChangeHub;
