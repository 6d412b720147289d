mod container;
mod exec;
mod health;

pub use container::{handle_container_command, ContainerCommands};
pub use exec::{handle_exec_command, ExecCommand};
pub use health::health_check;
