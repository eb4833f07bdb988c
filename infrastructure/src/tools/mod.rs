//! Tool implementations: registry, executive, builtin handlers.
//!
//! Builtin tools cover local file access, directory listing, content
//! search, and (high-risk, opt-in) command execution. Additional tools
//! are registered at startup through [`ToolRegistry::register`].

pub mod command;
pub mod file;
pub mod handler;
pub mod search;

mod executive;
mod registry;

pub use executive::ToolExecutive;
pub use handler::{HandlerError, ToolHandler};
pub use registry::ToolRegistry;

use std::sync::Arc;

/// Build a registry with all builtin tools registered.
pub fn builtin_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    // Registering fixed definitions into an empty registry cannot collide.
    registry
        .register(file::read_file_definition(), Arc::new(file::ReadFileHandler))
        .expect("builtin registration");
    registry
        .register(file::write_file_definition(), Arc::new(file::WriteFileHandler))
        .expect("builtin registration");
    registry
        .register(
            file::list_directory_definition(),
            Arc::new(file::ListDirectoryHandler),
        )
        .expect("builtin registration");
    registry
        .register(
            command::run_command_definition(),
            Arc::new(command::RunCommandHandler),
        )
        .expect("builtin registration");
    registry
        .register(
            search::grep_search_definition(),
            Arc::new(search::GrepSearchHandler),
        )
        .expect("builtin registration");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_has_all_tools() {
        let registry = builtin_registry();
        for name in [
            "read_file",
            "write_file",
            "list_directory",
            "run_command",
            "grep_search",
        ] {
            assert!(registry.contains(name), "missing builtin tool {}", name);
        }
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_builtin_risk_split() {
        let catalog = builtin_registry().catalog();
        assert!(catalog.get("run_command").unwrap().is_high_risk());
        assert!(catalog.get("write_file").unwrap().is_high_risk());
        assert!(!catalog.get("read_file").unwrap().is_high_risk());
        assert!(!catalog.get("list_directory").unwrap().is_high_risk());
    }
}
