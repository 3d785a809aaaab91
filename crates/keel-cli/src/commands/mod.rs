//! Command implementations.

pub mod draft;
pub mod edit;
pub mod history;
pub mod import;
pub mod registry;
pub mod show;

pub use self::draft::execute_draft;
pub use self::edit::{execute_edit, execute_lock};
pub use self::history::{execute_history, execute_records};
pub use self::import::execute_import;
pub use self::registry::execute_registry;
pub use self::show::{execute_check, execute_show};
