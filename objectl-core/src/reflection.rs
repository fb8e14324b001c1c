//! # Schema Reflection
//!
//! Discovery of object types from a `DescriptorPool` and generic dispatch of the object
//! operations.
//!
//! * [`Registry`] scans the enabled packages once and resolves type names and aliases.
//! * [`ObjectDescriptor`] performs `get`, `list`, `create`, `update` and `delete` for one type.
mod metadata;
mod object;
mod plural;
mod registry;
mod scanner;

pub use metadata::Metadata;
pub use object::{ListOptions, ListResult, ObjectDescriptor, ObjectError, Operation};
pub use registry::{Registry, RegistryBuilder};
pub use scanner::MethodBinding;
