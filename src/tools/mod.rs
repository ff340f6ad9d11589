pub mod builtin;
pub mod calculator;
pub mod command;
pub mod descriptor;
pub mod dispatcher;
pub mod manifest;
pub mod registry;
pub mod trait_def;

pub use command::CommandTool;
pub use descriptor::{BindError, ParamSpec, ParamType, ToolDescriptor};
pub use dispatcher::{ToolDispatcher, ToolResult};
pub use manifest::ToolManifest;
pub use registry::{RegisteredTool, RegistryError, ToolRegistry};
pub use trait_def::{Arguments, FnTool, Tool};
