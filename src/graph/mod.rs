pub mod definition;
pub mod node;
pub mod router;
pub mod runtime;

pub use definition::{ContextField, EdgeDefinition, GraphDefinition, NodeDefinition};
pub use node::{NodeExecutor, NodeInputs, NodeRegistry, SelectNode, UnitNode};
pub use router::{FlagRouterNode, RouterOutput};
pub use runtime::GraphRuntime;
