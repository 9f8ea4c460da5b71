pub mod context;
pub mod forward;
pub mod node_a;
pub mod node_b;
pub mod node_c;
pub mod node_d;
pub mod node_e;
pub mod node_f;
pub mod node_g;
pub mod registry;

pub use context::{HandlerContext, HandlerError};
pub use registry::{Handler, Registry};
