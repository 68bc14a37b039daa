pub mod role_gate;
pub mod session;

pub use role_gate::{authorize, GateError, ADMINS, ANY_ROLE, SUPER_ADMIN_ONLY};
pub use session::{session_context_middleware, RequestContext};
