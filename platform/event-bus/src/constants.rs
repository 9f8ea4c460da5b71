//! Stream names and tunable defaults shared by the publisher, worker, and
//! idempotency gate. Overridable at the call site; the values here are the
//! defaults an implementer gets by not overriding anything (see `Config`).

pub const STREAM_MAIN: &str = "metismedia:events";
pub const STREAM_DLQ: &str = "metismedia:events:dlq";
pub const GROUP_NAME: &str = "metismedia-workers";

pub const MAX_RETRIES: u32 = 5;
pub const IDEM_TTL_SECONDS: i64 = 86_400;

pub const BLOCK_MS: usize = 1000;
pub const COUNT: usize = 10;

pub const BACKOFF_BASE_SECONDS: f64 = 0.5;
pub const BACKOFF_JITTER_MAX: f64 = 0.2;

pub const EVENT_BRIEF_FINALIZED: &str = "node_a.brief_finalized";
pub const EVENT_NODE_B_INPUT: &str = "node_b.input";
pub const EVENT_DIRECTIVE_EMITTED: &str = "node_b.directive_emitted";
pub const EVENT_DISCOVERY_NEEDED: &str = "node_c.discovery_needed";
pub const EVENT_NODE_C_INPUT: &str = "node_c.input";
pub const EVENT_NODE_D_INPUT: &str = "node_d.input";
pub const EVENT_NODE_E_INPUT: &str = "node_e.input";
pub const EVENT_NODE_F_INPUT: &str = "node_f.input";
pub const EVENT_NODE_G_INPUT: &str = "node_g.input";
