//! Decision-oracle boundary for the Windlass plan-execution engine.
//!
//! The oracle decides *what* a plan, a step's arguments, an evaluation, or
//! a reflection should contain; this crate owns the seam: the transport
//! trait, the typed tool-invocation wire codec, schema validation of every
//! payload, and the bounded corrective re-prompt session that recovers
//! malformed responses before they reach the engine.

/// Typed tool-invocation wire codec.
pub mod codec;
/// Scripted oracle for tests.
pub mod mock;
/// Oracle transport trait and prompt type.
pub mod oracle;
/// Prompt builders for each request kind.
pub mod prompts;
/// Payload schemas and invariant validation.
pub mod schema;
/// Bounded corrective re-prompt session.
pub mod session;

pub use codec::{CodecError, Invocation, decode_invocation, encode_invocation};
pub use mock::MockOracle;
pub use oracle::{DecisionOracle, OraclePrompt};
pub use schema::{ArgumentSet, SchemaError};
pub use session::OracleSession;
