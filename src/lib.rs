#![warn(clippy::pedantic)]
// Noisy doc/signature lints — would require annotating hundreds of pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference — keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Intentional casts throughout timestamp/size/duration arithmetic
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
// Complex job-dispatch/intake functions are naturally long; splitting would be artificial
#![allow(clippy::too_many_lines)]
// Module structure — companion::CompanionClient, transport::RpcTransport, etc. by design
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod commands;
pub mod companion;
pub mod composer;
pub mod config;
pub mod envelope;
pub(crate) mod errors;
pub mod intent;
pub mod orchestrator;
pub mod scheduler;
pub mod transport;
pub(crate) mod utils;
pub mod voice;

pub use errors::BridgeError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
