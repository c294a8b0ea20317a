#![warn(clippy::pedantic)]
// Noisy doc/signature lints that would require annotating most pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Positional format args stay readable with longer expressions
#![allow(clippy::uninlined_format_args)]
// Intentional casts in audio sizing and timestamp math
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod cli;
pub mod config;
pub mod errors;
pub mod relay;
pub mod search;
pub mod state;
pub mod transport;
pub mod tts;
pub mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
