//! Turn orchestration for koboldbot.
//!
//! - `registry`: `ActiveTurns`, at most one running generation per conversation
//! - `recorder`: `ExchangeRecorder`, persists completed turns
//! - `service`: `TurnService`, prompt -> generation -> record

pub mod recorder;
pub mod registry;
pub mod service;
