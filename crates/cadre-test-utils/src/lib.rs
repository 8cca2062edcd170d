pub mod fixtures;
mod scripted;

pub use scripted::{RecordedRoute, ScriptedCapability, ScriptedDecider, ScriptedLlm};
