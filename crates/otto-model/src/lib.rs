// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod partial_json;
pub mod transform;
pub mod wire;
mod event;
mod event_stream;
mod mock;
mod stream;
mod types;

pub use event::AssistantMessageEvent;
pub use event_stream::{EventStream, TerminalEvent};
pub use mock::{ScriptStep, ScriptedStream};
pub use stream::{ModelStream, StreamOptions};
pub use types::*;
