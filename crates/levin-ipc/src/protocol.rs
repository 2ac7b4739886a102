//! Wire codec for control messages.

use std::collections::BTreeMap;

use crate::IpcError;

/// A flat request or reply. `BTreeMap` keeps serialisation order stable,
/// which the tests and the `list` reply's indexed keys rely on.
pub type Message = BTreeMap<String, String>;

/// Serialise a message to its wire form, newline included.
#[must_use]
pub fn encode(message: &Message) -> String {
    let mut line =
        serde_json::to_string(message).expect("string maps always serialise");
    line.push('\n');
    line
}

/// Parse one received line into a message.
///
/// # Errors
///
/// Returns [`IpcError::Malformed`] when the line is not a flat JSON object
/// of string pairs.
pub fn decode(line: &str) -> Result<Message, IpcError> {
    Ok(serde_json::from_str(line)?)
}
