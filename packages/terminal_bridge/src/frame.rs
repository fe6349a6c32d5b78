//! Inbound frame classification.
//!
//! Every inbound payload resolves to exactly one [`InboundFrame`]: literal
//! terminal input or a resize request. Two wire protocols produce it:
//!
//! - `legacy`: a payload that parses as a JSON object of unsigned 16-bit
//!   integers is a resize (`cols`/`rows`, missing keys read as 0); anything
//!   else is input. Input that happens to look like `{"cols":1,"rows":2}` is
//!   taken as a resize.
//! - `tagged`: `{"type":"Resize","cols":N,"rows":M}` and
//!   `{"type":"Input","data":"..."}` envelopes; payloads that are not an
//!   envelope are input.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::resize_queue::TerminalSize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameProtocol {
    #[default]
    Legacy,
    Tagged,
}

/// Resize request as sent by the browser terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub cols: u16,
    pub rows: u16,
}

impl From<ControlMessage> for TerminalSize {
    fn from(msg: ControlMessage) -> Self {
        TerminalSize {
            width: msg.cols,
            height: msg.rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Input(Vec<u8>),
    Resize(TerminalSize),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TaggedFrame {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

impl FrameProtocol {
    pub fn decode(self, payload: Vec<u8>) -> InboundFrame {
        match self {
            FrameProtocol::Legacy => decode_legacy(payload),
            FrameProtocol::Tagged => decode_tagged(payload),
        }
    }
}

fn decode_legacy(payload: Vec<u8>) -> InboundFrame {
    match serde_json::from_slice::<HashMap<String, u16>>(&payload) {
        Ok(fields) => {
            let msg = ControlMessage {
                cols: fields.get("cols").copied().unwrap_or(0),
                rows: fields.get("rows").copied().unwrap_or(0),
            };
            InboundFrame::Resize(msg.into())
        }
        Err(_) => InboundFrame::Input(payload),
    }
}

fn decode_tagged(payload: Vec<u8>) -> InboundFrame {
    match serde_json::from_slice::<TaggedFrame>(&payload) {
        Ok(TaggedFrame::Resize { cols, rows }) => {
            InboundFrame::Resize(ControlMessage { cols, rows }.into())
        }
        Ok(TaggedFrame::Input { data }) => InboundFrame::Input(data.into_bytes()),
        Err(_) => InboundFrame::Input(payload),
    }
}
