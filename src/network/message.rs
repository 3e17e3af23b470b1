use serde::{Deserialize, Serialize};

use crate::blockchain::WireBlock;
use crate::uint256::FixedUint256;

/// A request line, tagged by its `command` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Request {
    GetBlockCount,
    GetBlockHash { blockheight: u64 },
    GetBlock { blockhash: FixedUint256 },
}

impl Request {
    pub const COMMANDS: [&'static str; 3] = ["getblockcount", "getblockhash", "getblock"];

    pub fn command(&self) -> &'static str {
        match self {
            Request::GetBlockCount => "getblockcount",
            Request::GetBlockHash { .. } => "getblockhash",
            Request::GetBlock { .. } => "getblock",
        }
    }

    /// Parse a request line, failing closed. The error is the response to
    /// send back.
    pub fn parse(line: &str) -> Result<Self, ErrorMessage> {
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| ErrorMessage::new(format!("Malformed request: {e}")))?;
        let command = match value.get("command").and_then(|c| c.as_str()) {
            Some(command) => command.to_string(),
            None => return Err(ErrorMessage::new("Malformed request: missing command")),
        };
        if !Self::COMMANDS.contains(&command.as_str()) {
            return Err(ErrorMessage::new(format!("Unrecognized command {command}")));
        }
        serde_json::from_value(value)
            .map_err(|e| ErrorMessage::new(format!("Malformed {command} request: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
        }
    }
}

/// A response line. The shape alone identifies the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Tip height, `-1` for an empty chain.
    BlockCount(i64),
    BlockHash(FixedUint256),
    Error(ErrorMessage),
    Block(WireBlock),
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(ErrorMessage::new(message))
    }
}

impl From<ErrorMessage> for Response {
    fn from(err: ErrorMessage) -> Self {
        Response::Error(err)
    }
}
