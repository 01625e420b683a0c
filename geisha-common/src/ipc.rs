//! Wire protocol types
//!
//! Requests and responses travel as one JSON document per line over a
//! persistent TCP connection. Methods, statuses and controls are encoded as
//! their integer discriminants.

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Request methods understood by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Method {
    GetState,
    GetQueue,
    Subscribe,
    PlaySong,
    Enqueue,
    Next,
    Ctrl,
    Sort,
    Shuffle,
    Loop,
    Repeat,
    Remove,
    Clear,
    Shutdown,
}

impl Method {
    /// All methods, indexed by wire value
    pub const ALL: [Method; 14] = [
        Method::GetState,
        Method::GetQueue,
        Method::Subscribe,
        Method::PlaySong,
        Method::Enqueue,
        Method::Next,
        Method::Ctrl,
        Method::Sort,
        Method::Shuffle,
        Method::Loop,
        Method::Repeat,
        Method::Remove,
        Method::Clear,
        Method::Shutdown,
    ];
}

impl TryFrom<u8> for Method {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Method::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| Error::Protocol(format!("unknown method: {value}")))
    }
}

impl From<Method> for u8 {
    fn from(method: Method) -> Self {
        method as u8
    }
}

/// Transport controls carried by `Ctrl`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Control {
    Play,
    Pause,
    Toggle,
    Fwd,
    Bwd,
    Prev,
    Skip,
    Stop,
}

impl Control {
    /// All controls, indexed by wire value
    pub const ALL: [Control; 8] = [
        Control::Play,
        Control::Pause,
        Control::Toggle,
        Control::Fwd,
        Control::Bwd,
        Control::Prev,
        Control::Skip,
        Control::Stop,
    ];
}

impl TryFrom<u8> for Control {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Control::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| Error::Protocol(format!("unknown control code: {value}")))
    }
}

impl From<Control> for u8 {
    fn from(control: Control) -> Self {
        control as u8
    }
}

/// Parses the decimal string form used in `Ctrl` arguments
impl FromStr for Control {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::Protocol(format!("control code is not a number: {s:?}")))?;
        Control::try_from(code)
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    Ok,
    Err,
}

impl TryFrom<u8> for Status {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::Ok),
            1 => Ok(Status::Err),
            other => Err(Error::Protocol(format!("unknown status: {other}"))),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status as u8
    }
}

/// A client request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub args: Vec<String>,
}

impl Request {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(method: Method, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Clients written against nil-able lists send `"args": null`
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The daemon's answer to one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResponseBody>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            result: None,
        }
    }

    pub fn ok_with(body: ResponseBody) -> Self {
        Self {
            status: Status::Ok,
            result: Some(body),
        }
    }

    pub fn err() -> Self {
        Self {
            status: Status::Err,
            result: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// Method-specific response payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    State(StateInfo),
    Queue(QueueInfo),
}

/// `GetState` result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    /// Elapsed seconds of the open handle
    pub elapsed: u64,
    /// Total seconds of the open handle
    pub total: u64,
    /// Id of the playing entry, -1 when idle
    pub current: i64,
    /// Track of the playing entry, empty when idle
    pub path: String,
    pub paused: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub repeat: bool,
    pub shuffled: bool,
}

/// `GetQueue` result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    /// Id of the playing entry, -1 when idle
    pub current: i64,
    pub queue: Vec<QueueEntryInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntryInfo {
    pub id: u64,
    pub song: String,
}
