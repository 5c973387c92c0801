use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::TransferError;

/// A request a client can issue over a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Upload,
    List,
    Download,
    Exit,
}

impl Command {
    pub const ALL: [Command; 4] = [Command::Upload, Command::List, Command::Download, Command::Exit];

    /// Token sent on the wire for this command
    pub fn token(self) -> &'static str {
        match self {
            Command::Upload => "1",
            Command::List => "2",
            Command::Download => "3",
            Command::Exit => "4",
        }
    }

    /// Label shown in the client menu
    pub fn label(self) -> &'static str {
        match self {
            Command::Upload => "Upload a file",
            Command::List => "List the files",
            Command::Download => "Download a file",
            Command::Exit => "Exit",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Upload => write!(f, "upload"),
            Command::List => write!(f, "list"),
            Command::Download => write!(f, "download"),
            Command::Exit => write!(f, "exit"),
        }
    }
}

impl FromStr for Command {
    type Err = TransferError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "1" => Ok(Command::Upload),
            "2" => Ok(Command::List),
            "3" => Ok(Command::Download),
            "4" => Ok(Command::Exit),
            other => Err(TransferError::UnknownCommand(other.to_string())),
        }
    }
}

/// A validated name of a file inside a store directory.
///
/// Names are joined directly to the store root, so anything that could
/// escape it or break the line/tab framing is rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Filename(String);

impl Filename {
    pub fn new(name: impl Into<String>) -> Result<Self, TransferError> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name == "." || name == ".." {
            Some("name refers to a directory")
        } else if name.contains(['/', '\\']) {
            Some("name contains a path separator")
        } else if name.contains(['\t', '\n', '\r']) {
            Some("name contains a protocol delimiter")
        } else if name.contains('\0') {
            Some("name contains a NUL byte")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(TransferError::InvalidFilename { name, reason }),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Filename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Filename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Filename {
    type Error = TransferError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl FromStr for Filename {
    type Err = TransferError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::new(name)
    }
}

impl From<Filename> for String {
    fn from(name: Filename) -> String {
        name.0
    }
}

/// Names in a store directory, in enumeration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub names: Vec<String>,
}

impl FileListing {
    pub const SEPARATOR: char = '\t';

    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Tab-joined wire form, without the terminating newline
    pub fn encode(&self) -> String {
        self.names.join(&Self::SEPARATOR.to_string())
    }

    /// Parse a listing line. Empty tokens are dropped, so an empty line is
    /// an empty directory rather than one unnamed file.
    pub fn decode(line: &str) -> Self {
        let names = line
            .split(Self::SEPARATOR)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
