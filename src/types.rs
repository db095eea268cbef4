use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A complete server reply: the three digit code and every line of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub code: u16,
    /// Raw reply lines without their line terminators, code prefixes included
    pub lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// 1xx
    pub fn is_preliminary(&self) -> bool {
        self.code / 100 == 1
    }

    /// 2xx
    pub fn is_completion(&self) -> bool {
        self.code / 100 == 2
    }

    /// 3xx
    pub fn is_intermediate(&self) -> bool {
        self.code / 100 == 3
    }

    /// 4xx or 5xx
    pub fn is_negative(&self) -> bool {
        matches!(self.code / 100, 4 | 5)
    }

    /// Text of the final line with the code and separator stripped
    pub fn text(&self) -> &str {
        self.lines
            .last()
            .map(|line| line.get(4..).unwrap_or("").trim_end())
            .unwrap_or("")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

/// Representation type announced with `TYPE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

impl TransferType {
    pub(crate) fn code(self) -> &'static str {
        match self {
            TransferType::Ascii => "A",
            TransferType::Binary => "I",
        }
    }
}

/// Who opens the listening socket for data connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// The client listens and announces itself with PORT/EPRT
    #[default]
    Active,
    /// The server listens and announces itself in its PASV reply
    Passive,
}

/// Runtime options of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOption {
    /// Connect to the address advertised in PASV replies (`true`) or to the
    /// control connection's peer address with the advertised port (`false`)
    UsePasvAddress(bool),
    /// Bound on every network wait
    Timeout(Duration),
}

/// Metadata of one entry of a LIST response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub name: String,
    pub path: PathBuf,
    pub size: Option<u64>,
    pub file_type: FileType,
    pub permissions: Option<String>,
    pub link_target: Option<String>,
    /// The listing line this entry was parsed from
    pub raw: String,
}

/// Type of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    Unknown,
}
