// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Please report this as bug to upstream
    Bug,
    /// Invalid argument
    InvalidArgument,
    /// Config entry does not match the declarative schema
    InvalidSchema,
    /// Membership reference to an undeclared interface
    DanglingReference,
    /// Two MAC-owning devices report the identical hardware address
    DuplicateMac,
    /// No renderer in the priority list is available on this host
    RendererNotFound,
    /// Malformed base64/gzip payload or lease block
    DecodeFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind_str = match self {
            Self::Bug => "bug",
            Self::InvalidArgument => "invalid-argument",
            Self::InvalidSchema => "invalid-schema",
            Self::DanglingReference => "dangling-reference",
            Self::DuplicateMac => "duplicate-mac",
            Self::RendererNotFound => "renderer-not-found",
            Self::DecodeFailure => "decode-failure",
        };
        write!(f, "{kind_str}")
    }
}

// Try not implement From for NetfabError here unless you are sure this
// error should always convert to certain type of ErrorKind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct NetfabError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl std::fmt::Display for NetfabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.msg)
    }
}

impl NetfabError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self { kind, msg }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }
}

impl std::error::Error for NetfabError {}

impl From<std::io::Error> for NetfabError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Bug, format!("std::io::Error: {e}"))
    }
}

impl From<serde_json::Error> for NetfabError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Bug, format!("serde_json::Error: {e}"))
    }
}

impl From<serde_yaml::Error> for NetfabError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::new(ErrorKind::InvalidSchema, format!("serde_yaml::Error: {e}"))
    }
}

impl From<std::net::AddrParseError> for NetfabError {
    fn from(e: std::net::AddrParseError) -> Self {
        Self::new(
            ErrorKind::InvalidArgument,
            format!("Invalid IP address: {e}"),
        )
    }
}
