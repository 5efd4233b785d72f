// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::PosixErrno;
use std::io;
use thiserror::Error;

/// Errors surfaced by the client I/O engine.
///
/// Transport level failures (`Protocol`, `IO`) may be retried by the call
/// primitive against another endpoint. Everything else is returned to the
/// caller as is.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("{0}")]
    Common(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("posix error {errno}: {msg}")]
    Posix { errno: PosixErrno, msg: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("address of uuid not found: {0}")]
    AddressNotFound(String),

    #[error("uuid iterator list is empty: {0}")]
    UuidIteratorListIsEmpty(String),

    #[error("uuid not in xlocset: {0}")]
    UuidNotInXLocSet(String),

    #[error("io error: {0}")]
    IO(#[from] io::Error),

    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FsError {
    pub fn common(msg: impl Into<String>) -> Self {
        FsError::Common(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        FsError::Config(msg.into())
    }

    pub fn posix(errno: PosixErrno, msg: impl Into<String>) -> Self {
        FsError::Posix {
            errno,
            msg: msg.into(),
        }
    }

    pub fn eio(msg: impl Into<String>) -> Self {
        Self::posix(PosixErrno::EIO, msg)
    }

    pub fn eagain(msg: impl Into<String>) -> Self {
        Self::posix(PosixErrno::EAGAIN, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        FsError::Protocol(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        FsError::Internal(msg.into())
    }

    pub fn errno(&self) -> Option<PosixErrno> {
        match self {
            FsError::Posix { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    pub fn is_errno(&self, errno: PosixErrno) -> bool {
        self.errno() == Some(errno)
    }

    // Only failures of the transport are worth another endpoint.
    pub fn should_retry(&self) -> bool {
        matches!(self, FsError::Protocol(_) | FsError::IO(_))
    }
}
