// Copyright © 2026 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Feed a one-shot byte stream into the container parser.
// Author: Lukas Bower

//! Push delivery: bytes arrive once, in order, in chunks of whatever size
//! the transport happens to produce. The adapter hands the parser exactly
//! as many bytes as it currently wants and runs its transitions whenever
//! the need counter reaches zero, which can happen several times inside a
//! single chunk.

use nboot_core::{JobSet, Session, SessionError};

/// Terminal stream status.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    /// The stream ended before the container did.
    #[error("stream ended mid-container")]
    Incomplete,
    /// The container was walked to the end with jobs still outstanding.
    /// The caller re-initiates transmission with a fresh session.
    #[error("stream complete but jobs unsatisfied: {0:?}")]
    JobsUnsatisfied(JobSet),
}

/// Push adapter over one parse session.
///
/// A new top-level transfer means a new session: constructing one resets
/// all parse state.
pub struct PushAdapter<'s, 'a, 'd: 'a> {
    session: &'s mut Session<'a, 'd>,
}

impl<'s, 'a, 'd: 'a> PushAdapter<'s, 'a, 'd> {
    /// Wrap a freshly started session.
    #[must_use]
    pub fn new(session: &'s mut Session<'a, 'd>) -> Self {
        Self { session }
    }

    /// Deliver the next chunk of the stream.
    ///
    /// Data past the end of the container is dropped, as the transport may
    /// round transfers up. A structural fault aborts the session and is
    /// returned; delivery must not be retried on the same session.
    pub fn deliver(&mut self, mut chunk: &[u8]) -> Result<(), SessionError> {
        self.session.step()?;
        while !chunk.is_empty() && !self.session.is_done() {
            let n = (self.session.needed() as usize).min(chunk.len());
            if let Some(target) = self.session.target_mut() {
                target[..n].copy_from_slice(&chunk[..n]);
            }
            self.session.commit(n as u32);
            chunk = &chunk[n..];
            self.session.step()?;
        }
        Ok(())
    }

    /// Whether the container has been fully walked.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.session.is_done()
    }

    /// Declare the stream over and report the terminal status.
    pub fn finish(self) -> Result<(), StreamError> {
        if !self.session.is_done() {
            return Err(StreamError::Incomplete);
        }
        let left = self.session.jobs_remaining();
        if left.is_empty() {
            Ok(())
        } else {
            Err(StreamError::JobsUnsatisfied(left))
        }
    }
}
