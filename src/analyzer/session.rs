//! Paginated report reads
//!
//! The report is rendered in full on the first read and then handed out in
//! caller-sized chunks. The buffer is released as soon as the last byte has
//! been delivered. A failed render ends the session.

use std::fmt;
use std::io;
use std::sync::Arc;

use super::Shared;
use crate::report::ReportBuffer;
use crate::{LkmaError, Result};

enum SessionState {
    Pending,
    Draining { buffer: ReportBuffer, position: usize },
    Done,
}

/// One reader's view of a report.
pub struct ReportSession {
    shared: Arc<Shared>,
    state: SessionState,
}

impl ReportSession {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            state: SessionState::Pending,
        }
    }

    /// Copy the next chunk into `out`; `Ok(0)` once the report is drained.
    ///
    /// An empty `out` returns 0 without rendering or advancing.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        if let SessionState::Pending = self.state {
            match self.shared.generate() {
                Ok(buffer) => {
                    self.state = SessionState::Draining {
                        buffer,
                        position: 0,
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "report generation failed");
                    self.state = SessionState::Done;
                    return Err(err);
                }
            }
        }

        let copied = match &mut self.state {
            SessionState::Draining { buffer, position } => {
                let rest = &buffer.as_bytes()[*position..];
                let n = rest.len().min(out.len());
                out[..n].copy_from_slice(&rest[..n]);
                *position += n;
                n
            }
            SessionState::Pending | SessionState::Done => 0,
        };

        if copied == 0 {
            self.state = SessionState::Done;
        }
        Ok(copied)
    }

    /// True once the report has been fully delivered or failed.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Done)
    }
}

impl io::Read for ReportSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ReportSession::read(self, buf).map_err(|err| match err {
            LkmaError::OutOfMemory { .. } => io::Error::new(io::ErrorKind::OutOfMemory, err),
            LkmaError::InvalidInput(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            LkmaError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
            LkmaError::Corrupt { .. } => io::Error::new(io::ErrorKind::InvalidData, err),
        })
    }
}

impl fmt::Debug for ReportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            SessionState::Pending => "pending".to_string(),
            SessionState::Draining { buffer, position } => {
                format!("draining {}/{}", position, buffer.size())
            }
            SessionState::Done => "done".to_string(),
        };
        f.debug_struct("ReportSession").field("state", &state).finish()
    }
}
