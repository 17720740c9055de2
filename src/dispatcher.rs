use atat::AtatCmd;
use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady, Write};
use heapless::{String, Vec};

use crate::command::{ERRORS, OK, UNSOLICITED};
use crate::error::Error;
use crate::line_reader::{Line, LineReader};
use crate::parser;

/// Largest serialized command, including `AT` and the line terminator
pub const MAX_COMMAND_LEN: usize = 600;
/// Lines kept as payload of a single command
pub const MAX_RESPONSE_LINES: usize = 8;
/// Largest raw data block captured after a data header
pub const MAX_DATA_LEN: usize = 10 * 1024;

/// Component that issued the command in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Owner {
    Connection,
    Http,
    Telemetry,
    Sleep,
}

/// Terminal lines that finish a command, and how long to wait for them.
#[derive(Debug, Clone, Copy)]
pub struct Expect {
    success: &'static [&'static str],
    failure: &'static [&'static str],
    timeout: Option<Duration>,
    capture: Option<&'static str>,
}

impl Expect {
    /// Plain `OK` terminated command
    pub const fn ok() -> Self {
        Self {
            success: &[OK],
            failure: &[],
            timeout: None,
            capture: None,
        }
    }

    /// Wait for a line starting with one of `prefixes`
    pub const fn lines(prefixes: &'static [&'static str]) -> Self {
        Self {
            success: prefixes,
            failure: &[],
            timeout: None,
            capture: None,
        }
    }

    /// Additional failure patterns, checked before the success patterns.
    /// `ERROR`, `+CME ERROR` and `+CMS ERROR` always fail a command.
    pub const fn or_fail_on(mut self, failure: &'static [&'static str]) -> Self {
        self.failure = failure;
        self
    }

    /// Override the deadline carried by the command type
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// After a line starting with `header` (`+HTTPREAD: <len>`), capture the
    /// next `<len>` bytes verbatim.
    pub const fn capture_after(mut self, header: &'static str) -> Self {
        self.capture = Some(header);
        self
    }

    fn fails(&self, line: &str) -> bool {
        ERRORS
            .iter()
            .chain(self.failure.iter())
            .any(|p| line.starts_with(p))
    }

    fn succeeds(&self, line: &str) -> bool {
        self.success.iter().any(|p| line.starts_with(p))
    }
}

#[derive(Debug)]
pub struct Response {
    pub lines: Vec<Line, MAX_RESPONSE_LINES>,
}

impl Response {
    /// First payload line starting with `prefix`
    pub fn line(&self, prefix: &str) -> Option<&str> {
        self.lines
            .iter()
            .map(|l| l.as_str())
            .find(|l| l.starts_with(prefix))
    }

    /// The line that completed the command
    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(|l| l.as_str())
    }
}

#[derive(Debug)]
pub struct Failure {
    pub error: Error,
    /// Line that matched a failure pattern
    pub reply: Option<Line>,
}

impl Failure {
    fn timeout() -> Self {
        Self {
            error: Error::TransportTimeout,
            reply: None,
        }
    }
}

#[derive(Debug)]
pub struct Completion {
    pub owner: Owner,
    pub result: Result<Response, Failure>,
}

#[derive(Debug)]
pub enum Event {
    Completed(Completion),
    /// Line received while no command was in flight, or a known unsolicited
    /// line received while one was
    Unsolicited(Line),
}

struct PendingCommand {
    text: String<32>,
    owner: Owner,
    /// Nothing was written, see [`Dispatcher::listen`]
    listening: bool,
    expect: Expect,
    sent: Instant,
    deadline: Instant,
    payload: Vec<Line, MAX_RESPONSE_LINES>,
    capture_remaining: usize,
}

impl PendingCommand {
    fn push(&mut self, line: Line) {
        if self.payload.is_full() {
            // Keep the newest lines, the interesting ones precede the result code
            self.payload.remove(0);
        }
        // Cannot fail, a slot was freed above
        let _ = self.payload.push(line);
    }
}

/// Owns the transport and the single command slot.
///
/// Commands are written with [`Dispatcher::send`] and their outcome is
/// collected by [`Dispatcher::poll`], which is called once per tick and never
/// blocks. At most one command is in flight; a second `send` is rejected with
/// [`Error::Busy`].
pub struct Dispatcher<T> {
    io: T,
    reader: LineReader,
    pending: Option<PendingCommand>,
    data: Vec<u8, MAX_DATA_LEN>,
}

impl<T> Dispatcher<T>
where
    T: Read + Write + ReadReady,
{
    pub fn new(io: T) -> Self {
        Self {
            io,
            reader: LineReader::new(),
            pending: None,
            data: Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// Raw bytes captured by the last command sent with
    /// [`Expect::capture_after`]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serialize `cmd` and write it to the module.
    ///
    /// Input that arrived before the command is discarded, so late replies to
    /// an abandoned command cannot complete this one.
    pub fn send<A: AtatCmd>(
        &mut self,
        cmd: &A,
        expect: Expect,
        owner: Owner,
        now: Instant,
    ) -> Result<(), Error> {
        if self.pending.is_some() {
            return Err(Error::Busy);
        }
        if A::MAX_LEN > MAX_COMMAND_LEN {
            return Err(Error::Overflow);
        }

        let mut buf = [0u8; MAX_COMMAND_LEN];
        let len = cmd.write(&mut buf);

        let stale = self.reader.discard(&mut self.io)?;
        if stale > 0 {
            trace!("Discarded {} stale bytes", stale);
        }

        self.io.write_all(&buf[..len]).map_err(|_| Error::Io)?;
        self.io.flush().map_err(|_| Error::Io)?;

        let text = command_text(&buf[..len]);
        debug!("<-- {}", text.as_str());

        let timeout = expect
            .timeout
            .unwrap_or_else(|| Duration::from_millis(A::MAX_TIMEOUT_MS as u64));
        if expect.capture.is_some() {
            self.data.clear();
        }
        self.pending = Some(PendingCommand {
            text,
            owner,
            listening: false,
            expect,
            sent: now,
            deadline: now + timeout,
            payload: Vec::new(),
            capture_remaining: 0,
        });
        Ok(())
    }

    /// Wait for lines without writing anything, for notifications that follow
    /// an already acknowledged command.
    pub fn listen(
        &mut self,
        what: &str,
        expect: Expect,
        owner: Owner,
        timeout: Duration,
        now: Instant,
    ) -> Result<(), Error> {
        if self.pending.is_some() {
            return Err(Error::Busy);
        }
        debug!("Waiting for {}", what);
        let mut text = String::new();
        push_truncated(&mut text, what);
        self.pending = Some(PendingCommand {
            text,
            owner,
            listening: true,
            expect,
            sent: now,
            deadline: now + timeout,
            payload: Vec::new(),
            capture_remaining: 0,
        });
        Ok(())
    }

    /// Stop waiting for a notification started with [`Dispatcher::listen`].
    /// A written command is never abandoned, its reply would be taken for
    /// the next one.
    pub fn cancel_listen(&mut self) -> bool {
        if self.pending.as_ref().is_some_and(|p| p.listening) {
            if let Some(p) = self.pending.take() {
                debug!("Stopped waiting for {}", p.text.as_str());
            }
            true
        } else {
            false
        }
    }

    /// Drain available input and report at most one event.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Event>, Error> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(self.reader.read_line(&mut self.io)?.map(Event::Unsolicited));
        };

        loop {
            if pending.capture_remaining > 0 {
                let data = &mut self.data;
                let mut dropped = 0usize;
                self.reader
                    .read_raw(&mut self.io, &mut pending.capture_remaining, |b| {
                        // The module pads short bodies with NUL bytes
                        let b = if b == 0 { b' ' } else { b };
                        if data.push(b).is_err() {
                            dropped += 1;
                        }
                    })?;
                if dropped > 0 {
                    warn!("Data exceeds {} bytes, dropped {}", MAX_DATA_LEN, dropped);
                }
                if pending.capture_remaining > 0 {
                    break;
                }
            }

            let Some(line) = self.reader.read_line(&mut self.io)? else {
                break;
            };

            if UNSOLICITED.iter().any(|p| line.starts_with(p)) {
                return Ok(Some(Event::Unsolicited(line)));
            }

            if pending.expect.fails(&line) {
                error!(
                    "{} failed with {} after {} ms",
                    pending.text.as_str(),
                    line.as_str(),
                    now.saturating_duration_since(pending.sent).as_millis()
                );
                return Ok(Some(self.complete(Err(Failure {
                    error: Error::ModemRejected,
                    reply: Some(line),
                }))));
            }

            if pending.expect.succeeds(&line) {
                pending.push(line);
                info!(
                    "{} done in {} ms",
                    pending.text.as_str(),
                    now.saturating_duration_since(pending.sent).as_millis()
                );
                return Ok(Some(self.complete(Ok(()))));
            }

            if let Some(header) = pending.expect.capture {
                if line.starts_with(header) {
                    match parser::data_header(&line) {
                        Ok(len) => pending.capture_remaining = len,
                        Err(e) => {
                            return Ok(Some(self.complete(Err(Failure {
                                error: e,
                                reply: Some(line),
                            }))));
                        }
                    }
                }
            }

            pending.push(line);
        }

        if now >= pending.deadline {
            error!(
                "{} timed out after {} ms",
                pending.text.as_str(),
                now.saturating_duration_since(pending.sent).as_millis()
            );
            return Ok(Some(self.complete(Err(Failure::timeout()))));
        }

        Ok(None)
    }

    fn complete(&mut self, result: Result<(), Failure>) -> Event {
        // Only called with a command in flight
        let (owner, lines) = match self.pending.take() {
            Some(p) => (p.owner, p.payload),
            None => (Owner::Connection, Vec::new()),
        };
        Event::Completed(Completion {
            owner,
            result: result.map(|()| Response { lines }),
        })
    }
}

fn push_truncated<const N: usize>(out: &mut String<N>, s: &str) {
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
}

fn command_text(raw: &[u8]) -> String<32> {
    let mut text = String::new();
    let s = core::str::from_utf8(raw).unwrap_or("<binary>");
    push_truncated(&mut text, s.trim_end());
    text
}
