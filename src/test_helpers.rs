//! Scripted modem transport and manual clock for driving the state machines
//! in unit tests.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use embassy_time::Instant;
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use crate::traits::Clock;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct ModemState {
    rx: VecDeque<u8>,
    tx_line: Vec<u8>,
    written: Vec<String>,
    script: VecDeque<(String, Vec<u8>)>,
}

impl ModemState {
    fn command(&mut self, line: String) {
        if let Some((cmd, _)) = self.script.front() {
            if line.starts_with(cmd.as_str()) {
                if let Some((_, reply)) = self.script.pop_front() {
                    self.rx.extend(reply);
                }
            }
        }
        self.written.push(line);
    }
}

/// Transport that answers commands from a script. Each scripted reply is
/// queued for the receiver as soon as a command starting with the scripted
/// prefix has been written; commands that do not match the head of the
/// script get no answer.
#[derive(Clone, Default)]
pub struct MockModem {
    inner: Rc<RefCell<ModemState>>,
}

impl MockModem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, cmd: &str, reply: &str) -> &Self {
        self.reply_bytes(cmd, reply.as_bytes())
    }

    pub fn reply_bytes(&self, cmd: &str, reply: &[u8]) -> &Self {
        self.inner
            .borrow_mut()
            .script
            .push_back((String::from(cmd), reply.to_vec()));
        self
    }

    /// Bytes the modem sends on its own
    pub fn feed(&self, bytes: &str) {
        self.inner.borrow_mut().rx.extend(bytes.as_bytes());
    }

    /// Every command line written so far, without line terminator
    pub fn written(&self) -> Vec<String> {
        self.inner.borrow().written.clone()
    }

    pub fn last_written(&self) -> Option<String> {
        self.inner.borrow().written.last().cloned()
    }

    pub fn clear_written(&self) {
        self.inner.borrow_mut().written.clear();
    }

    /// Scripted replies that have not been triggered yet
    pub fn unused_replies(&self) -> usize {
        self.inner.borrow().script.len()
    }

    pub fn unread(&self) -> usize {
        self.inner.borrow().rx.len()
    }
}

impl embedded_io::ErrorType for MockModem {
    type Error = Infallible;
}

impl embedded_io::Read for MockModem {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut state = self.inner.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match state.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for MockModem {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.inner.borrow().rx.is_empty())
    }
}

impl embedded_io::Write for MockModem {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut state = self.inner.borrow_mut();
        for &b in buf {
            if b == b'\n' {
                let raw = core::mem::take(&mut state.tx_line);
                let line = String::from_utf8_lossy(&raw).trim_end().to_string();
                state.command(line);
            } else {
                state.tx_line.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Clock that only moves when told to
#[derive(Clone, Default)]
pub struct MockClock {
    ms: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.ms.set(self.ms.get() + ms);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.ms.get())
    }
}
