use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::command::bearer::types::BearerState;
use crate::command::bearer::{GetBearerStatus, BEARER_PROFILE};
use crate::command::http::types::{HttpMethod, HttpSsl};
use crate::command::http::urc::HTTP_ACTION;
use crate::command::http::{
    HttpAction, InitHttp, ReadHttpData, SetHttpBearerProfile, SetHttpSsl, SetHttpUrl,
    TerminateHttp, MAX_URL_LEN,
};
use crate::dispatcher::{Dispatcher, Expect, Failure, Owner, Response, MAX_DATA_LEN};
use crate::error::Error;
use crate::parser;

/// Where a request is in the HTTP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpState {
    /// `AT+SAPBR=2,1`, the bearer must still be open
    ConfirmBearer,
    /// `AT+HTTPINIT`
    Init,
    /// `AT+HTTPPARA="CID",1`
    SetBearerProfile,
    /// `AT+HTTPSSL`
    SetSsl,
    /// `AT+HTTPPARA="URL"`
    SetUrl,
    /// `AT+HTTPACTION=0`, acknowledged with `OK`
    Action,
    /// Waiting for the `+HTTPACTION:` notification
    AwaitResult,
    /// `AT+HTTPREAD`
    Read,
    /// Response received, terminating the session
    Done,
    /// Request failed, terminating the session if one was opened
    Failed,
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Finished {
    /// The body is the first `body_len` bytes of the dispatcher data buffer
    Done { status: u16, body_len: usize },
    Failed(Error),
}

#[derive(Debug)]
pub struct HttpRequest {
    url: String<MAX_URL_LEN>,
    ssl: bool,
    state: HttpState,
    /// `AT+HTTPINIT` succeeded, `AT+HTTPTERM` is owed
    session: bool,
    /// `AT+HTTPINIT` was rejected and a stale session is being closed
    reinit: bool,
    reinit_done: bool,
    /// `AT+HTTPTERM` is in flight
    terminating: bool,
    status: u16,
    len: usize,
    body_len: usize,
    error: Error,
}

impl HttpRequest {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> HttpState {
        self.state
    }
}

/// Runs a single HTTP GET as a chain of commands on the [`Dispatcher`].
pub struct HttpEngine {
    request: Option<HttpRequest>,
    timeout: Duration,
}

impl HttpEngine {
    /// `timeout` bounds the wait for the `+HTTPACTION:` notification
    pub fn new(timeout: Duration) -> Self {
        Self {
            request: None,
            timeout,
        }
    }

    pub fn is_active(&self) -> bool {
        self.request.is_some()
    }

    pub fn request(&self) -> Option<&HttpRequest> {
        self.request.as_ref()
    }

    /// Accept a new request. Nothing is sent until [`HttpEngine::issue`].
    pub fn start(&mut self, url: &str) -> Result<(), Error> {
        if self.request.is_some() {
            return Err(Error::Busy);
        }
        let url = url.trim();
        // The URL is sent inside double quotes
        if url.is_empty() || url.contains('"') {
            return Err(Error::InvalidUrl);
        }
        let url: String<MAX_URL_LEN> = String::try_from(url).map_err(|_| Error::InvalidUrl)?;
        let ssl = url
            .get(..6)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https:"));

        info!("HTTP GET {}", url.as_str());
        self.request = Some(HttpRequest {
            url,
            ssl,
            state: HttpState::ConfirmBearer,
            session: false,
            reinit: false,
            reinit_done: false,
            terminating: false,
            status: 0,
            len: 0,
            body_len: 0,
            error: Error::NotReady,
        });
        Ok(())
    }

    /// Fail the active request, e.g. because the connection dropped.
    pub fn abort(&mut self, error: Error) -> Option<Finished> {
        let req = self.request.as_mut()?;
        if matches!(req.state, HttpState::Done | HttpState::Failed) {
            return None;
        }
        warn!("Aborting HTTP request: {:?}", error);
        self.fail(error)
    }

    /// Send the command for the current state. A command that cannot be
    /// written fails the request.
    pub fn issue<T>(&mut self, at: &mut Dispatcher<T>, now: Instant) -> Option<Finished>
    where
        T: Read + Write + ReadReady,
    {
        let e = self.send(at, now).err()?;
        match self.request.as_ref()?.state {
            // Nothing left to clean up if HTTPTERM cannot be written
            HttpState::Done | HttpState::Failed => self.finish(),
            _ => self.fail(e),
        }
    }

    fn send<T>(&mut self, at: &mut Dispatcher<T>, now: Instant) -> Result<(), Error>
    where
        T: Read + Write + ReadReady,
    {
        let Some(req) = self.request.as_mut() else {
            return Ok(());
        };
        let owner = Owner::Http;
        let expect = Expect::ok();

        match req.state {
            HttpState::ConfirmBearer => at.send(
                &GetBearerStatus {
                    cid: BEARER_PROFILE,
                },
                expect,
                owner,
                now,
            ),
            HttpState::Init if req.reinit => at.send(&TerminateHttp, expect, owner, now),
            HttpState::Init => at.send(&InitHttp, expect, owner, now),
            HttpState::SetBearerProfile => at.send(
                &SetHttpBearerProfile {
                    cid: BEARER_PROFILE,
                },
                expect,
                owner,
                now,
            ),
            HttpState::SetSsl => at.send(
                &SetHttpSsl {
                    enabled: if req.ssl {
                        HttpSsl::Enabled
                    } else {
                        HttpSsl::Disabled
                    },
                },
                expect,
                owner,
                now,
            ),
            HttpState::SetUrl => at.send(&SetHttpUrl { url: &req.url }, expect, owner, now),
            HttpState::Action => at.send(
                &HttpAction {
                    method: HttpMethod::Get,
                },
                expect,
                owner,
                now,
            ),
            HttpState::AwaitResult => at.listen(
                HTTP_ACTION,
                Expect::lines(&[HTTP_ACTION]),
                owner,
                self.timeout,
                now,
            ),
            HttpState::Read => {
                let len = req.len.min(MAX_DATA_LEN);
                at.send(
                    &ReadHttpData {
                        start: 0,
                        len: len as u32,
                    },
                    expect.capture_after("+HTTPREAD:"),
                    owner,
                    now,
                )
            }
            HttpState::Done | HttpState::Failed => {
                at.send(&TerminateHttp, expect, owner, now)?;
                req.terminating = true;
                Ok(())
            }
        }
    }

    /// Advance on the outcome of the command sent by [`HttpEngine::issue`].
    /// `data` is the dispatcher data buffer.
    pub fn on_complete(
        &mut self,
        result: Result<Response, Failure>,
        data: &[u8],
    ) -> Option<Finished> {
        let req = self.request.as_mut()?;

        let resp = match (req.state, result) {
            (HttpState::Done | HttpState::Failed, result) if req.terminating => {
                if let Err(f) = result {
                    warn!("HTTP session not terminated cleanly: {:?}", f.error);
                }
                return self.finish();
            }
            // Command that was in flight when the request was aborted
            (HttpState::Done | HttpState::Failed, _) => return None,
            (HttpState::Init, Err(_)) if !req.reinit_done => {
                // A session left open by an earlier run rejects HTTPINIT
                warn!("HTTPINIT rejected, terminating stale session");
                req.reinit = true;
                return None;
            }
            (HttpState::Init, _) if req.reinit => {
                req.reinit = false;
                req.reinit_done = true;
                return None;
            }
            (_, Err(f)) => return self.fail(f.error),
            (_, Ok(resp)) => resp,
        };

        let next = match req.state {
            HttpState::ConfirmBearer => match parser::bearer_state(&resp.lines) {
                Ok(BearerState::Connected) => HttpState::Init,
                Ok(state) => {
                    warn!("Bearer is {:?}", state);
                    return self.fail(Error::BearerLost);
                }
                Err(e) => return self.fail(e),
            },
            HttpState::Init => {
                req.session = true;
                HttpState::SetBearerProfile
            }
            HttpState::SetBearerProfile => HttpState::SetSsl,
            HttpState::SetSsl => HttpState::SetUrl,
            HttpState::SetUrl => HttpState::Action,
            HttpState::Action => HttpState::AwaitResult,
            HttpState::AwaitResult => {
                match resp.line(HTTP_ACTION).map(parser::http_action) {
                    Some(Ok(outcome)) => {
                        info!(
                            "HTTP status {}, {} bytes",
                            outcome.status, outcome.len
                        );
                        req.status = outcome.status;
                        req.len = outcome.len;
                        if outcome.len == 0 {
                            HttpState::Done
                        } else {
                            if outcome.len > MAX_DATA_LEN {
                                warn!(
                                    "Response of {} bytes truncated to {}",
                                    outcome.len, MAX_DATA_LEN
                                );
                            }
                            HttpState::Read
                        }
                    }
                    Some(Err(e)) => return self.fail(e),
                    None => return self.fail(Error::MalformedReply),
                }
            }
            HttpState::Read => {
                if resp.line("+HTTPREAD:").is_none() {
                    return self.fail(Error::MalformedReply);
                }
                req.body_len = match core::str::from_utf8(data) {
                    Ok(_) => data.len(),
                    // Truncation can split the last character
                    Err(e) if req.len > data.len() && e.error_len().is_none() => {
                        e.valid_up_to()
                    }
                    Err(_) => {
                        warn!("Response body is not valid UTF-8");
                        return self.fail(Error::MalformedReply);
                    }
                };
                HttpState::Done
            }
            HttpState::Done | HttpState::Failed => return self.finish(),
        };

        trace!("HTTP state: {:?} -> {:?}", req.state, next);
        req.state = next;
        None
    }

    fn fail(&mut self, error: Error) -> Option<Finished> {
        let req = self.request.as_mut()?;
        warn!("HTTP request failed in {:?}: {:?}", req.state, error);
        req.state = HttpState::Failed;
        req.error = error;
        if req.session {
            // HTTPTERM first, the callback fires when it completes
            None
        } else {
            self.finish()
        }
    }

    fn finish(&mut self) -> Option<Finished> {
        let req = self.request.take()?;
        Some(match req.state {
            HttpState::Done => Finished::Done {
                status: req.status,
                body_len: req.body_len,
            },
            _ => Finished::Failed(req.error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Event;
    use crate::test_helpers::{init_logger, MockModem};

    const OK: &str = "\r\nOK\r\n";
    const BEARER_UP: &str = "\r\n+SAPBR: 1,1,\"10.0.0.7\"\r\n\r\nOK\r\n";

    struct Harness {
        modem: MockModem,
        at: Dispatcher<MockModem>,
        http: HttpEngine,
        now: u64,
        finished: Option<Finished>,
    }

    impl Harness {
        fn new() -> Self {
            init_logger();
            let modem = MockModem::new();
            Self {
                at: Dispatcher::new(modem.clone()),
                modem,
                http: HttpEngine::new(Duration::from_secs(30)),
                now: 0,
                finished: None,
            }
        }

        fn tick(&mut self) {
            let now = Instant::from_millis(self.now);
            if let Ok(Some(Event::Completed(c))) = self.at.poll(now) {
                if let Some(f) = self.http.on_complete(c.result, self.at.data()) {
                    assert!(self.finished.replace(f).is_none());
                }
            }
            if self.at.is_idle() && self.http.is_active() {
                if let Some(f) = self.http.issue(&mut self.at, now) {
                    assert!(self.finished.replace(f).is_none());
                }
            }
        }

        fn run(&mut self, ticks: usize, step_ms: u64) {
            for _ in 0..ticks {
                self.tick();
                self.now += step_ms;
            }
        }

        fn body(&self) -> &str {
            match self.finished {
                Some(Finished::Done { body_len, .. }) => {
                    core::str::from_utf8(&self.at.data()[..body_len]).unwrap()
                }
                _ => panic!("request not done"),
            }
        }
    }

    fn script_session(modem: &MockModem) {
        modem
            .reply("AT+SAPBR=2,1", BEARER_UP)
            .reply("AT+HTTPINIT", OK)
            .reply("AT+HTTPPARA=\"CID\",1", OK)
            .reply("AT+HTTPSSL=0", OK)
            .reply("AT+HTTPPARA=\"URL\",\"http://example.com/x\"", OK);
    }

    #[test]
    fn get_with_body() {
        let mut h = Harness::new();
        script_session(&h.modem);
        h.modem
            .reply("AT+HTTPACTION=0", "\r\nOK\r\n\r\n+HTTPACTION: 0,200,13\r\n")
            .reply(
                "AT+HTTPREAD=0,13",
                "\r\n+HTTPREAD: 13\r\nHello, world!\r\nOK\r\n",
            )
            .reply("AT+HTTPTERM", OK);

        h.http.start("http://example.com/x").unwrap();
        h.run(12, 100);

        assert_eq!(
            h.finished,
            Some(Finished::Done {
                status: 200,
                body_len: 13
            })
        );
        assert_eq!(h.body(), "Hello, world!");
        assert!(!h.http.is_active());
        assert_eq!(h.modem.last_written().as_deref(), Some("AT+HTTPTERM"));
        assert_eq!(h.modem.unused_replies(), 0);
    }

    #[test]
    fn empty_body_skips_read() {
        let mut h = Harness::new();
        script_session(&h.modem);
        h.modem
            .reply("AT+HTTPACTION=0", "\r\nOK\r\n\r\n+HTTPACTION: 0,204,0\r\n")
            .reply("AT+HTTPTERM", OK);

        h.http.start("http://example.com/x").unwrap();
        h.run(12, 100);

        assert_eq!(
            h.finished,
            Some(Finished::Done {
                status: 204,
                body_len: 0
            })
        );
        assert_eq!(h.body(), "");
        assert!(!h.modem.written().iter().any(|c| c.starts_with("AT+HTTPREAD")));
    }

    #[test]
    fn second_request_is_busy() {
        let mut h = Harness::new();
        h.http.start("http://example.com/x").unwrap();
        assert_eq!(h.http.start("http://example.com/y"), Err(Error::Busy));
        assert_eq!(h.http.request().map(|r| r.url()), Some("http://example.com/x"));
        assert!(h.modem.written().is_empty());
    }

    #[test]
    fn url_is_validated() {
        let mut h = Harness::new();
        assert_eq!(h.http.start(""), Err(Error::InvalidUrl));
        assert_eq!(h.http.start("   "), Err(Error::InvalidUrl));
        let long = std::format!("http://example.com/{}", "a".repeat(MAX_URL_LEN));
        assert_eq!(h.http.start(&long), Err(Error::InvalidUrl));
        assert_eq!(
            h.http.start("http://example.com/\"x\""),
            Err(Error::InvalidUrl)
        );
        assert!(!h.http.is_active());
    }

    fn script_read(modem: &MockModem, declared: usize, body: &[u8]) {
        let action = std::format!("\r\nOK\r\n\r\n+HTTPACTION: 0,200,{}\r\n", declared);
        let mut read = std::format!("\r\n+HTTPREAD: {}\r\n", body.len()).into_bytes();
        read.extend_from_slice(body);
        read.extend_from_slice(b"\r\nOK\r\n");

        let read_cmd = std::format!("AT+HTTPREAD=0,{}", declared.min(MAX_DATA_LEN));
        modem
            .reply("AT+HTTPACTION=0", &action)
            .reply_bytes(&read_cmd, &read)
            .reply("AT+HTTPTERM", OK);
    }

    #[test]
    fn oversized_body_is_truncated() {
        let mut h = Harness::new();
        script_session(&h.modem);
        script_read(&h.modem, 20_000, &[b'a'; MAX_DATA_LEN]);

        h.http.start("http://example.com/x").unwrap();
        h.run(12, 100);

        assert_eq!(
            h.finished,
            Some(Finished::Done {
                status: 200,
                body_len: MAX_DATA_LEN
            })
        );
        assert!(h
            .modem
            .written()
            .iter()
            .any(|c| c == "AT+HTTPREAD=0,10240"));
        assert_eq!(h.modem.unused_replies(), 0);
    }

    #[test]
    fn character_split_by_truncation_is_dropped() {
        let mut h = Harness::new();
        script_session(&h.modem);
        let mut body = std::vec![b'a'; MAX_DATA_LEN - 1];
        // First byte of "é"
        body.push(0xC3);
        script_read(&h.modem, 20_000, &body);

        h.http.start("http://example.com/x").unwrap();
        h.run(12, 100);

        assert_eq!(
            h.finished,
            Some(Finished::Done {
                status: 200,
                body_len: MAX_DATA_LEN - 1
            })
        );
        assert!(h.body().bytes().all(|b| b == b'a'));
    }

    #[test]
    fn invalid_utf8_body_fails() {
        let mut h = Harness::new();
        script_session(&h.modem);
        script_read(&h.modem, 4, &[0xFF, 0xFE, b'o', b'k']);

        h.http.start("http://example.com/x").unwrap();
        h.run(12, 100);

        assert_eq!(h.finished, Some(Finished::Failed(Error::MalformedReply)));
        assert_eq!(h.modem.last_written().as_deref(), Some("AT+HTTPTERM"));
        assert!(!h.http.is_active());
    }

    #[test]
    fn https_enables_ssl() {
        let mut h = Harness::new();
        h.modem
            .reply("AT+SAPBR=2,1", BEARER_UP)
            .reply("AT+HTTPINIT", OK)
            .reply("AT+HTTPPARA=\"CID\",1", OK);
        h.http.start("HTTPS://example.com/secure").unwrap();
        h.run(5, 100);
        assert!(h.modem.written().iter().any(|c| c == "AT+HTTPSSL=1"));
    }

    #[test]
    fn missing_notification_times_out() {
        let mut h = Harness::new();
        script_session(&h.modem);
        h.modem
            .reply("AT+HTTPACTION=0", OK)
            .reply("AT+HTTPTERM", OK);

        h.http.start("http://example.com/x").unwrap();
        h.run(8, 100);
        assert_eq!(h.http.request().map(|r| r.state()), Some(HttpState::AwaitResult));
        assert!(h.finished.is_none());

        h.now += 30_000;
        h.run(3, 100);

        assert_eq!(h.finished, Some(Finished::Failed(Error::TransportTimeout)));
        assert_eq!(h.modem.last_written().as_deref(), Some("AT+HTTPTERM"));
        assert!(h.at.is_idle());
        assert!(!h.http.is_active());
    }

    #[test]
    fn dropped_bearer_fails_without_session() {
        let mut h = Harness::new();
        h.modem
            .reply("AT+SAPBR=2,1", "\r\n+SAPBR: 1,3,\"0.0.0.0\"\r\n\r\nOK\r\n");
        h.http.start("http://example.com/x").unwrap();
        h.run(3, 100);

        assert_eq!(h.finished, Some(Finished::Failed(Error::BearerLost)));
        assert_eq!(h.modem.written(), ["AT+SAPBR=2,1"]);
    }

    #[test]
    fn module_error_status_fails() {
        let mut h = Harness::new();
        script_session(&h.modem);
        h.modem
            .reply("AT+HTTPACTION=0", "\r\nOK\r\n\r\n+HTTPACTION: 0,601,0\r\n")
            .reply("AT+HTTPTERM", OK);
        h.http.start("http://example.com/x").unwrap();
        h.run(12, 100);

        assert_eq!(h.finished, Some(Finished::Failed(Error::MalformedReply)));
        assert_eq!(h.modem.last_written().as_deref(), Some("AT+HTTPTERM"));
    }

    #[test]
    fn stale_session_is_terminated_before_init() {
        let mut h = Harness::new();
        h.modem
            .reply("AT+SAPBR=2,1", BEARER_UP)
            .reply("AT+HTTPINIT", "\r\nERROR\r\n")
            .reply("AT+HTTPTERM", OK)
            .reply("AT+HTTPINIT", OK);
        h.http.start("http://example.com/x").unwrap();
        h.run(6, 100);

        assert_eq!(
            h.modem.written()[..4],
            ["AT+SAPBR=2,1", "AT+HTTPINIT", "AT+HTTPTERM", "AT+HTTPINIT"]
        );
        assert_eq!(
            h.http.request().map(|r| r.state()),
            Some(HttpState::SetBearerProfile)
        );
    }

    #[test]
    fn abort_after_init_terminates_session() {
        let mut h = Harness::new();
        h.modem
            .reply("AT+SAPBR=2,1", BEARER_UP)
            .reply("AT+HTTPINIT", OK)
            .reply("AT+HTTPTERM", OK);
        h.http.start("http://example.com/x").unwrap();
        h.run(3, 100);
        assert_eq!(
            h.http.request().map(|r| r.state()),
            Some(HttpState::SetBearerProfile)
        );

        // Let the CID parameter go unanswered, then abort
        assert!(h.http.abort(Error::BearerLost).is_none());
        h.now += 1_000;
        h.run(3, 100);
        assert_eq!(h.finished, Some(Finished::Failed(Error::BearerLost)));
        assert_eq!(h.modem.last_written().as_deref(), Some("AT+HTTPTERM"));
    }
}
