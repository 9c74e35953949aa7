//! In-memory line transport
//!
//! Simulates a Smoothieware-style controller: every written line is recorded
//! and answered like the firmware would, tracking X/Y/Z and one E axis per
//! tool so that `M114` reports what earlier `G0`/`G92`/`G28` lines did.
//! Behaviour can be switched at runtime to exercise timeouts and faults.

use super::LineTransport;
use parking_lot::{Condvar, Mutex};
use pnpkit_core::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// How the mock answers
#[derive(Debug, Clone, PartialEq)]
pub enum MockMode {
    /// Answer like a Smoothieware controller
    Controller,
    /// Acknowledge everything with `ok` but never report a position
    AckOnly,
    /// Never answer
    Silent,
    /// Fail every read with a transport fault
    FailReads(String),
    /// Block every read for this long, ignoring the caller's bound
    Stall(Duration),
}

#[derive(Debug, Default)]
struct SimulatedMachine {
    x: f64,
    y: f64,
    z: f64,
    e: [f64; 2],
    tool: usize,
}

impl SimulatedMachine {
    fn words(line: &str) -> impl Iterator<Item = (char, f64)> + '_ {
        line.split_whitespace().skip(1).filter_map(|word| {
            let mut chars = word.chars();
            let letter = chars.next()?.to_ascii_uppercase();
            let value = chars.as_str().parse::<f64>().ok()?;
            Some((letter, value))
        })
    }

    fn set_axis(&mut self, letter: char, value: f64) {
        match letter {
            'X' => self.x = value,
            'Y' => self.y = value,
            'Z' => self.z = value,
            'E' => self.e[self.tool] = value,
            _ => {}
        }
    }

    fn respond(&mut self, line: &str) -> Vec<String> {
        let code = line.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
        match code.as_str() {
            "T0" | "T1" => self.tool = if code == "T1" { 1 } else { 0 },
            "G0" | "G1" | "G92" => {
                let words: Vec<_> = Self::words(line).collect();
                for (letter, value) in words {
                    self.set_axis(letter, value);
                }
            }
            "G28" => {
                let words: Vec<_> = Self::words(line).collect();
                for (letter, _) in words {
                    self.set_axis(letter, 0.0);
                }
            }
            "M114" => {
                return vec![format!(
                    "ok C: X:{:.4} Y:{:.4} Z:{:.4} E:{:.4}",
                    self.x, self.y, self.z, self.e[self.tool]
                )]
            }
            _ => {}
        }
        vec!["ok".to_string()]
    }
}

#[derive(Debug)]
struct MockState {
    open: bool,
    mode: MockMode,
    banner: Vec<String>,
    inbox: VecDeque<String>,
    writes: Vec<String>,
    replies: HashMap<String, Vec<String>>,
    machine: SimulatedMachine,
}

/// Scripted in-memory controller link
#[derive(Debug)]
pub struct MockTransport {
    state: Mutex<MockState>,
    arrived: Condvar,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// A mock that answers like a controller
    pub fn new() -> Self {
        Self::with_mode(MockMode::Controller)
    }

    /// A mock that never answers
    pub fn silent() -> Self {
        Self::with_mode(MockMode::Silent)
    }

    /// A mock in the given mode
    pub fn with_mode(mode: MockMode) -> Self {
        Self {
            state: Mutex::new(MockState {
                open: false,
                mode,
                banner: Vec::new(),
                inbox: VecDeque::new(),
                writes: Vec::new(),
                replies: HashMap::new(),
                machine: SimulatedMachine::default(),
            }),
            arrived: Condvar::new(),
        }
    }

    /// Lines emitted unprompted every time the link opens
    pub fn with_banner<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().banner = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Seed the simulated machine's reported position
    pub fn with_machine_position(self, x: f64, y: f64, z: f64, e0: f64, e1: f64) -> Self {
        {
            let mut state = self.state.lock();
            state.machine.x = x;
            state.machine.y = y;
            state.machine.z = z;
            state.machine.e = [e0, e1];
        }
        self
    }

    /// Answer `command` with fixed lines instead of simulating it
    pub fn set_reply<I, S>(&self, command: &str, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .replies
            .insert(command.to_string(), lines.into_iter().map(Into::into).collect());
    }

    /// Switch how the mock answers from now on
    pub fn set_mode(&self, mode: MockMode) {
        self.state.lock().mode = mode;
        self.arrived.notify_all();
    }

    /// Make every subsequent read fail, as if the device were unplugged
    pub fn fail_reads(&self, reason: impl Into<String>) {
        self.set_mode(MockMode::FailReads(reason.into()));
    }

    /// Queue an unsolicited line for the reader
    pub fn push_line(&self, line: impl Into<String>) {
        self.state.lock().inbox.push_back(line.into());
        self.arrived.notify_all();
    }

    /// Every line written so far
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }
}

impl LineTransport for MockTransport {
    fn open(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.open = true;
        state.inbox.clear();
        let banner = state.banner.clone();
        state.inbox.extend(banner);
        drop(state);
        self.arrived.notify_all();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.state.lock().open = false;
        self.arrived.notify_all();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn write_line(&self, line: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(Error::transport_fault("write to closed mock transport"));
        }
        state.writes.push(line.to_string());

        let reply = if let Some(lines) = state.replies.get(line) {
            lines.clone()
        } else {
            match state.mode {
                MockMode::Controller => state.machine.respond(line),
                MockMode::AckOnly => vec!["ok".to_string()],
                _ => Vec::new(),
            }
        };
        state.inbox.extend(reply);
        drop(state);
        self.arrived.notify_all();
        Ok(())
    }

    fn read_line(&self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            match &state.mode {
                MockMode::FailReads(reason) => return Err(Error::transport_fault(reason.clone())),
                MockMode::Stall(stall) => {
                    let stall = *stall;
                    drop(state);
                    std::thread::sleep(stall);
                    return Ok(None);
                }
                _ => {}
            }

            if let Some(line) = state.inbox.pop_front() {
                return Ok(Some(line));
            }

            if self.arrived.wait_until(&mut state, deadline).timed_out() {
                return Ok(state.inbox.pop_front());
            }
        }
    }
}
