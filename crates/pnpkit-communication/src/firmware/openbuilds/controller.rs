//! OpenBuilds pick-and-place driver
//!
//! Implements [`DriverTrait`] for the OpenBuilds head on a Smoothieware
//! board. Every device-touching operation runs under one async command lock
//! that owns the dispatcher and Position State, so exactly one command is in
//! flight at a time and connect/disconnect can never interleave with a move.

use super::commands::{
    self, Accessory, CLEAR_HALT, DISABLE_MOTORS, QUERY_POSITION, WAIT_FOR_MOTION,
};
use super::kinematics::{normalize_angle, Kinematics, MotionStep, MovePlan};
use super::response_parser::{is_position_report, PositionReport};
use crate::communication::{
    CommandDispatcher, ConnectionParams, LineTransport, ReaderHandle, ResponseReader,
    SerialLineTransport,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use pnpkit_core::{
    ConnectionError, ConnectionState, ControllerError, DriverTrait, Location, Mover,
    PositionState, Result, ToolIndex, Units,
};
use pnpkit_settings::{Config, DriverSettings};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Link {
    dispatcher: CommandDispatcher,
    reader: ReaderHandle,
}

/// State owned by the command lock
#[derive(Default)]
struct Session {
    link: Option<Link>,
    /// Reader that outlived its join, still blocked in a read
    stale_reader: Option<ReaderHandle>,
    position: PositionState,
}

impl Session {
    fn dispatcher(&mut self) -> Result<&mut CommandDispatcher> {
        self.link
            .as_mut()
            .map(|link| &mut link.dispatcher)
            .ok_or_else(|| ControllerError::NotConnected.into())
    }

    async fn send(&mut self, command: &str, timeout: Duration) -> Result<Vec<String>> {
        self.dispatcher()?.dispatch(Some(command), timeout).await
    }
}

/// Driver for the OpenBuilds two-tool head
pub struct OpenBuildsDriver {
    name: String,
    settings: DriverSettings,
    kinematics: Kinematics,
    transport: Arc<dyn LineTransport>,
    read_timeout: Duration,
    session: tokio::sync::Mutex<Session>,
    state: RwLock<ConnectionState>,
    position: RwLock<PositionState>,
    picked: Mutex<[bool; 2]>,
}

impl OpenBuildsDriver {
    /// Create a driver over `transport`.
    ///
    /// `read_timeout` bounds each blocking read of the response reader and
    /// so how quickly a disconnect is noticed.
    pub fn new(
        settings: DriverSettings,
        transport: Arc<dyn LineTransport>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            name: "OpenBuilds".to_string(),
            kinematics: Kinematics::from_settings(&settings),
            settings,
            transport,
            read_timeout,
            session: tokio::sync::Mutex::new(Session::default()),
            state: RwLock::new(ConnectionState::Disconnected),
            position: RwLock::new(PositionState::default()),
            picked: Mutex::new([false; 2]),
        }
    }

    /// Create a driver on the serial port named in `config`
    pub fn from_config(config: &Config) -> Self {
        let params = ConnectionParams::from(&config.connection);
        let read_timeout = params.read_timeout;
        Self::new(
            config.driver.clone(),
            Arc::new(SerialLineTransport::new(params)),
            read_timeout,
        )
    }

    /// Override the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Driver settings in use
    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Whether `tool` currently holds a part
    pub fn is_picked(&self, tool: ToolIndex) -> bool {
        self.picked.lock()[tool.index()]
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            tracing::debug!("{}: {} -> {}", self.name, previous, state);
        }
    }

    fn publish(&self, session: &Session) {
        *self.position.write() = session.position;
    }

    async fn connect_locked(&self, session: &mut Session) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state != ConnectionState::Disconnected {
                return Err(ControllerError::AlreadyConnected.into());
            }
            *state = ConnectionState::Connecting;
        }
        tracing::info!("{}: connecting", self.name);

        match self.handshake(session).await {
            Ok(()) => {
                tracing::info!("{}: connected at {}", self.name, session.position);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("{}: connect failed: {}", self.name, e);
                self.teardown(session).await;
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn handshake(&self, session: &mut Session) -> Result<()> {
        let connect_timeout = self.settings.connect_timeout();
        let flush_timeout = self.settings.flush_timeout();

        self.retire_stale_reader(session, connect_timeout).await?;

        self.transport.open()?;
        let (reader, channel) = ResponseReader::spawn(self.transport.clone(), self.read_timeout)?;
        session.link = Some(Link {
            dispatcher: CommandDispatcher::new(self.transport.clone(), channel),
            reader,
        });
        let dispatcher = session.dispatcher()?;

        // Some boards reset when the port opens and print a banner, others
        // are already running and print nothing.
        let flush_deadline = Instant::now() + connect_timeout;
        while Instant::now() < flush_deadline {
            match dispatcher.dispatch(None, flush_timeout).await {
                Ok(lines) => tracing::debug!("Flushed startup output: {:?}", lines),
                Err(e) if e.is_timeout() => break,
                Err(e) => return Err(e),
            }
        }

        let deadline = Instant::now() + connect_timeout;
        let mut responses = match dispatcher
            .dispatch(Some(QUERY_POSITION), deadline.saturating_duration_since(Instant::now()))
            .await
        {
            Ok(lines) => lines,
            Err(e) if e.is_timeout() => Vec::new(),
            Err(e) => return Err(e),
        };

        while !responses.iter().any(|line| is_position_report(line)) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ConnectionError::ConnectionFailed {
                    reason: format!(
                        "no position report within {}ms; check the port and baud rate",
                        connect_timeout.as_millis()
                    ),
                }
                .into());
            }
            responses = match dispatcher.dispatch(None, flush_timeout.min(remaining)).await {
                Ok(lines) => lines,
                Err(e) if e.is_timeout() => Vec::new(),
                Err(e) => return Err(e),
            };
        }

        self.set_state(ConnectionState::Connected);

        self.apply_enabled(session, false).await?;
        for command in commands::SETUP_SEQUENCE {
            session.send(command, self.settings.command_timeout()).await?;
        }
        self.refresh_position(session).await
    }

    /// Wait out a reader left running by an earlier teardown, so it cannot
    /// take a line from the next session.
    async fn retire_stale_reader(&self, session: &mut Session, timeout: Duration) -> Result<()> {
        let Some(mut reader) = session.stale_reader.take() else {
            return Ok(());
        };
        tracing::debug!("{}: waiting for previous response reader", self.name);
        if reader.join(timeout).await {
            return Ok(());
        }
        session.stale_reader = Some(reader);
        Err(ConnectionError::ConnectionFailed {
            reason: "previous response reader is still blocked in a read".to_string(),
        }
        .into())
    }

    async fn disconnect_locked(&self, session: &mut Session) {
        if *self.state.read() == ConnectionState::Disconnected && session.link.is_none() {
            return;
        }
        self.set_state(ConnectionState::Disconnecting);
        self.teardown(session).await;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("{}: disconnected", self.name);
    }

    async fn teardown(&self, session: &mut Session) {
        if let Some(Link { dispatcher, mut reader }) = session.link.take() {
            drop(dispatcher);
            if !reader.join(self.settings.reader_join_timeout()).await {
                session.stale_reader = Some(reader);
            }
        }
        if self.transport.is_open() {
            if let Err(e) = self.transport.close() {
                tracing::error!("{}: failed to close transport: {}", self.name, e);
            }
        }
    }

    async fn switch(&self, session: &mut Session, accessory: Accessory, on: bool) -> Result<()> {
        session
            .send(accessory.command(on), self.settings.command_timeout())
            .await
            .map(|_| ())
    }

    async fn apply_enabled(&self, session: &mut Session, enabled: bool) -> Result<()> {
        let timeout = self.settings.command_timeout();
        if enabled {
            session.send(CLEAR_HALT, timeout).await?;
            self.switch(session, Accessory::Tool0Vacuum, false).await?;
            self.switch(session, Accessory::Tool1Vacuum, false).await?;
            self.switch(session, Accessory::DownLight, true).await?;
        } else {
            session.send(DISABLE_MOTORS, timeout).await?;
            self.switch(session, Accessory::Tool0Vacuum, false).await?;
            self.switch(session, Accessory::Tool1Vacuum, false).await?;
            self.switch(session, Accessory::DownLight, false).await?;
            self.switch(session, Accessory::UpLight, false).await?;
        }
        Ok(())
    }

    async fn query_position(&self, session: &mut Session, tool: ToolIndex) -> Result<Option<PositionReport>> {
        let timeout = self.settings.command_timeout();
        session.send(&commands::select_tool(tool), timeout).await?;
        let lines = session.send(QUERY_POSITION, timeout).await?;
        Ok(lines.iter().filter_map(|line| PositionReport::parse(line)).last())
    }

    async fn refresh_position(&self, session: &mut Session) -> Result<()> {
        let mut position = session.position;

        let first = self.query_position(session, ToolIndex::First).await?;
        if let Some(report) = first {
            if let Some(x) = report.x {
                position.x = x;
            }
            if let Some(y) = report.y {
                position.y = y;
            }
            if let Some(z) = report.z {
                position.z_angle = z * 10.0;
            }
            if let Some(e) = report.e {
                position.tool_angle_0 = e;
            }
        }

        let second = self.query_position(session, ToolIndex::Second).await?;
        if let Some(e) = second.and_then(|report| report.e) {
            position.tool_angle_1 = e;
        }

        session
            .send(&commands::select_tool(ToolIndex::First), self.settings.command_timeout())
            .await?;

        if first.is_none() && second.is_none() {
            tracing::warn!("{}: no position report, keeping {}", self.name, position);
        }
        session.position = position;
        self.publish(session);
        tracing::debug!("{}: position is {}", self.name, position);
        Ok(())
    }

    async fn execute(&self, session: &mut Session, plan: MovePlan) -> Result<()> {
        let timeout = self.settings.command_timeout();
        for step in plan {
            match step {
                MotionStep::Send(line) => {
                    session.send(&line, timeout).await?;
                }
                MotionStep::AwaitMotion => {
                    session.send(WAIT_FOR_MOTION, timeout).await?;
                }
                MotionStep::Commit(state) => {
                    session.position = state;
                    self.publish(session);
                }
            }
        }
        Ok(())
    }

    async fn home_locked(&self, session: &mut Session) -> Result<()> {
        let timeout = self.settings.command_timeout();
        let settle = self.settings.motor_settle();

        session.send(CLEAR_HALT, timeout).await?;
        // Z homes by releasing the steppers and letting the spring centre the cam
        session.send(DISABLE_MOTORS, timeout).await?;
        tokio::time::sleep(settle).await;
        session.send(commands::HOME_Z_ZERO, timeout).await?;
        session.send(commands::HOME_Z_BACK_OFF, timeout).await?;
        session.send(DISABLE_MOTORS, timeout).await?;
        tokio::time::sleep(settle).await;
        session
            .send(commands::HOME_Z_SEEK, self.settings.home_z_timeout())
            .await?;
        session.send(commands::HOME_Z_CORRECT, timeout).await?;

        session
            .send(commands::HOME_XY_SEEK, self.settings.home_xy_timeout())
            .await?;

        for tool in [ToolIndex::Second, ToolIndex::First] {
            session.send(&commands::select_tool(tool), timeout).await?;
            session.send(commands::ZERO_ROTATION, timeout).await?;
        }

        self.refresh_position(session).await
    }

    async fn set_vacuum(&self, tool: ToolIndex, on: bool) -> Result<()> {
        let mut session = self.session.lock().await;
        session.dispatcher()?;
        if !on {
            self.picked.lock()[tool.index()] = false;
        }
        self.switch(&mut session, Accessory::vacuum(tool), on).await?;
        if on {
            self.picked.lock()[tool.index()] = true;
        }
        Ok(())
    }
}

#[async_trait]
impl DriverTrait for OpenBuildsDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn position(&self) -> PositionState {
        *self.position.read()
    }

    fn location(&self, mover: &Mover) -> Location {
        let position = self.position();
        let base = match mover.tool_index() {
            Some(tool) => Location::new(
                position.x,
                position.y,
                self.kinematics.height_for_cam_angle(position.z_angle, tool),
                normalize_angle(position.tool_angle(tool)),
            ),
            None => Location::new(
                position.x,
                position.y,
                0.0,
                normalize_angle(position.tool_angle_0),
            ),
        };
        base.add(&mover.head_offsets)
    }

    async fn connect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.connect_locked(&mut session).await
    }

    async fn disconnect(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.disconnect_locked(&mut session).await;
        Ok(())
    }

    async fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut session = self.session.lock().await;
        if enabled && session.link.is_none() {
            self.connect_locked(&mut session).await?;
        }
        session.dispatcher()?;

        tracing::info!(
            "{}: {}",
            self.name,
            if enabled { "enabling" } else { "disabling" }
        );
        self.apply_enabled(&mut session, enabled).await?;

        if !enabled && !self.settings.connection_keep_alive {
            self.disconnect_locked(&mut session).await;
        }
        Ok(())
    }

    async fn home(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.dispatcher()?;
        tracing::info!("{}: homing", self.name);
        self.home_locked(&mut session).await
    }

    async fn move_to(&self, mover: &Mover, location: Location, speed: f64) -> Result<()> {
        let mut session = self.session.lock().await;
        session.dispatcher()?;

        let target = location
            .subtract(&mover.head_offsets)
            .convert_to(Units::MM);
        let plan = self
            .kinematics
            .plan_move(&session.position, mover, &target, speed);
        if plan.is_empty() {
            tracing::debug!("{}: {} already at {}", self.name, mover.name, target);
            return Ok(());
        }
        self.execute(&mut session, plan).await
    }

    async fn actuate(&self, index: usize, on: bool) -> Result<()> {
        let mut session = self.session.lock().await;
        session.dispatcher()?;
        let accessory = Accessory::from_actuator_index(index).ok_or_else(|| {
            tracing::warn!("{}: no actuator with index {}", self.name, index);
            ControllerError::InvalidActuator { index }
        })?;
        self.switch(&mut session, accessory, on).await
    }

    async fn pick(&self, tool: ToolIndex) -> Result<()> {
        self.set_vacuum(tool, true).await
    }

    async fn place(&self, tool: ToolIndex) -> Result<()> {
        self.set_vacuum(tool, false).await
    }
}
