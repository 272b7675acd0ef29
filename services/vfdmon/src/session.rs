//! Connection lifecycle and fire-and-forget drive commands
//!
//! A session owns at most one live connection: transport, client,
//! controller and poller are built together on connect and torn down
//! together on disconnect. Commands run as short-lived tasks that report
//! their outcome on the event channel.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vfd_modbus::{ConnectionConfig, Connector, ModbusClient, Result, SerialConnector, Transport};

use crate::drive::DriveController;
use crate::events::EventSender;
use crate::poller::PollScheduler;
use crate::registers::ControlCommand;

struct Connection {
    transport: Arc<Transport>,
    controller: DriveController,
    poller: PollScheduler,
}

pub struct DriveSession {
    connector: Arc<dyn Connector>,
    events: EventSender,
    settle_delay: Option<Duration>,
    active: Mutex<Option<Connection>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl fmt::Debug for DriveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveSession")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl DriveSession {
    /// Session over real serial ports
    pub fn new(events: EventSender) -> Self {
        Self::with_connector(events, Arc::new(SerialConnector))
    }

    pub fn with_connector(events: EventSender, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            events,
            settle_delay: None,
            active: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Override the pre-transaction settling delay of future connections
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Controller of the live connection
    pub fn controller(&self) -> Option<DriveController> {
        self.active.lock().as_ref().map(|c| c.controller.clone())
    }

    pub fn transport(&self) -> Option<Arc<Transport>> {
        self.active.lock().as_ref().map(|c| Arc::clone(&c.transport))
    }

    pub fn is_polling(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|c| c.poller.is_running())
    }

    /// Open `config` and start polling every `poll_interval`.
    ///
    /// An existing connection is torn down first. Invalid parameters fail
    /// with `ModbusError::Config`; a port that cannot be opened yields
    /// `Ok(false)`.
    pub async fn connect(&self, config: ConnectionConfig, poll_interval: Duration) -> Result<bool> {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;

        config.validate()?;

        let mut transport = Transport::new(config.clone(), Arc::clone(&self.connector));
        if let Some(delay) = self.settle_delay {
            transport = transport.with_settle_delay(delay);
        }
        let transport = Arc::new(transport);

        if !transport.open().await? {
            self.events.log("Failed to open serial port");
            return Ok(false);
        }
        self.events.log(format!(
            "Connected to {} @ {} parity={}",
            config.port, config.baud_rate, config.parity
        ));

        let controller = DriveController::new(ModbusClient::new(Arc::clone(&transport)));
        let poller = PollScheduler::new(Arc::new(controller.clone()), self.events.clone());
        poller.start(poll_interval);
        self.events.log(format!(
            "Started polling every {} ms",
            poll_interval.as_millis()
        ));

        *self.active.lock() = Some(Connection {
            transport,
            controller,
            poller,
        });
        info!("Session connected: {}", config);
        Ok(true)
    }

    /// Stop polling and close the port. No-op when disconnected.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;
    }

    async fn teardown(&self) {
        let connection = self.active.lock().take();
        let Some(connection) = connection else {
            debug!("Disconnect: not connected");
            return;
        };

        connection.poller.stop().await;
        connection.transport.close().await;
        self.events.log("Disconnected");
        info!("Session disconnected");
    }

    /// Write `command` to the control word in the background
    pub fn send_control(&self, command: ControlCommand) -> Option<JoinHandle<()>> {
        let controller = self.connected_controller()?;
        let events = self.events.clone();

        Some(tokio::spawn(async move {
            match controller.send_control(command).await {
                Ok(()) => {
                    events.log(format!("Control 0x{:04X} sent", command.control_word()));
                },
                Err(e) => {
                    warn!("Control {} failed: {}", command, e);
                    events.fault(format!("Control failed: {e}"));
                },
            }
        }))
    }

    /// Write the raw target frequency (Hz x100) in the background
    pub fn set_target_frequency(&self, value: u16) -> Option<JoinHandle<()>> {
        let controller = self.connected_controller()?;
        let events = self.events.clone();

        Some(tokio::spawn(async move {
            match controller.set_target_frequency(value).await {
                Ok(()) => {
                    events.log(format!("Freq set to {value}"));
                },
                Err(e) => {
                    warn!("Set frequency {} failed: {}", value, e);
                    events.fault(format!("Set freq failed: {e}"));
                },
            }
        }))
    }

    fn connected_controller(&self) -> Option<DriveController> {
        let controller = self.controller();
        if controller.is_none() {
            self.events.log("Not connected");
        }
        controller
    }
}
