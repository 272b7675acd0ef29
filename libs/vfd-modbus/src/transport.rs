//! Serial transport with exclusive bus access
//!
//! RS485 is half duplex: exactly one request/response pair may be on the wire
//! at any instant. [`Transport`] owns the link handle behind a single async
//! mutex, and every transaction runs inside a [`BusSession`] that holds that
//! mutex from the settling delay until the response has been read. The guard
//! is released on drop, so early returns and errors never leave the bus held.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{sleep, timeout, Instant};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::constants::{INTER_BYTE_TIMEOUT, MIN_RESPONSE_LEN, RESPONSE_BUFFER_SIZE, SETTLE_DELAY};
use crate::error::{ModbusError, Result};
use crate::frame;

/// Byte-level link to the drive
#[async_trait]
pub trait BusLink: Send {
    /// Drop bytes left over from an earlier, abandoned exchange
    async fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }

    /// Write a complete request frame
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read one response frame into `buffer`, returning its length
    async fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize>;
}

/// Opens links for a [`Transport`]
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn BusLink>>;
}

/// Connector for real serial devices
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn BusLink>> {
        Ok(Box::new(SerialLink::open(config)?))
    }
}

/// Serial RTU link
#[derive(Debug)]
pub struct SerialLink {
    port: SerialStream,
    name: String,
}

impl SerialLink {
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        debug!("RTU: {} @{}baud", config.port, config.baud_rate);

        let port = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(config.serial_data_bits())
            .parity(config.parity.into())
            .stop_bits(config.serial_stop_bits())
            .timeout(config.timeout())
            .open_native_async()
            .map_err(|e| {
                error!("RTU err: {} - {}", config.port, e);
                ModbusError::comm(format!("Failed to open serial port {}: {e}", config.port))
            })?;

        info!("RTU opened: {}", config.port);
        Ok(Self {
            port,
            name: config.port.clone(),
        })
    }
}

#[async_trait]
impl BusLink for SerialLink {
    async fn discard_input(&mut self) -> Result<()> {
        self.port
            .clear(tokio_serial::ClearBuffer::Input)
            .map_err(|e| ModbusError::comm(format!("Serial flush error on {}: {e}", self.name)))
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data).await.map_err(|e| {
            error!("RTU TX: {}", e);
            ModbusError::comm(format!("Serial send error: {e}"))
        })?;
        self.port.flush().await.map_err(|e| {
            error!("RTU flush: {}", e);
            ModbusError::comm(format!("Serial flush error: {e}"))
        })?;
        Ok(())
    }

    async fn receive(&mut self, buffer: &mut [u8], timeout_duration: Duration) -> Result<usize> {
        // Frame ends when the announced length is reached, or on an
        // inter-byte gap once a minimal frame is in.
        let deadline = Instant::now() + timeout_duration;
        let mut total = 0;

        loop {
            if let Some(expected) = frame::expected_response_len(&buffer[..total]) {
                if total >= expected {
                    break;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                if total >= MIN_RESPONSE_LEN {
                    break;
                }
                debug!("RTU timeout: {}B", total);
                return Err(ModbusError::comm(format!(
                    "Timeout waiting for response ({total} bytes received)"
                )));
            }
            if total >= buffer.len() {
                error!("RTU overflow: {}B", total);
                return Err(ModbusError::comm("Response exceeds buffer size"));
            }

            let remaining = deadline - now;
            let wait = if total == 0 {
                remaining
            } else {
                INTER_BYTE_TIMEOUT.min(remaining)
            };

            match timeout(wait, self.port.read(&mut buffer[total..])).await {
                Ok(Ok(0)) => {
                    error!("RTU closed");
                    return Err(ModbusError::comm("Serial connection closed"));
                },
                Ok(Ok(bytes)) => total += bytes,
                Ok(Err(e)) => {
                    error!("RTU RX: {}", e);
                    return Err(ModbusError::comm(format!("Serial read error: {e}")));
                },
                Err(_) => {
                    if total >= MIN_RESPONSE_LEN {
                        break;
                    } else if total > 0 {
                        debug!("RTU partial: {}B", total);
                        return Err(ModbusError::comm(
                            "Incomplete frame: inter-byte timeout",
                        ));
                    }
                },
            }
        }

        Ok(total)
    }
}

/// Owner of the bus: one connection config, one link, one lock
pub struct Transport {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    link: Mutex<Option<Box<dyn BusLink>>>,
    settle_delay: Duration,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            link: Mutex::new(None),
            settle_delay: SETTLE_DELAY,
        }
    }

    /// Transport over a real serial device
    pub fn serial(config: ConnectionConfig) -> Self {
        Self::new(config, Arc::new(SerialConnector))
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn slave_id(&self) -> u8 {
        self.config.slave_id
    }

    /// Open the link.
    ///
    /// Invalid parameters are a [`ModbusError::Config`]; a device that cannot
    /// be opened yields `Ok(false)`. Opening an open transport is a no-op.
    pub async fn open(&self) -> Result<bool> {
        self.config.validate()?;

        let mut link = self.link.lock().await;
        if link.is_some() {
            debug!("Already open: {}", self.config.port);
            return Ok(true);
        }

        match self.connector.connect(&self.config) {
            Ok(new_link) => {
                *link = Some(new_link);
                info!("Opened {}", self.config);
                Ok(true)
            },
            Err(e) => {
                warn!("Open failed: {} - {}", self.config.port, e);
                Ok(false)
            },
        }
    }

    /// Release the link. Safe to call at any time, any number of times.
    pub async fn close(&self) {
        let mut link = self.link.lock().await;
        if link.take().is_some() {
            info!("Closed {}", self.config.port);
        } else {
            debug!("Close on closed transport: {}", self.config.port);
        }
    }

    pub async fn is_open(&self) -> bool {
        self.link.lock().await.is_some()
    }

    /// Take exclusive ownership of the bus for one transaction
    pub(crate) async fn acquire(&self) -> Result<BusSession<'_>> {
        let guard = self.link.lock().await;
        if guard.is_none() {
            return Err(ModbusError::comm("Port not open"));
        }

        sleep(self.settle_delay).await;

        Ok(BusSession {
            guard,
            timeout: self.config.timeout(),
        })
    }
}

/// Exclusive hold on the bus; dropping it frees the bus
pub(crate) struct BusSession<'a> {
    guard: MutexGuard<'a, Option<Box<dyn BusLink>>>,
    timeout: Duration,
}

impl BusSession<'_> {
    /// Send `request` and read back one response frame
    pub(crate) async fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let link = self
            .guard
            .as_mut()
            .ok_or_else(|| ModbusError::comm("Port not open"))?;

        link.discard_input().await?;

        debug!("TX: {}", hex::encode_upper(request));
        link.send(request).await?;

        let mut buffer = [0u8; RESPONSE_BUFFER_SIZE];
        let len = link.receive(&mut buffer, self.timeout).await?;
        debug!("RX: {}", hex::encode_upper(&buffer[..len]));

        Ok(buffer[..len].to_vec())
    }
}
