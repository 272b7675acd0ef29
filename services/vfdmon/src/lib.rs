//! VFD Monitor (`vfdmon`)
//!
//! Drive-side logic on top of `vfd-modbus`:
//!
//! ```text
//! DriveSession ── connect/disconnect, fire-and-forget commands
//!     ├── DriveController (register map, snapshots, control writes)
//!     └── PollScheduler   (cancellable sampling loop)
//!             │
//!             ▼
//!       EventChannel (Data / Fault / Log)
//!             │
//!             ▼
//!         Monitor (drain tick, rolling window, FaultLog)
//! ```

pub mod cli;
pub mod config;
pub mod drive;
pub mod events;
pub mod faults;
pub mod monitor;
pub mod poller;
pub mod registers;
pub mod session;

pub use config::AppConfig;
pub use drive::{DriveController, Snapshot, SnapshotSource};
pub use events::{event_channel, Event, EventReceiver, EventSender};
pub use faults::{FaultLog, FaultRecord};
pub use monitor::{Monitor, MonitorHandle};
pub use poller::{PollScheduler, PollState};
pub use registers::ControlCommand;
pub use session::DriveSession;
