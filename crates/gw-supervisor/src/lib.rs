//! gw-supervisor — keeps the sensor reader process alive and polled.
//!
//! Exactly one reader process runs at a time. A dedicated exchange task
//! writes the request line on every tick and hands the response line to a
//! [`ReportSink`](gw_core::ReportSink), while the supervisor itself waits
//! for the process to exit.
//!
//! # Architecture
//!
//! ```text
//! Supervisor::run()
//!   ├── spawn reader (stdin/stdout piped)
//!   ├── exchange task (per process)
//!   │   ├── interval tick
//!   │   ├── exchange() → write request, read one line
//!   │   └── ReportSink::report(line)
//!   ├── child.wait() | shutdown
//!   ├── done signal → join exchange task
//!   └── cooldown → respawn
//! ```
//!
//! # Restart policy
//!
//! A failed read only skips the current tick. Process exit, whatever the
//! exit code, stops the exchange task, waits one cooldown and respawns.
//! Failing to spawn is fatal and surfaces as [`SupervisorError`].

pub mod error;
pub mod exchange;
pub mod supervisor;

pub use error::SupervisorError;
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorEvent, MIN_INTERVAL};
