// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the interactive session.
//
// Module responsibilities:
// - `transport`: the `HttpTransport` seam and its blocking reqwest
//   implementation.
// - `apic`: APIC-EM login and request dispatch with ticket renewal.
// - `spark`: Cisco Spark token handling, rooms and messages.
// - `decode`: JSON/XML response decoding.
// - `library`: controller operations (devices, path trace).
// - `format`: text rendering for the terminal and Spark.
// - `ui`: the interactive menu and its `Context`.
// - `config`, `error`: shared settings and error types.
pub mod apic;
pub mod config;
pub mod decode;
pub mod error;
pub mod format;
pub mod library;
pub mod spark;
pub mod transport;
pub mod ui;
