//! Application layer for the desktop binary.
//!
//! - **`session`** – one remapping session from start to teardown: builds
//!   the key tables from the configuration, installs the input hook, runs
//!   the focus monitor and, in client mode, launches the target application
//!   and ends when it exits.  All OS access goes through the collaborator
//!   traits in [`PlatformServices`](session::PlatformServices), so the whole
//!   lifecycle runs in tests against mocks.

pub mod session;
