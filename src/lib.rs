//! Umbrella package for the player core.
//!
//! Holds no code. Its features select which workspace crates a host build
//! pulls in:
//!
//! - `desktop-shims`: `core-service` with the `bridge-desktop` SQLite store,
//!   HTTP fetcher and network probe
//! - `playback-only`: the session controller without the download pipeline
//! - `offline-downloads`: `core-download` on top of playback
