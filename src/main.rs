//! # Zone Terrain Entry Point
//!
//! Runs the bundled demo zone in-process. Set `RUST_LOG` to choose the log level.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release
//! ```

fn main() {
    zone_terrain::run();
}
