//! # apid Test Suite
//!
//! Cross-client integration flows. Every flow runs several independent
//! clients against one shared in-memory broker, the way separate processes
//! would share a broker deployment.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── actions.rs      # broadcast delivery between clients
//!     ├── methods.rs      # request/reply between clients
//!     ├── collections.rs  # seeded data read by a peer
//!     └── failures.rs     # broker loss
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p apid-tests
//! cargo test -p apid-tests integration::methods::
//! ```

pub mod harness;
pub mod integration;
