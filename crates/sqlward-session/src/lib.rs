//! # sqlward-session
//!
//! The session protocol and everything that happens to a statement after it
//! reaches the gateway.
//!
//! A client opens a session with a marker comment, sends statements and
//! closes with a commit marker:
//!
//! ```text
//! /*--host=10.0.0.1;--port=3306;--user=deploy;--enable-execute=1;inception_magic_start;*/
//! USE shop;
//! ALTER TABLE orders ADD COLUMN note VARCHAR(255) COMMENT 'free text';
//! /*inception_magic_commit;*/
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`marker`] | bracket markers and session options |
//! | [`admin`] | `inception get/show/set/kill` commands |
//! | [`session`] | per-connection state machine |
//! | [`executor`] | gated, throttled, killable execution |
//! | [`registry`] | live sessions, pacing and kill from other connections |
//! | [`result`] | result tables for each mode |
//! | [`crypto`] | `AES:` password encryption |

pub mod admin;
pub mod crypto;
pub mod error;
pub mod executor;
pub mod link;
pub mod marker;
pub mod registry;
pub mod result;
pub mod session;

pub use admin::{AdminCommand, parse_admin};
pub use crypto::{decrypt_password, encrypt_password};
pub use error::{CryptoError, SessionError};
pub use executor::ExecutionController;
pub use link::TargetLink;
pub use marker::{Marker, SessionOptions, parse_marker};
pub use registry::{SessionControl, SessionRegistry, SessionSummary};
pub use result::{ResultTable, SplitGroup};
pub use session::{Reply, Session, SessionServices};
