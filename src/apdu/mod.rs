//! Component C: ISO 7816-4 command framing, status-word interpretation and
//! the transport-policy layer built on top, plus the two command families
//! (`AUTHENTICATE`, `VERIFY`/`CHANGE REFERENCE DATA`) the rest of the crate
//! issues through it.

pub mod authenticate;
pub mod command;
pub mod pin;
pub mod status;
pub mod transport;

pub use authenticate::{authenticate, AuthContext, AuthenticateResult};
pub use command::Command;
pub use pin::{change_reference_data, verify};
pub use status::StatusWord;
pub use transport::{ApduClient, GsmMode, Transport, TransportPolicy};
