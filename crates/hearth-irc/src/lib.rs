//! # hearth-irc
//!
//! A small async IRC client engine: line framing, parsing of the commands a
//! bot cares about, channel/member/prefix tracking, keepalive and timeout
//! detection, and an outgoing history that can suppress accidental repeats.
//!
//! It is not a general-purpose IRC library. Lines it doesn't model are
//! still delivered to subscribers as [`ClientEvent::Raw`].
//!
//! ```no_run
//! use hearth_irc::{ClientEvent, ClientOptions, IrcClient, Registration};
//!
//! # async fn run() -> hearth_irc::Result<()> {
//! let client = IrcClient::new(ClientOptions::default());
//! let mut events = client.subscribe();
//! client
//!     .connect(&Registration {
//!         nick: "hsbot".into(),
//!         user: "hsbot".into(),
//!         realname: "HearthBot".into(),
//!         host: "irc.example.net".into(),
//!         port: 6667,
//!         password: None,
//!     })
//!     .await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::Registered { .. } = event {
//!         client.join("#hearthstone").await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod channel;
pub mod client;
pub mod error;
pub mod history;
pub mod isupport;
pub mod line;
pub mod message;
pub mod tracker;

pub use self::channel::{Channel, ChannelUser};
pub use self::client::{ClientEvent, ClientOptions, ConnectionState, IrcClient, Registration};
pub use self::error::{IrcError, Result};
pub use self::history::OutgoingHistory;
pub use self::isupport::{ChanModes, PrefixTable, ServerCapabilities};
pub use self::message::{Event, RawLine, Source};
pub use self::tracker::ChannelTracker;
