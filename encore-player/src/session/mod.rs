//! Guild sessions: registry, idle-disconnect watchdog and search offers

pub mod registry;
pub mod selection;
pub mod watchdog;

pub use registry::{GuildSession, SessionRegistry};
pub use selection::{SelectionError, SelectionOffers};
pub use watchdog::{DisconnectWatchdog, IdleTeardown};
