pub mod capability;
pub mod clock;
pub mod error;
pub mod ini;
pub mod logging;
pub mod net;
pub mod signal;
