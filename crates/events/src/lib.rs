pub mod bus;
pub mod event;

pub use bus::{EventBus, EventHandler};
pub use event::{AppEvent, EventKind};
