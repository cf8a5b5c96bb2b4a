pub mod dashboard;
pub mod event_bus;
pub mod popup;
pub mod runtime;
pub mod settings_panel;
pub mod state;
pub mod timer;
pub mod widgets;

pub use event_bus::{EventBus, ListenerSet};
pub use runtime::{BackendTarget, ConsoleRuntime};
pub use state::{Theme, ThemeVariant};
