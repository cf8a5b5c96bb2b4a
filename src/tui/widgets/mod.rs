pub mod alert;
pub mod list;
pub mod table;
pub mod text_input;
pub mod toggle_button;

pub use alert::{AlertLevel, AlertList};
pub use list::ListState;
pub use text_input::{TextArea, TextInput};
pub use toggle_button::{AnimationsToggle, ImageSlot, ToggleButton, ToggleChanged, ToggleImage};
