//! Names of the events carried on the console's event bus.
//!
//! Backend responses are not listed here: their names are derived from the
//! request name (see [`crate::api::protocol::response_event`]).

pub const SHOW_FLEET_SCALING_POPUP: &str = "ShowFleetScalingPopup";
pub const SHOW_FLEET_EVENTS_POPUP: &str = "ShowFleetEventsPopup";
pub const SHOW_QUEUE_POPUP: &str = "ShowQueuePopup";
pub const SHOW_GAME_SESSION_POPUP: &str = "ShowGameSessionPopup";
pub const SHOW_MATCHMAKING_POPUP: &str = "ShowMatchmakingPopup";
pub const SHOW_VIRTUAL_PLAYERS_POPUP: &str = "ShowVirtualPlayersPopup";
pub const SHOW_PURGE_DATA_POPUP: &str = "ShowPurgeDataPopup";
pub const CLOSE_POPUP: &str = "ClosePopup";

pub const ENABLE_ANIMATIONS: &str = "EnableAnimations";
pub const DISABLE_ANIMATIONS: &str = "DisableAnimations";
pub const ADD_DUMMY_FLEET: &str = "AddDummyFleet";
pub const ADD_DUMMY_GAME_SESSIONS: &str = "AddDummyGameSessions";
pub const SIGN_OUT: &str = "SignOut";

/// Emitted by the transport when the backend connection goes away
pub const CONNECTION_CLOSED: &str = "ConnectionClosed";
