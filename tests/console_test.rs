use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use fleet_console::auth::{Session, StaticSessionProvider};
use fleet_console::config::UiSettings;
use fleet_console::events;
use fleet_console::tui::popup::{PopupKind, PopupState};
use fleet_console::tui::settings_panel::{SettingsCommand, command_event};
use fleet_console::tui::widgets::{AnimationsToggle, ImageSlot, ToggleButton, ToggleImage};
use fleet_console::tui::{BackendTarget, ConsoleRuntime, EventBus};
use serde_json::json;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::from(code)
}

async fn signed_in() -> ConsoleRuntime {
    let provider = Arc::new(StaticSessionProvider::new(Session::new("ops", "token")));
    let mut runtime = ConsoleRuntime::new(provider, BackendTarget::Offline, UiSettings::default());
    runtime.poll_async().await.unwrap();
    assert!(runtime.is_signed_in());
    runtime
}

#[test]
fn test_toggle_twice_restores_visible_and_interactive_image() {
    let mut button = ToggleButton::new(true, ToggleImage::new("▶", "Playing"), ToggleImage::new("■", "Stopped"));
    let before = (button.is_on(), button.visible_slot(), button.interactive_slot());
    assert_eq!(before.1, ImageSlot::On);

    button.toggle();
    assert_eq!(button.visible_slot(), ImageSlot::Off);
    assert_eq!(button.interactive_slot(), ImageSlot::Off);
    button.toggle();

    assert_eq!((button.is_on(), button.visible_slot(), button.interactive_slot()), before);
}

#[test]
fn test_animations_toggle_broadcasts() {
    let bus = EventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    for event in [events::ENABLE_ANIMATIONS, events::DISABLE_ANIMATIONS] {
        let seen = seen.clone();
        bus.on(event, move |_| {
            seen.borrow_mut().push(event);
            Ok(())
        });
    }

    let mut toggle = AnimationsToggle::new(bus.clone(), false);
    toggle.toggle();
    toggle.toggle();
    assert_eq!(*seen.borrow(), vec![events::ENABLE_ANIMATIONS, events::DISABLE_ANIMATIONS]);
}

#[test]
fn test_settings_commands_map_to_distinct_events() {
    for command in SettingsCommand::ALL {
        let (event, payload) = command_event(command, None);
        assert!(payload.is_object(), "{:?}", command);
        let popup = PopupKind::from_show_event(event);
        match command {
            SettingsCommand::LaunchPlayers | SettingsCommand::ManageVirtualPlayers => {
                assert_eq!(popup, Some(PopupKind::VirtualPlayers))
            }
            SettingsCommand::ManageMatchmaking => assert_eq!(popup, Some(PopupKind::Matchmaking)),
            SettingsCommand::PurgeData => assert_eq!(popup, Some(PopupKind::PurgeData)),
            SettingsCommand::AddDummyFleet | SettingsCommand::AddDummyGameSessions | SettingsCommand::SignOut => {
                assert_eq!(popup, None)
            }
        }
    }
}

#[tokio::test]
async fn test_settings_panel_opens_virtual_players() {
    let mut runtime = signed_in().await;

    runtime.handle_key(key(KeyCode::Char('s'))).unwrap();
    // Row 0 is the animations toggle, row 1 launches players
    runtime.handle_key(key(KeyCode::Down)).unwrap();
    runtime.handle_key(key(KeyCode::Enter)).unwrap();
    assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::VirtualPlayers));

    // Digits reach the launch input, not the tab switcher
    runtime.handle_key(key(KeyCode::Char('2'))).unwrap();
    runtime.handle_key(key(KeyCode::Enter)).unwrap();
    runtime.poll_async().await.unwrap();
    assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::VirtualPlayers));
}

#[tokio::test]
async fn test_popup_keeps_keys_from_dashboard() {
    let mut runtime = signed_in().await;

    runtime.handle_key(key(KeyCode::Char('e'))).unwrap();
    runtime.poll_async().await.unwrap();
    assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::FleetEvents));

    // Enter would open fleet scaling for the row behind the popup
    assert!(runtime.handle_key(key(KeyCode::Enter)).unwrap());
    assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::FleetEvents));

    assert!(runtime.handle_key(key(KeyCode::Char('s'))).unwrap());
    assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::FleetEvents));

    runtime.handle_key(key(KeyCode::Esc)).unwrap();
    runtime.handle_key(key(KeyCode::Char('c'))).unwrap();
    assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::FleetScaling));
    assert!(runtime.handle_key(key(KeyCode::Char('q'))).unwrap());
    assert_eq!(runtime.popup_state(), PopupState::Showing(PopupKind::FleetScaling));

    runtime.handle_key(key(KeyCode::Esc)).unwrap();
    assert_eq!(runtime.popup_state(), PopupState::Idle);
    assert!(!runtime.handle_key(key(KeyCode::Char('q'))).unwrap());
}

#[tokio::test]
async fn test_sign_out_from_settings() {
    let mut runtime = signed_in().await;
    runtime.bus().emit(events::SHOW_FLEET_EVENTS_POPUP, json!({"FleetId": "fleet-demo-1"}));

    runtime.bus().emit(events::SIGN_OUT, json!({}));
    runtime.process_side_effects().unwrap();
    assert!(!runtime.is_signed_in());
    assert_eq!(runtime.popup_state(), PopupState::Idle);

    runtime.handle_key(key(KeyCode::Enter)).unwrap();
    runtime.poll_async().await.unwrap();
    assert!(runtime.is_signed_in());
}
