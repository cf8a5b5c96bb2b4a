//! Messages exchanged with the fleet backend.
//!
//! Requests are JSON objects tagged by `Type` with PascalCase fields.
//! Responses arrive as JSON objects whose `Type` names the event to emit,
//! conventionally the request name with a `Response` suffix.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Request {
    GetFleets,
    GetQueues,
    GetMatchmakingConfigurations,
    #[serde(rename_all = "PascalCase")]
    GetFleetScaling { fleet_id: String },
    #[serde(rename_all = "PascalCase")]
    UpdateFleetCapacity {
        fleet_id: String,
        location: String,
        desired_instances: u32,
        min_size: u32,
        max_size: u32,
    },
    #[serde(rename_all = "PascalCase")]
    GetFleetEvents { fleet_id: String },
    #[serde(rename_all = "PascalCase")]
    GetQueueEvents { queue_arn: String },
    #[serde(rename_all = "PascalCase")]
    GetPlayerSessions { game_session_id: String },
    #[serde(rename_all = "PascalCase")]
    GetGameSessionLogs { game_session_id: String },
    GetMatchmakingRuleSets,
    #[serde(rename_all = "PascalCase")]
    ValidateMatchmakingRuleSet { rule_set_body: String },
    #[serde(rename_all = "PascalCase")]
    CreateMatchmakingRuleSet {
        rule_set_name: String,
        rule_set_body: String,
    },
    #[serde(rename_all = "PascalCase")]
    DeleteMatchmakingRuleSet { rule_set_name: String },
    #[serde(rename_all = "PascalCase")]
    LaunchPlayers { num_players: u32 },
    GetVirtualPlayers,
    #[serde(rename_all = "PascalCase")]
    TerminateVirtualPlayer { task_arn: String },
    TerminateAllVirtualPlayers,
    PurgeData,
}

impl Request {
    /// The `Type` tag of this request
    pub fn name(&self) -> &'static str {
        match self {
            Request::GetFleets => "GetFleets",
            Request::GetQueues => "GetQueues",
            Request::GetMatchmakingConfigurations => "GetMatchmakingConfigurations",
            Request::GetFleetScaling { .. } => "GetFleetScaling",
            Request::UpdateFleetCapacity { .. } => "UpdateFleetCapacity",
            Request::GetFleetEvents { .. } => "GetFleetEvents",
            Request::GetQueueEvents { .. } => "GetQueueEvents",
            Request::GetPlayerSessions { .. } => "GetPlayerSessions",
            Request::GetGameSessionLogs { .. } => "GetGameSessionLogs",
            Request::GetMatchmakingRuleSets => "GetMatchmakingRuleSets",
            Request::ValidateMatchmakingRuleSet { .. } => "ValidateMatchmakingRuleSet",
            Request::CreateMatchmakingRuleSet { .. } => "CreateMatchmakingRuleSet",
            Request::DeleteMatchmakingRuleSet { .. } => "DeleteMatchmakingRuleSet",
            Request::LaunchPlayers { .. } => "LaunchPlayers",
            Request::GetVirtualPlayers => "GetVirtualPlayers",
            Request::TerminateVirtualPlayer { .. } => "TerminateVirtualPlayer",
            Request::TerminateAllVirtualPlayers => "TerminateAllVirtualPlayers",
            Request::PurgeData => "PurgeData",
        }
    }

    /// Name of the event the backend answers this request with
    pub fn response_event(&self) -> String {
        response_event(self.name())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).with_context(|| format!("Failed to serialize {} request", self.name()))
    }
}

pub fn response_event(request_name: &str) -> String {
    format!("{}Response", request_name)
}

/// A message received from the backend, ready to be emitted on the bus
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub event: String,
    pub payload: Value,
}

impl Inbound {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Parse a text frame. The frame must be an object with a string `Type`.
    pub fn parse(text: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(text).context("Frame is not valid JSON")?;
        let event = payload
            .get("Type")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Frame has no string 'Type' field"))?
            .to_string();
        Ok(Self { event, payload })
    }
}

/// Decode an event payload into a typed view
pub fn decode<T: DeserializeOwned>(payload: &Value) -> Result<T> {
    T::deserialize(payload).with_context(|| {
        format!(
            "Unexpected payload shape for {}",
            std::any::type_name::<T>().rsplit("::").next().unwrap_or("payload")
        )
    })
}

/// Backend error strings carried by a response, if any
pub fn response_errors(payload: &Value) -> Vec<String> {
    match payload.get("Errors") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Fleet {
    pub fleet_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub game_sessions: Vec<GameSession>,
}

impl Fleet {
    pub fn player_count(&self) -> u32 {
        self.game_sessions
            .iter()
            .map(|gs| gs.current_player_session_count)
            .fold(0u32, u32::saturating_add)
    }

    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("ACTIVE")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameSession {
    pub game_session_id: String,
    #[serde(default)]
    pub fleet_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub current_player_session_count: u32,
    #[serde(default)]
    pub maximum_player_session_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueDestination {
    pub destination_arn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Queue {
    pub name: String,
    #[serde(default)]
    pub queue_arn: String,
    #[serde(default)]
    pub timeout_in_seconds: u32,
    #[serde(default)]
    pub destinations: Vec<QueueDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatchmakingConfiguration {
    pub name: String,
    #[serde(default)]
    pub rule_set_name: String,
    #[serde(default)]
    pub request_timeout_seconds: u32,
    #[serde(default)]
    pub acceptance_required: bool,
    #[serde(default)]
    pub game_session_queue_arns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocationCapacity {
    pub location: String,
    #[serde(default)]
    pub desired_instances: u32,
    #[serde(default)]
    pub min_size: u32,
    #[serde(default)]
    pub max_size: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub active: u32,
    #[serde(default)]
    pub idle: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FleetScaling {
    pub fleet_id: String,
    #[serde(default)]
    pub locations: Vec<LocationCapacity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FleetEvent {
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub event_code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueuePlacementEvent {
    #[serde(default)]
    pub placement_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub game_session_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerSession {
    pub player_session_id: String,
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameSessionLogs {
    #[serde(default)]
    pub log_group: Option<String>,
    #[serde(default)]
    pub log_stream: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleSet {
    pub rule_set_name: String,
    #[serde(default)]
    pub rule_set_body: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualPlayerTask {
    pub task_arn: String,
    #[serde(default)]
    pub last_status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Format an optional timestamp for a table cell
pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_count_saturates() {
        let fleet: Fleet = decode(&json!({
            "FleetId": "fleet-1",
            "GameSessions": [
                {"GameSessionId": "a", "CurrentPlayerSessionCount": u32::MAX},
                {"GameSessionId": "b", "CurrentPlayerSessionCount": 5}
            ]
        }))
        .unwrap();
        assert_eq!(fleet.player_count(), u32::MAX);
    }

    #[test]
    fn test_request_wire_shape() {
        let request = Request::GetFleetScaling {
            fleet_id: "fleet-1".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"Type": "GetFleetScaling", "FleetId": "fleet-1"}));
        assert_eq!(request.response_event(), "GetFleetScalingResponse");
    }

    #[test]
    fn test_unit_request_has_only_type() {
        let value = serde_json::to_value(Request::PurgeData).unwrap();
        assert_eq!(value, json!({"Type": "PurgeData"}));
    }

    #[test]
    fn test_capacity_update_fields() {
        let request = Request::UpdateFleetCapacity {
            fleet_id: "f".to_string(),
            location: "us-west-2".to_string(),
            desired_instances: 3,
            min_size: 1,
            max_size: 5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["DesiredInstances"], 3);
        assert_eq!(value["MinSize"], 1);
        assert_eq!(value["MaxSize"], 5);
        assert_eq!(value["Location"], "us-west-2");
    }

    #[test]
    fn test_inbound_parse() {
        let inbound = Inbound::parse(r#"{"Type":"GetFleetsResponse","Fleets":[]}"#).unwrap();
        assert_eq!(inbound.event, "GetFleetsResponse");
        assert_eq!(inbound.payload["Fleets"], json!([]));

        assert!(Inbound::parse("not json").is_err());
        assert!(Inbound::parse(r#"{"Fleets":[]}"#).is_err());
        assert!(Inbound::parse(r#"{"Type":5}"#).is_err());
    }

    #[test]
    fn test_response_errors() {
        assert!(response_errors(&json!({})).is_empty());
        assert_eq!(
            response_errors(&json!({"Errors": ["a", "b"]})),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(response_errors(&json!({"Errors": "oops"})), vec!["oops".to_string()]);
    }

    #[test]
    fn test_decode_fleet_with_defaults() {
        let fleet: Fleet = decode(&json!({
            "FleetId": "fleet-1",
            "GameSessions": [
                {"GameSessionId": "gs-1", "CurrentPlayerSessionCount": 3},
                {"GameSessionId": "gs-2", "CurrentPlayerSessionCount": 4}
            ]
        }))
        .unwrap();
        assert_eq!(fleet.name, "");
        assert_eq!(fleet.player_count(), 7);
        assert!(!fleet.is_active());
    }

    #[test]
    fn test_missing_log_group_is_none() {
        let logs: GameSessionLogs = decode(&json!({"Type": "GetGameSessionLogsResponse"})).unwrap();
        assert!(logs.log_group.is_none());
    }
}
