//! Canned backend used by `--offline` mode.
//!
//! Answers every request with plausible data so the console can be explored
//! without a live fleet. Mutating requests (capacity updates, rule sets,
//! virtual players, purge) change the in-memory state.

use std::cell::RefCell;
use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use super::protocol::{Inbound, LocationCapacity, Request};

struct DemoState {
    capacity: BTreeMap<String, Vec<LocationCapacity>>,
    rule_sets: BTreeMap<String, String>,
    tasks: Vec<String>,
}

pub struct DemoBackend {
    state: RefCell<DemoState>,
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoBackend {
    pub fn new() -> Self {
        let mut capacity = BTreeMap::new();
        for fleet in ["fleet-demo-1", "fleet-demo-2"] {
            capacity.insert(
                fleet.to_string(),
                vec![location("us-west-2", 2, 1, 4), location("eu-west-1", 1, 0, 2)],
            );
        }

        let mut rule_sets = BTreeMap::new();
        rule_sets.insert(
            "two-teams".to_string(),
            json!({
                "ruleLanguageVersion": "1.0",
                "teams": [
                    {"name": "red", "minPlayers": 2, "maxPlayers": 4},
                    {"name": "blue", "minPlayers": 2, "maxPlayers": 4}
                ]
            })
            .to_string(),
        );

        Self {
            state: RefCell::new(DemoState {
                capacity,
                rule_sets,
                tasks: Vec::new(),
            }),
        }
    }

    pub fn respond(&self, request: &Request) -> Vec<Inbound> {
        let body = self.body_for(request);
        let mut payload = json!({ "Type": request.response_event() });
        if let (Some(target), Value::Object(fields)) = (payload.as_object_mut(), body) {
            target.extend(fields);
        }
        vec![Inbound::new(request.response_event(), payload)]
    }

    fn body_for(&self, request: &Request) -> Value {
        let mut state = self.state.borrow_mut();
        match request {
            Request::GetFleets => json!({
                "Fleets": [
                    demo_fleet("fleet-demo-1", "Arena", "ACTIVE", 3),
                    demo_fleet("fleet-demo-2", "Battle Royale", "ACTIVE", 1),
                    demo_fleet("fleet-demo-3", "Staging", "ACTIVATING", 0),
                ]
            }),
            Request::GetQueues => json!({
                "Queues": [{
                    "Name": "demo-queue",
                    "QueueArn": "arn:aws:gamelift:us-west-2::gamesessionqueue/demo-queue",
                    "TimeoutInSeconds": 60,
                    "Destinations": [
                        {"DestinationArn": "arn:aws:gamelift:us-west-2::fleet/fleet-demo-1"},
                        {"DestinationArn": "arn:aws:gamelift:us-west-2::fleet/fleet-demo-2"}
                    ]
                }]
            }),
            Request::GetMatchmakingConfigurations => json!({
                "Configurations": [{
                    "Name": "demo-matchmaker",
                    "RuleSetName": "two-teams",
                    "RequestTimeoutSeconds": 120,
                    "AcceptanceRequired": false,
                    "GameSessionQueueArns": ["arn:aws:gamelift:us-west-2::gamesessionqueue/demo-queue"]
                }]
            }),
            Request::GetFleetScaling { fleet_id } => json!({
                "FleetId": fleet_id,
                "Locations": state.capacity.get(fleet_id).cloned().unwrap_or_default(),
            }),
            Request::UpdateFleetCapacity {
                fleet_id,
                location: name,
                desired_instances,
                min_size,
                max_size,
            } => {
                let Some(locations) = state.capacity.get_mut(fleet_id) else {
                    return json!({ "Errors": [format!("Fleet {} not found", fleet_id)] });
                };
                match locations.iter_mut().find(|l| &l.location == name) {
                    Some(loc) => {
                        loc.desired_instances = *desired_instances;
                        loc.min_size = *min_size;
                        loc.max_size = *max_size;
                        loc.active = *desired_instances;
                        json!({ "Errors": [] })
                    }
                    None => json!({ "Errors": [format!("Location {} not found", name)] }),
                }
            }
            Request::GetFleetEvents { fleet_id } => {
                let now = Utc::now();
                json!({
                    "FleetId": fleet_id,
                    "Events": [
                        {"EventTime": now - Duration::minutes(42), "EventCode": "FLEET_CREATED", "Message": "Fleet created"},
                        {"EventTime": now - Duration::minutes(30), "EventCode": "FLEET_STATE_ACTIVE", "Message": "Fleet is active"},
                        {"EventTime": now - Duration::minutes(5), "EventCode": "FLEET_SCALING_EVENT", "Message": "Desired capacity changed"}
                    ]
                })
            }
            Request::GetQueueEvents { queue_arn } => json!({
                "QueueArn": queue_arn,
                "Events": [
                    {"PlacementId": Uuid::new_v4().to_string(), "Status": "FULFILLED", "StartTime": Utc::now() - Duration::minutes(3)},
                    {"PlacementId": Uuid::new_v4().to_string(), "Status": "TIMED_OUT", "StartTime": Utc::now() - Duration::minutes(1)}
                ]
            }),
            Request::GetPlayerSessions { game_session_id } => json!({
                "GameSessionId": game_session_id,
                "PlayerSessions": [
                    {"PlayerSessionId": "psess-1", "PlayerId": "player-1", "Status": "ACTIVE", "IpAddress": "10.0.0.12"},
                    {"PlayerSessionId": "psess-2", "PlayerId": "player-2", "Status": "RESERVED"}
                ]
            }),
            Request::GetGameSessionLogs { game_session_id } => json!({
                "GameSessionId": game_session_id,
                "LogGroup": "/demo/game-sessions",
            }),
            Request::GetMatchmakingRuleSets => json!({
                "RuleSets": state
                    .rule_sets
                    .iter()
                    .map(|(name, body)| json!({"RuleSetName": name, "RuleSetBody": body}))
                    .collect::<Vec<_>>()
            }),
            Request::ValidateMatchmakingRuleSet { rule_set_body } => {
                match serde_json::from_str::<Value>(rule_set_body) {
                    Ok(body) if body.get("teams").is_some() => json!({ "Valid": true, "Errors": [] }),
                    Ok(_) => json!({ "Valid": false, "Errors": ["Rule set must define teams"] }),
                    Err(err) => json!({ "Valid": false, "Errors": [err.to_string()] }),
                }
            }
            Request::CreateMatchmakingRuleSet {
                rule_set_name,
                rule_set_body,
            } => {
                state
                    .rule_sets
                    .insert(rule_set_name.clone(), rule_set_body.clone());
                json!({ "Errors": [] })
            }
            Request::DeleteMatchmakingRuleSet { rule_set_name } => {
                if state.rule_sets.remove(rule_set_name).is_some() {
                    json!({ "Errors": [] })
                } else {
                    json!({ "Errors": [format!("Rule set {} not found", rule_set_name)] })
                }
            }
            Request::LaunchPlayers { num_players } => {
                for _ in 0..*num_players {
                    state
                        .tasks
                        .push(format!("arn:aws:ecs:us-west-2::task/{}", Uuid::new_v4()));
                }
                json!({ "Errors": [] })
            }
            Request::GetVirtualPlayers => json!({
                "Tasks": state
                    .tasks
                    .iter()
                    .map(|arn| json!({"TaskArn": arn, "LastStatus": "RUNNING"}))
                    .collect::<Vec<_>>()
            }),
            Request::TerminateVirtualPlayer { task_arn } => {
                state.tasks.retain(|arn| arn != task_arn);
                json!({ "Errors": [] })
            }
            Request::TerminateAllVirtualPlayers => {
                state.tasks.clear();
                json!({ "Errors": [] })
            }
            Request::PurgeData => json!({ "Errors": [] }),
        }
    }
}

fn location(name: &str, desired: u32, min: u32, max: u32) -> LocationCapacity {
    LocationCapacity {
        location: name.to_string(),
        desired_instances: desired,
        min_size: min,
        max_size: max,
        pending: 0,
        active: desired,
        idle: desired.saturating_sub(1),
    }
}

fn demo_fleet(id: &str, name: &str, status: &str, sessions: u32) -> Value {
    let game_sessions: Vec<Value> = (0..sessions)
        .map(|i| {
            json!({
                "GameSessionId": format!("gsess-{}-{}", id, i),
                "FleetId": id,
                "Status": "ACTIVE",
                "Location": "us-west-2",
                "CurrentPlayerSessionCount": 2 + i,
                "MaximumPlayerSessionCount": 8
            })
        })
        .collect();

    json!({
        "FleetId": id,
        "Name": name,
        "Status": status,
        "InstanceType": "c5.large",
        "GameSessions": game_sessions
    })
}
