//! Transcript
//!
//! Append-only record of a session. Turn indices equal their position, so
//! they are strictly increasing; the only mutator is `push`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::{Observation, ToolCall};

/// Kind of a transcript turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Thought,
    Action,
    Observation,
    FinalAnswer,
    HandoffRequest,
}

/// Request to move control to another agent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandoffRequest {
    /// Target agent name
    pub target: String,

    /// Context the next agent starts from
    pub summary: String,

    /// Index of the turn recording this request
    #[serde(default)]
    pub turn: Option<usize>,
}

/// What happened in a turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnPayload {
    /// Opening brief of an agent segment: the user request or a handoff summary
    Thought { text: String },

    /// Model asked for a tool
    Action {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
        call: ToolCall,
    },

    /// Tool outcome
    Observation(Observation),

    /// Validated final answer
    FinalAnswer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
        value: Value,
    },

    /// Handoff, accepted or rejected by the orchestrator
    HandoffRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
        request: HandoffRequest,
        accepted: bool,
    },
}

impl TurnPayload {
    pub fn kind(&self) -> TurnKind {
        match self {
            Self::Thought { .. } => TurnKind::Thought,
            Self::Action { .. } => TurnKind::Action,
            Self::Observation(_) => TurnKind::Observation,
            Self::FinalAnswer { .. } => TurnKind::FinalAnswer,
            Self::HandoffRequest { .. } => TurnKind::HandoffRequest,
        }
    }
}

/// One entry of the transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub index: usize,

    /// Agent that was active when the turn was recorded
    pub agent: String,

    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub payload: TurnPayload,
}

impl Turn {
    pub fn kind(&self) -> TurnKind {
        self.payload.kind()
    }
}

/// Ordered, append-only sequence of turns for one session
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Turn>", into = "Vec<Turn>")]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next pushed turn will receive
    pub fn next_index(&self) -> usize {
        self.turns.len()
    }

    /// Append a turn and return its index
    pub fn push(&mut self, agent: impl Into<String>, payload: TurnPayload) -> usize {
        let index = self.next_index();
        self.turns.push(Turn {
            index,
            agent: agent.into(),
            timestamp: Utc::now(),
            payload,
        });
        index
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of turns of a given kind
    pub fn count(&self, kind: TurnKind) -> usize {
        self.turns.iter().filter(|t| t.kind() == kind).count()
    }

    /// Turns of the current agent: everything after the last accepted handoff
    pub fn active_segment(&self) -> &[Turn] {
        let start = self
            .turns
            .iter()
            .rposition(|t| matches!(t.payload, TurnPayload::HandoffRequest { accepted: true, .. }))
            .map_or(0, |i| i + 1);
        &self.turns[start..]
    }
}

impl TryFrom<Vec<Turn>> for Transcript {
    type Error = String;

    fn try_from(turns: Vec<Turn>) -> std::result::Result<Self, Self::Error> {
        if let Some(turn) = turns.iter().enumerate().find(|(i, t)| t.index != *i) {
            return Err(format!(
                "transcript turn at position {} has index {}",
                turn.0, turn.1.index
            ));
        }
        check_pairing(&turns)?;
        Ok(Self { turns })
    }
}

/// Each Observation directly follows the Action with the same call id, and
/// each Action is answered by the next turn. Only the final turn may be an
/// unanswered Action.
fn check_pairing(turns: &[Turn]) -> std::result::Result<(), String> {
    for (i, turn) in turns.iter().enumerate() {
        match &turn.payload {
            TurnPayload::Observation(observation) => {
                let answered = i
                    .checked_sub(1)
                    .and_then(|prev| turns.get(prev))
                    .and_then(|prev| match &prev.payload {
                        TurnPayload::Action { call, .. } => Some(call.id.as_str()),
                        _ => None,
                    });
                if answered != Some(observation.call_id.as_str()) {
                    return Err(format!(
                        "observation at turn {} does not follow action '{}'",
                        i, observation.call_id
                    ));
                }
            }
            TurnPayload::Action { call, .. } => match turns.get(i + 1).map(|next| &next.payload) {
                None | Some(TurnPayload::Observation(_)) => {}
                Some(_) => {
                    return Err(format!(
                        "action '{}' at turn {} has no observation",
                        call.id, i
                    ));
                }
            },
            _ => {}
        }
    }
    Ok(())
}

impl From<Transcript> for Vec<Turn> {
    fn from(transcript: Transcript) -> Self {
        transcript.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_indices_follow_positions() {
        let mut transcript = Transcript::new();
        let first = transcript.push("Router", TurnPayload::Thought { text: "hi".into() });
        let second = transcript.push(
            "Router",
            TurnPayload::FinalAnswer {
                thought: None,
                value: json!("hello"),
            },
        );

        assert_eq!((first, second), (0, 1));
        assert!(transcript.turns().windows(2).all(|w| w[0].index < w[1].index));
        assert_eq!(transcript.count(TurnKind::FinalAnswer), 1);
    }

    #[test]
    fn test_active_segment_starts_after_accepted_handoff() {
        let mut transcript = Transcript::new();
        transcript.push("Router", TurnPayload::Thought { text: "task".into() });
        transcript.push(
            "Router",
            TurnPayload::HandoffRequest {
                thought: None,
                request: HandoffRequest {
                    target: "ResearchAgent".into(),
                    summary: "find it".into(),
                    turn: Some(1),
                },
                accepted: true,
            },
        );
        transcript.push("ResearchAgent", TurnPayload::Thought { text: "find it".into() });

        let segment = transcript.active_segment();
        assert_eq!(segment.len(), 1);
        assert_eq!(segment[0].agent, "ResearchAgent");
    }

    #[test]
    fn test_serde_round_trip_keeps_order_and_rejects_gaps() {
        let mut transcript = Transcript::new();
        transcript.push("A", TurnPayload::Thought { text: "x".into() });
        transcript.push("A", TurnPayload::Thought { text: "y".into() });

        let encoded = serde_json::to_value(&transcript).unwrap();
        assert_eq!(encoded[0]["kind"], "thought");
        let decoded: Transcript = serde_json::from_value(encoded.clone()).unwrap();
        assert_eq!(decoded, transcript);

        let mut tampered = encoded;
        tampered[1]["index"] = json!(7);
        assert!(serde_json::from_value::<Transcript>(tampered).is_err());
    }

    #[test]
    fn test_observations_must_answer_their_action() {
        let call = ToolCall::new("calculator", json!({"expression": "1 + 1"}));
        let mut transcript = Transcript::new();
        transcript.push("A", TurnPayload::Thought { text: "add".into() });
        transcript.push(
            "A",
            TurnPayload::Action {
                thought: None,
                call: call.clone(),
            },
        );
        transcript.push("A", TurnPayload::Observation(Observation::success(&call, json!(2.0), 1)));

        let encoded = serde_json::to_value(&transcript).unwrap();
        assert!(serde_json::from_value::<Transcript>(encoded.clone()).is_ok());

        // Observation answering some other call
        let mut foreign = encoded.clone();
        foreign[2]["call_id"] = json!("someone-else");
        assert!(serde_json::from_value::<Transcript>(foreign).is_err());

        // Observation with no action before it
        let mut orphan = encoded.clone();
        orphan[1] = json!({"index": 1, "agent": "A", "timestamp": encoded[1]["timestamp"], "kind": "thought", "text": "x"});
        assert!(serde_json::from_value::<Transcript>(orphan).is_err());

        // Action followed by something other than its observation
        let mut unanswered = encoded.clone();
        unanswered[2] = json!({"index": 2, "agent": "A", "timestamp": encoded[2]["timestamp"], "kind": "final_answer", "value": "2"});
        assert!(serde_json::from_value::<Transcript>(unanswered).is_err());

        // A trailing action is still in flight
        let mut in_flight = encoded;
        in_flight.as_array_mut().unwrap().pop();
        assert!(serde_json::from_value::<Transcript>(in_flight).is_ok());
    }
}
