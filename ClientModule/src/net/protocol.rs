//! # SpacetimeDB JSON Protocol
//!
//! Encoding of the messages this client sends and decoding of the server
//! messages it understands, for the `v1.json.spacetimedb` subprotocol.
//! Server messages the client has no use for decode to
//! [`ServerMessage::Ignored`].

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use rpg_shared::{normalize_identity, Character, CharacterAppearance, Session, Table, User};

use crate::error::{ClientError, ClientResult};
use crate::events::{RowDiff, TableChange};

/// Messages sent to the server. Serializes in serde's external tagging,
/// e.g. `{"CallReducer": {...}}`, which is the shape the server expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClientMessage {
    CallReducer {
        reducer: String,
        /// Positional arguments as a JSON array, encoded as a string
        args: String,
        request_id: u32,
        flags: u8,
    },
    Subscribe {
        query_strings: Vec<String>,
        request_id: u32,
    },
}

impl ClientMessage {
    pub fn to_json(&self) -> ClientResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Outcome of a reducer transaction
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStatus {
    Committed(Vec<TableChange>),
    Failed(String),
    OutOfEnergy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    pub status: UpdateStatus,
    pub caller_identity: Option<String>,
    pub reducer_name: String,
    pub request_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    IdentityToken { identity: String, token: String },
    InitialSubscription { changes: Vec<TableChange> },
    TransactionUpdate(TransactionUpdate),
    /// A message kind this client does not handle
    Ignored(String),
}

impl ServerMessage {
    pub fn decode(text: &str) -> ClientResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let object = value
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| ClientError::Protocol("expected a single-key message object".to_string()))?;
        let (kind, body) = match object.iter().next() {
            Some(entry) => entry,
            None => return Err(ClientError::Protocol("empty message".to_string())),
        };

        match kind.as_str() {
            "IdentityToken" => Ok(ServerMessage::IdentityToken {
                identity: body
                    .get("identity")
                    .and_then(identity_of)
                    .ok_or_else(|| ClientError::Protocol("IdentityToken without identity".to_string()))?,
                token: body
                    .get("token")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "InitialSubscription" => Ok(ServerMessage::InitialSubscription {
                changes: decode_tables(body.pointer("/database_update/tables"))?,
            }),
            "TransactionUpdate" => decode_transaction(body).map(ServerMessage::TransactionUpdate),
            other => Ok(ServerMessage::Ignored(other.to_string())),
        }
    }
}

/// Identity hex from either a bare string or `{"__identity__": "0x…"}`
pub fn identity_of(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("__identity__")?.as_str()?,
        _ => return None,
    };
    Some(canonical_identity(raw))
}

/// Lowercase hex without prefix, checked as a 256-bit identity when possible
pub fn canonical_identity(raw: &str) -> String {
    let hex = normalize_identity(raw);
    match spacetimedb_sdk::Identity::from_hex(&hex) {
        Ok(identity) => identity.to_hex().to_string(),
        Err(_) => hex,
    }
}

fn decode_transaction(body: &Value) -> ClientResult<TransactionUpdate> {
    let status = match body.get("status") {
        Some(Value::Object(map)) => {
            if let Some(committed) = map.get("Committed") {
                UpdateStatus::Committed(decode_tables(committed.get("tables"))?)
            } else if let Some(failed) = map.get("Failed") {
                UpdateStatus::Failed(
                    failed
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| failed.to_string()),
                )
            } else if map.contains_key("OutOfEnergy") {
                UpdateStatus::OutOfEnergy
            } else {
                return Err(ClientError::Protocol("unknown transaction status".to_string()));
            }
        }
        Some(Value::String(s)) if s == "OutOfEnergy" => UpdateStatus::OutOfEnergy,
        _ => return Err(ClientError::Protocol("transaction without status".to_string())),
    };

    let reducer_call = body.get("reducer_call");
    Ok(TransactionUpdate {
        status,
        caller_identity: body.get("caller_identity").and_then(identity_of),
        reducer_name: reducer_call
            .and_then(|call| call.get("reducer_name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        request_id: reducer_call
            .and_then(|call| call.get("request_id"))
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok()),
    })
}

fn decode_tables(tables: Option<&Value>) -> ClientResult<Vec<TableChange>> {
    let tables = match tables.and_then(Value::as_array) {
        Some(tables) => tables,
        None => return Ok(Vec::new()),
    };

    let mut changes = Vec::new();
    for table in tables {
        let name = table.get("table_name").and_then(Value::as_str).unwrap_or_default();
        let table_kind = match name.parse::<Table>() {
            Ok(kind) => kind,
            Err(_) => {
                warn!("Skipping update for unknown table '{}'", name);
                continue;
            }
        };
        let updates = table
            .get("updates")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let change = match table_kind {
            Table::User => TableChange::User(merge_updates::<User>(updates)?),
            Table::Character => TableChange::Character(merge_updates::<Character>(updates)?),
            Table::CharacterAppearance => {
                TableChange::CharacterAppearance(merge_updates::<CharacterAppearance>(updates)?)
            }
            Table::Session => TableChange::Session(merge_updates::<Session>(updates)?),
        };
        if !change.is_empty() {
            changes.push(change);
        }
    }
    Ok(changes)
}

/// Fold every query update of one table into a single diff
fn merge_updates<T: DeserializeOwned>(updates: &[Value]) -> ClientResult<RowDiff<T>> {
    let mut diff = RowDiff::default();
    for update in updates {
        diff.deletes.extend(decode_rows(update.get("deletes"))?);
        diff.inserts.extend(decode_rows(update.get("inserts"))?);
    }
    Ok(diff)
}

/// Rows may arrive as JSON values or as JSON text inside a string
fn decode_rows<T: DeserializeOwned>(rows: Option<&Value>) -> ClientResult<Vec<T>> {
    let rows = match rows.and_then(Value::as_array) {
        Some(rows) => rows,
        None => return Ok(Vec::new()),
    };
    rows.iter()
        .map(|row| match row {
            Value::String(text) => serde_json::from_str(text).map_err(ClientError::from),
            other => serde_json::from_value(other.clone()).map_err(ClientError::from),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reducer_call_uses_external_tagging() {
        let message = ClientMessage::CallReducer {
            reducer: "login".to_string(),
            args: "[3]".to_string(),
            request_id: 9,
            flags: 0,
        };
        let value: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"CallReducer": {"reducer": "login", "args": "[3]", "request_id": 9, "flags": 0}})
        );
    }

    #[test]
    fn identity_token_is_normalized() {
        let text = r#"{"IdentityToken":{"identity":{"__identity__":"0xABCD"},"token":"tok"}}"#;
        match ServerMessage::decode(text).unwrap() {
            ServerMessage::IdentityToken { identity, token } => {
                assert!(identity.ends_with("abcd"));
                assert!(!identity.starts_with("0x"));
                assert_eq!(token, "tok");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn initial_subscription_accepts_string_and_array_rows() {
        let text = json!({
            "InitialSubscription": {
                "database_update": {"tables": [{
                    "table_id": 4096,
                    "table_name": "character",
                    "num_rows": 2,
                    "updates": [{
                        "deletes": [],
                        "inserts": [
                            "[1,\"aa\",\"Aria\",\"mage\",1,1.0,2.0,\"down\",0,0]",
                            [2, "aa", "Borin", "warrior", 1, 3.0, 4.0, "up", 0, 0]
                        ]
                    }]
                }]},
                "request_id": 1,
                "total_host_execution_duration_micros": 10
            }
        })
        .to_string();

        match ServerMessage::decode(&text).unwrap() {
            ServerMessage::InitialSubscription { changes } => {
                assert_eq!(changes.len(), 1);
                match &changes[0] {
                    TableChange::Character(diff) => {
                        assert_eq!(diff.inserts.len(), 2);
                        assert_eq!(diff.inserts[1].name, "Borin");
                    }
                    other => panic!("unexpected change {:?}", other),
                }
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn failed_transaction_carries_the_message() {
        let text = json!({
            "TransactionUpdate": {
                "status": {"Failed": "Character name already taken"},
                "caller_identity": {"__identity__": "0x01"},
                "reducer_call": {"reducer_name": "create_character", "reducer_id": 2, "args": "[]", "request_id": 5},
                "timestamp": {"__timestamp_micros_since_unix_epoch__": 0}
            }
        })
        .to_string();

        match ServerMessage::decode(&text).unwrap() {
            ServerMessage::TransactionUpdate(update) => {
                assert_eq!(
                    update.status,
                    UpdateStatus::Failed("Character name already taken".to_string())
                );
                assert_eq!(update.request_id, Some(5));
                assert_eq!(update.reducer_name, "create_character");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn unknown_messages_are_ignored() {
        let message = ServerMessage::decode(r#"{"OneOffQueryResponse":{}}"#).unwrap();
        assert_eq!(message, ServerMessage::Ignored("OneOffQueryResponse".to_string()));
        assert!(ServerMessage::decode("[]").is_err());
    }
}
