//! User actions as values. This crate only validates them; performing the
//! mutation is up to an external [`CommandHandler`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::metrics::MoodScore;
use crate::model::{AccessLevel, MetricType, ReadingValue};
use crate::MetricsError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub reminder_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReading {
    pub metric_type: MetricType,
    pub value: ReadingValue,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSymptomLog {
    pub mood: u8,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewFamilyMember {
    pub name: String,
    pub relationship: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub access_level: AccessLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Command {
    MarkDoseTaken {
        dose_id: String,
        taken_at: DateTime<Utc>,
    },
    AddMedication(NewMedication),
    ToggleReminder {
        medication_id: String,
    },
    AddReading(NewReading),
    LogSymptoms(NewSymptomLog),
    SendMessage {
        recipient: String,
        body: String,
    },
    InviteFamilyMember(NewFamilyMember),
    RemoveFamilyMember {
        member_id: String,
    },
    ToggleMemberAccess {
        member_id: String,
    },
    UpdateSecurity {
        enabled: bool,
        #[serde(default)]
        pin: String,
        #[serde(default)]
        confirm_pin: String,
    },
    ConnectDevice {
        device_id: String,
    },
    SyncDevice {
        device_id: String,
    },
}

const MIN_PIN_LENGTH: usize = 4;

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::MarkDoseTaken { .. } => "mark_dose_taken",
            Command::AddMedication(_) => "add_medication",
            Command::ToggleReminder { .. } => "toggle_reminder",
            Command::AddReading(_) => "add_reading",
            Command::LogSymptoms(_) => "log_symptoms",
            Command::SendMessage { .. } => "send_message",
            Command::InviteFamilyMember(_) => "invite_family_member",
            Command::RemoveFamilyMember { .. } => "remove_family_member",
            Command::ToggleMemberAccess { .. } => "toggle_member_access",
            Command::UpdateSecurity { .. } => "update_security",
            Command::ConnectDevice { .. } => "connect_device",
            Command::SyncDevice { .. } => "sync_device",
        }
    }

    /// Checks the payload before it leaves the device.
    pub fn validate(&self) -> Result<(), MetricsError> {
        match self {
            Command::MarkDoseTaken { dose_id, .. } => require("dose id", dose_id),
            Command::AddMedication(medication) => {
                require("medication name", &medication.name)?;
                require("dosage", &medication.dosage)
            }
            Command::ToggleReminder { medication_id } => require("medication id", medication_id),
            Command::AddReading(reading) => {
                if reading.value.is_finite() {
                    Ok(())
                } else {
                    Err(MetricsError::InvalidCommand(format!(
                        "{} value must be a finite number",
                        reading.metric_type.label()
                    )))
                }
            }
            Command::LogSymptoms(log) => MoodScore::new(log.mood).map(|_| ()),
            Command::SendMessage { recipient, body } => {
                require("recipient", recipient)?;
                require("message body", body)
            }
            Command::InviteFamilyMember(member) => {
                require("name", &member.name)?;
                require("relationship", &member.relationship)?;
                require("email", &member.email)
            }
            Command::RemoveFamilyMember { member_id }
            | Command::ToggleMemberAccess { member_id } => require("member id", member_id),
            Command::UpdateSecurity {
                enabled,
                pin,
                confirm_pin,
            } => {
                if !enabled {
                    return Ok(());
                }
                if pin != confirm_pin {
                    return Err(MetricsError::InvalidCommand(
                        "PIN codes do not match".to_string(),
                    ));
                }
                if pin.len() < MIN_PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
                    return Err(MetricsError::InvalidCommand(format!(
                        "PIN must be at least {MIN_PIN_LENGTH} digits long"
                    )));
                }
                Ok(())
            }
            Command::ConnectDevice { device_id } | Command::SyncDevice { device_id } => {
                require("device id", device_id)
            }
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), MetricsError> {
    if value.trim().is_empty() {
        Err(MetricsError::InvalidCommand(format!("missing {field}")))
    } else {
        Ok(())
    }
}

/// What the handler did with a command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Accepted { message: String },
    Rejected { reason: String },
}

impl CommandOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandOutcome::Accepted { .. })
    }
}

/// Performs commands on behalf of the presentation layer (persistence,
/// messaging, device pairing).
pub trait CommandHandler {
    fn submit(&mut self, command: Command) -> CommandOutcome;
}

/// Validates `command` and hands it to `handler`. Invalid commands never
/// reach the handler.
pub fn dispatch<H>(handler: &mut H, command: Command) -> Result<CommandOutcome, MetricsError>
where
    H: CommandHandler + ?Sized,
{
    let kind = command.kind();
    if let Err(err) = command.validate() {
        warn!(kind, error = %err, "command failed validation");
        return Err(err);
    }

    let outcome = handler.submit(command);
    info!(kind, accepted = outcome.is_accepted(), "command submitted");
    Ok(outcome)
}
