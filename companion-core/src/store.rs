//! Read-only access to entity snapshots.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    Appointment, Dose, FamilyMember, HealthDevice, Medication, Message, Reading, SymptomLog,
};
use crate::query::{Query, Timestamped};
use crate::MetricsError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Reading,
    Dose,
    Medication,
    Appointment,
    Message,
    FamilyMember,
    Device,
    SymptomLog,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 8] = [
        EntityCategory::Reading,
        EntityCategory::Dose,
        EntityCategory::Medication,
        EntityCategory::Appointment,
        EntityCategory::Message,
        EntityCategory::FamilyMember,
        EntityCategory::Device,
        EntityCategory::SymptomLog,
    ];

    pub fn from_kind(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Reading => "reading",
            EntityCategory::Dose => "dose",
            EntityCategory::Medication => "medication",
            EntityCategory::Appointment => "appointment",
            EntityCategory::Message => "message",
            EntityCategory::FamilyMember => "family_member",
            EntityCategory::Device => "device",
            EntityCategory::SymptomLog => "symptom_log",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any record the store can hold, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Reading(Reading),
    Dose(Dose),
    Medication(Medication),
    Appointment(Appointment),
    Message(Message),
    FamilyMember(FamilyMember),
    Device(HealthDevice),
    SymptomLog(SymptomLog),
}

impl Entity {
    pub fn category(&self) -> EntityCategory {
        match self {
            Entity::Reading(_) => EntityCategory::Reading,
            Entity::Dose(_) => EntityCategory::Dose,
            Entity::Medication(_) => EntityCategory::Medication,
            Entity::Appointment(_) => EntityCategory::Appointment,
            Entity::Message(_) => EntityCategory::Message,
            Entity::FamilyMember(_) => EntityCategory::FamilyMember,
            Entity::Device(_) => EntityCategory::Device,
            Entity::SymptomLog(_) => EntityCategory::SymptomLog,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entity::Reading(reading) => &reading.id,
            Entity::Dose(dose) => &dose.id,
            Entity::Medication(medication) => &medication.id,
            Entity::Appointment(appointment) => &appointment.id,
            Entity::Message(message) => &message.id,
            Entity::FamilyMember(member) => &member.id,
            Entity::Device(device) => &device.id,
            Entity::SymptomLog(log) => &log.id,
        }
    }
}

impl Timestamped for Entity {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Entity::Reading(reading) => reading.timestamp(),
            Entity::Dose(dose) => dose.timestamp(),
            Entity::Medication(_) => None,
            Entity::Appointment(appointment) => appointment.timestamp(),
            Entity::Message(message) => message.timestamp(),
            Entity::FamilyMember(member) => member.timestamp(),
            Entity::Device(device) => device.timestamp(),
            Entity::SymptomLog(log) => log.timestamp(),
        }
    }
}

/// Snapshot source for views. Implementations may be backed by a database,
/// a cache or a remote service; every accessor returns records in insertion
/// order.
pub trait EntityStore {
    fn readings(&self) -> Vec<Reading>;
    fn doses(&self) -> Vec<Dose>;
    fn medications(&self) -> Vec<Medication>;
    fn appointments(&self) -> Vec<Appointment>;
    fn messages(&self) -> Vec<Message>;
    fn family_members(&self) -> Vec<FamilyMember>;
    fn devices(&self) -> Vec<HealthDevice>;
    fn symptom_logs(&self) -> Vec<SymptomLog>;

    /// Entities of one category matching `query`.
    fn fetch_entities(&self, category: EntityCategory, query: &Query<'_, Entity>) -> Vec<Entity> {
        let entities: Vec<Entity> = match category {
            EntityCategory::Reading => self.readings().into_iter().map(Entity::Reading).collect(),
            EntityCategory::Dose => self.doses().into_iter().map(Entity::Dose).collect(),
            EntityCategory::Medication => self
                .medications()
                .into_iter()
                .map(Entity::Medication)
                .collect(),
            EntityCategory::Appointment => self
                .appointments()
                .into_iter()
                .map(Entity::Appointment)
                .collect(),
            EntityCategory::Message => self.messages().into_iter().map(Entity::Message).collect(),
            EntityCategory::FamilyMember => self
                .family_members()
                .into_iter()
                .map(Entity::FamilyMember)
                .collect(),
            EntityCategory::Device => self.devices().into_iter().map(Entity::Device).collect(),
            EntityCategory::SymptomLog => self
                .symptom_logs()
                .into_iter()
                .map(Entity::SymptomLog)
                .collect(),
        };
        entities.into_iter().filter(|e| query.matches(e)).collect()
    }
}

/// Store kept entirely in memory. Ids are unique per category.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    readings: Vec<Reading>,
    doses: Vec<Dose>,
    medications: Vec<Medication>,
    appointments: Vec<Appointment>,
    messages: Vec<Message>,
    family_members: Vec<FamilyMember>,
    devices: Vec<HealthDevice>,
    symptom_logs: Vec<SymptomLog>,
    ids: HashSet<(EntityCategory, String)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities<I>(entities: I) -> Result<Self, MetricsError>
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut store = Self::new();
        for entity in entities {
            store.insert(entity)?;
        }
        Ok(store)
    }

    pub fn insert(&mut self, entity: Entity) -> Result<(), MetricsError> {
        let key = (entity.category(), entity.id().to_string());
        if self.ids.contains(&key) {
            return Err(MetricsError::DuplicateId {
                category: key.0,
                id: key.1,
            });
        }
        self.ids.insert(key);

        match entity {
            Entity::Reading(reading) => self.readings.push(reading),
            Entity::Dose(dose) => self.doses.push(dose),
            Entity::Medication(medication) => self.medications.push(medication),
            Entity::Appointment(appointment) => self.appointments.push(appointment),
            Entity::Message(message) => self.messages.push(message),
            Entity::FamilyMember(member) => self.family_members.push(member),
            Entity::Device(device) => self.devices.push(device),
            Entity::SymptomLog(log) => self.symptom_logs.push(log),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Latest timestamp across all entities.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        let readings = self.readings.iter().filter_map(Timestamped::timestamp);
        let doses = self.doses.iter().filter_map(Timestamped::timestamp);
        let appointments = self.appointments.iter().filter_map(Timestamped::timestamp);
        let messages = self.messages.iter().filter_map(Timestamped::timestamp);
        let members = self.family_members.iter().filter_map(Timestamped::timestamp);
        let devices = self.devices.iter().filter_map(Timestamped::timestamp);
        let logs = self.symptom_logs.iter().filter_map(Timestamped::timestamp);

        readings
            .chain(doses)
            .chain(appointments)
            .chain(messages)
            .chain(members)
            .chain(devices)
            .chain(logs)
            .max()
    }
}

impl EntityStore for InMemoryStore {
    fn readings(&self) -> Vec<Reading> {
        self.readings.clone()
    }

    fn doses(&self) -> Vec<Dose> {
        self.doses.clone()
    }

    fn medications(&self) -> Vec<Medication> {
        self.medications.clone()
    }

    fn appointments(&self) -> Vec<Appointment> {
        self.appointments.clone()
    }

    fn messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    fn family_members(&self) -> Vec<FamilyMember> {
        self.family_members.clone()
    }

    fn devices(&self) -> Vec<HealthDevice> {
        self.devices.clone()
    }

    fn symptom_logs(&self) -> Vec<SymptomLog> {
        self.symptom_logs.clone()
    }
}
