use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status of a request. The wire labels are the Portuguese domain
/// terms so legacy data round-trips unchanged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    #[serde(rename = "Pendente")]
    Pending,
    #[serde(rename = "Encaminhada")]
    Forwarded,
    #[serde(rename = "Aprovada")]
    Approved,
    #[serde(rename = "Recusada")]
    Rejected,
    #[serde(rename = "Concluída")]
    Completed,
}

impl Status {
    /// Terminal statuses admit no further transition, by any role.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Rejected | Status::Completed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "Pendente",
            Status::Forwarded => "Encaminhada",
            Status::Approved => "Aprovada",
            Status::Rejected => "Recusada",
            Status::Completed => "Concluída",
        }
    }

    /// Parse a status from user input, accepting both the domain label and an
    /// English alias.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pendente" | "pending" => Some(Status::Pending),
            "encaminhada" | "forwarded" => Some(Status::Forwarded),
            "aprovada" | "approved" => Some(Status::Approved),
            "recusada" | "rejected" => Some(Status::Rejected),
            "concluída" | "concluida" | "completed" => Some(Status::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which role created the request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Origin {
    #[default]
    #[serde(rename = "Médico")]
    Doctor,
    #[serde(rename = "Supervisão")]
    Supervision,
}

impl Origin {
    /// Doctor submissions enter the queue pending review; supervisor-created
    /// requests are already forwarded (the supervisor is the forwarding role,
    /// so a separate forward step would be redundant).
    pub fn initial_status(self) -> Status {
        match self {
            Origin::Doctor => Status::Pending,
            Origin::Supervision => Status::Forwarded,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Origin::Doctor => "Médico",
            Origin::Supervision => "Supervisão",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "médico" | "medico" | "doctor" => Some(Origin::Doctor),
            "supervisão" | "supervisao" | "supervision" => Some(Origin::Supervision),
            _ => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Whether a scheduled day opens or closes the agenda.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DayKind {
    #[serde(rename = "Abertura")]
    Opening,
    #[serde(rename = "Fechamento")]
    Closing,
}

impl DayKind {
    pub fn label(self) -> &'static str {
        match self {
            DayKind::Opening => "Abertura",
            DayKind::Closing => "Fechamento",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "abertura" | "opening" => Some(DayKind::Opening),
            "fechamento" | "closing" => Some(DayKind::Closing),
            _ => None,
        }
    }
}

impl fmt::Display for DayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Agenda category a request applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgendaKind {
    #[serde(rename = "Convênio")]
    Convenio,
    #[serde(rename = "HSM+")]
    HsmPlus,
}

impl AgendaKind {
    pub fn label(self) -> &'static str {
        match self {
            AgendaKind::Convenio => "Convênio",
            AgendaKind::HsmPlus => "HSM+",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "convênio" | "convenio" => Some(AgendaKind::Convenio),
            "hsm+" | "hsm" => Some(AgendaKind::HsmPlus),
            _ => None,
        }
    }
}

impl fmt::Display for AgendaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Legacy records store times as "HH:mm"; keep writing that shape.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

/// A single day inside a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub day_type: DayKind,
}

/// One append-only execution-history record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resulting_status: Option<Status>,
}

/// A single agenda open/close change request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Stable machine identifier.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Free-text doctor name.
    pub requester: String,

    /// Agenda categories this request applies to. Legacy records may only
    /// carry the combined label; the store derives this set on load.
    #[serde(default)]
    pub agenda_types: Vec<AgendaKind>,

    /// Combined human-readable label, e.g. "Convênio + HSM+".
    #[serde(default)]
    pub agenda_type_label: String,

    /// Ordered day selection, unique by date.
    pub days: Vec<Day>,

    #[serde(default)]
    pub note: String,

    /// Set once at creation, immutable.
    pub submitted_at: DateTime<Utc>,

    #[serde(default)]
    pub status: Status,

    #[serde(default)]
    pub origin: Origin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_note: Option<String>,

    /// Opaque attachment reference (URL/data URI). Set only at submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,

    /// Human-readable identifier "N/YYYY". Absent only in legacy records;
    /// the store assigns one on load.
    #[serde(
        default,
        alias = "numeroSolicitacao",
        alias = "NumeroSolicitacao",
        alias = "numero",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_number: Option<String>,

    /// Single execution-role actor currently responsible, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_owner: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub execution_history: Vec<HistoryEntry>,
}

impl Request {
    /// Preferred display label: derived from the typed set when present,
    /// otherwise the stored legacy label.
    pub fn agenda_label(&self) -> String {
        if self.agenda_types.is_empty() {
            self.agenda_type_label.clone()
        } else {
            self.agenda_types
                .iter()
                .map(|k| k.label())
                .collect::<Vec<_>>()
                .join(" + ")
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Raised when a submission is missing a required field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
}

/// Builder for a request before submission. Day selection is unique by date:
/// setting a date twice replaces the earlier entry.
#[derive(Debug, Clone, Default)]
pub struct RequestDraft {
    pub requester: String,
    pub origin: Origin,
    pub note: String,
    pub attachment: Option<String>,
    agenda_types: Vec<AgendaKind>,
    days: Vec<Day>,
}

impl RequestDraft {
    pub fn new(requester: impl Into<String>, origin: Origin) -> Self {
        Self {
            requester: requester.into(),
            origin,
            ..Default::default()
        }
    }

    pub fn agenda_types(&self) -> &[AgendaKind] {
        &self.agenda_types
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    pub fn add_agenda_type(&mut self, kind: AgendaKind) {
        if !self.agenda_types.contains(&kind) {
            self.agenda_types.push(kind);
        }
    }

    /// Checkbox semantics: add if absent, remove if present.
    pub fn toggle_agenda_type(&mut self, kind: AgendaKind) {
        if let Some(pos) = self.agenda_types.iter().position(|k| *k == kind) {
            self.agenda_types.remove(pos);
        } else {
            self.agenda_types.push(kind);
        }
    }

    pub fn set_day(&mut self, day: Day) {
        self.days.retain(|d| d.date != day.date);
        self.days.push(day);
        self.days.sort_by_key(|d| d.date);
    }

    pub fn remove_day(&mut self, date: NaiveDate) {
        self.days.retain(|d| d.date != date);
    }

    /// Validates the draft and turns it into a request. The request number
    /// must already be reserved by the store.
    pub fn submit(
        self,
        request_number: String,
        now: DateTime<Utc>,
    ) -> Result<Request, SubmitError> {
        if self.requester.trim().is_empty() {
            return Err(SubmitError::MissingRequiredField("requester"));
        }
        if self.days.is_empty() {
            return Err(SubmitError::MissingRequiredField("days"));
        }
        if self.agenda_types.is_empty() {
            return Err(SubmitError::MissingRequiredField("agenda types"));
        }

        let agenda_type_label = self
            .agenda_types
            .iter()
            .map(|k| k.label())
            .collect::<Vec<_>>()
            .join(" + ");

        Ok(Request {
            id: Uuid::new_v4(),
            requester: self.requester,
            agenda_types: self.agenda_types,
            agenda_type_label,
            days: self.days,
            note: self.note,
            submitted_at: now,
            status: self.origin.initial_status(),
            origin: self.origin,
            supervisor_note: None,
            attachment: self.attachment,
            request_number: Some(request_number),
            execution_owner: None,
            execution_history: Vec::new(),
        })
    }
}

/// The in-memory collection of requests. Insertion order is preserved; there
/// is no delete operation in this domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestBook {
    pub requests: Vec<Request>,
}

impl RequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn get(&self, id: &Uuid) -> Option<&Request> {
        self.requests.iter().find(|r| r.id == *id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Request> {
        self.requests.iter_mut().find(|r| r.id == *id)
    }

    pub fn get_by_number(&self, number: &str) -> Option<&Request> {
        self.requests
            .iter()
            .find(|r| r.request_number.as_deref() == Some(number))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
