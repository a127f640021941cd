//! View models: what each screen displays, without the markup.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;

use crate::directory::{DirectoryListing, DirectoryRow};
use crate::models::{parse_date, Client, Session, SessionPartition, SessionStatus, SubTableKind};

const NOTES_PREVIEW_CHARS: usize = 150;
const EMPTY_CELL: &str = "-";
const NOT_AVAILABLE: &str = "N/A";

/// `2024-01-05` as `January 5, 2024`. Unparseable input is shown as-is.
pub fn format_date(value: Option<&str>) -> String {
    match value {
        None => String::new(),
        Some(v) => parse_date(v)
            .map(long_date)
            .unwrap_or_else(|| v.to_string()),
    }
}

fn long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// An RFC 3339 timestamp as `Jan 5, 2024, 09:30 AM` (UTC).
pub fn format_date_time(value: &str) -> String {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc().format("%b %-d, %Y, %I:%M %p").to_string())
        .unwrap_or_else(|_| value.to_string())
}

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient notification (toast).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

// =========================================================================
// Directory
// =========================================================================

/// A client row in the directory.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientCard {
    pub id: String,
    pub initials: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<String>,
    pub sessions: String,
}

impl From<&DirectoryRow> for ClientCard {
    fn from(row: &DirectoryRow) -> Self {
        let client = &row.client;
        Self {
            id: client.id.clone(),
            initials: client.initials(),
            name: client.name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            age: age_label(client),
            sessions: row.sessions.label(),
        }
    }
}

/// Cards for a listing; empty means the "No clients found" state.
pub fn client_cards(listing: &DirectoryListing) -> Vec<ClientCard> {
    listing.rows.iter().map(ClientCard::from).collect()
}

fn age_label(client: &Client) -> Option<String> {
    client.age.filter(|&a| a > 0).map(|a| format!("{a} years"))
}

// =========================================================================
// Client detail
// =========================================================================

/// A label/value pair.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DetailRow {
    pub label: String,
    pub value: String,
}

impl DetailRow {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

fn optional_row(rows: &mut Vec<DetailRow>, label: &str, value: Option<&str>) {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
        rows.push(DetailRow::new(label, v));
    }
}

/// Client detail page.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetailView {
    pub name: String,
    pub contact: Vec<DetailRow>,
    pub personal: Vec<DetailRow>,
    pub intake_prompt: String,
    pub pending_header: Option<String>,
    pub pending: Vec<PendingCard>,
    pub sessions: Vec<SessionCard>,
}

impl ClientDetailView {
    pub fn new(client: &Client, partition: &SessionPartition) -> Self {
        let mut contact = vec![
            DetailRow::new("Email", client.email.as_deref().unwrap_or(NOT_AVAILABLE)),
            DetailRow::new("Phone", client.phone.as_deref().unwrap_or(NOT_AVAILABLE)),
        ];
        if let Some(address) = client.address_line() {
            contact.push(DetailRow::new("Address", address));
        }

        let mut personal = Vec::new();
        if let Some(age) = age_label(client) {
            personal.push(DetailRow::new("Age", age));
        }
        if client.dob.is_some() {
            personal.push(DetailRow::new("Date of Birth", format_date(client.dob.as_deref())));
        }
        optional_row(&mut personal, "Occupation", client.occupation.as_deref());
        optional_row(&mut personal, "Referred By", client.referred_by.as_deref());
        optional_row(&mut personal, "M.D.", client.md.as_deref());

        Self {
            name: client.name.clone(),
            contact,
            personal,
            intake_prompt: format!(
                "Send this link to {} so they can fill out their intake form before their appointment.",
                client.name
            ),
            pending_header: (!partition.pending.is_empty())
                .then(|| format!("Pending Client Submissions ({})", partition.pending.len())),
            pending: partition.pending.iter().map(PendingCard::from).collect(),
            sessions: partition.approved.iter().map(SessionCard::from).collect(),
        }
    }

    /// True when the "No approved sessions yet" state applies.
    pub fn has_no_sessions(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn complaints_summary(session: &Session) -> Option<String> {
    let names = session.complaint_names();
    (!names.is_empty()).then(|| names.join(", "))
}

/// An approved session in the client's history.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionCard {
    pub id: String,
    pub title: String,
    pub practitioner: Option<String>,
    pub complaints: Option<String>,
    pub notes_preview: Option<String>,
}

impl From<&Session> for SessionCard {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            title: format!("Session: {}", format_date(session.fields.date.as_deref())),
            practitioner: session.fields.practitioner.clone(),
            complaints: complaints_summary(session),
            notes_preview: session.fields.notes.as_deref().map(notes_preview),
        }
    }
}

fn notes_preview(notes: &str) -> String {
    let mut preview: String = notes.chars().take(NOTES_PREVIEW_CHARS).collect();
    if notes.chars().count() > NOTES_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

/// A client submission awaiting review, with approve/reject actions.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingCard {
    pub id: String,
    pub appointment: String,
    pub submitted: String,
    pub complaints: Option<String>,
}

impl From<&Session> for PendingCard {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            appointment: format!("Appointment: {}", format_date(session.fields.date.as_deref())),
            submitted: format!("Submitted: {}", format_date_time(&session.created_at)),
            complaints: complaints_summary(session),
        }
    }
}

// =========================================================================
// Session detail
// =========================================================================

/// Status badge.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusBadge {
    pub label: String,
    pub pending: bool,
}

impl From<SessionStatus> for StatusBadge {
    fn from(status: SessionStatus) -> Self {
        Self {
            label: status.label().to_string(),
            pending: status.is_pending(),
        }
    }
}

/// Body of a detail section.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SectionContent {
    Rows { rows: Vec<DetailRow> },
    Table { headings: Vec<String>, rows: Vec<Vec<String>> },
}

/// A titled block on the session detail page.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DetailSection {
    pub title: String,
    pub content: SectionContent,
}

/// A stored signature with its timestamp line.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureBlock {
    pub label: String,
    pub data_uri: String,
    pub signed: String,
}

/// Session detail page.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetailView {
    pub title: String,
    pub info: Vec<DetailRow>,
    pub status: StatusBadge,
    pub sections: Vec<DetailSection>,
    pub signatures: Vec<SignatureBlock>,
    /// Show approve and reject actions
    pub reviewable: bool,
}

impl SessionDetailView {
    pub fn new(session: &Session, client_name: Option<&str>) -> Self {
        let fields = &session.fields;
        let date = format_date(fields.date.as_deref());

        let mut info = vec![
            DetailRow::new("Client", client_name.unwrap_or("Unknown Client")),
            DetailRow::new("Date", date.clone()),
        ];
        optional_row(&mut info, "Practitioner", fields.practitioner.as_deref());

        let mut sections = Vec::new();
        push_table(&mut sections, session, SubTableKind::Complaints);
        push_rows(
            &mut sections,
            "Pain & Injury Details",
            &[
                ("What aggravates pain?", fields.aggravates.as_deref()),
                ("Are you experiencing any swelling? Where?", fields.swelling.as_deref()),
                ("Indicate injury site and areas of pain", fields.injury_site.as_deref()),
            ],
        );
        push_table(&mut sections, session, SubTableKind::Medications);
        push_table(&mut sections, session, SubTableKind::Healthcare);
        push_table(&mut sections, session, SubTableKind::Therapies);
        push_rows(
            &mut sections,
            "Medical History",
            &[(
                "Do you have a pacemaker or any implants including orthotics?",
                fields.implants.as_deref(),
            )],
        );
        push_table(&mut sections, session, SubTableKind::Injuries);
        push_table(&mut sections, session, SubTableKind::Operations);
        push_rows(
            &mut sections,
            "Lifestyle & Additional Information",
            &[
                ("What exercise(s) do you do, how much, and how often?", fields.exercise.as_deref()),
                ("Have you been treated with Bowen before?", fields.bowen_history.as_deref()),
                ("Is there anything you would like to add?", fields.additional.as_deref()),
            ],
        );
        push_rows(&mut sections, "Therapist Notes", &[("", fields.notes.as_deref())]);

        let mut signatures = Vec::new();
        if let Some(uri) = fields.client_signature.as_deref().filter(|u| !u.is_empty()) {
            signatures.push(SignatureBlock {
                label: "Client Signature".to_string(),
                data_uri: uri.to_string(),
                signed: format!("Signed: {}", format_date_time(&session.created_at)),
            });
        }
        if let Some(uri) = fields.therapist_signature.as_deref().filter(|u| !u.is_empty()) {
            signatures.push(SignatureBlock {
                label: "Therapist Signature".to_string(),
                data_uri: uri.to_string(),
                signed: format!("Signed: {}", format_date_time(&session.updated_at)),
            });
        }

        Self {
            title: format!("Session - {date}"),
            info,
            status: session.status.into(),
            sections,
            signatures,
            reviewable: session.status.is_pending(),
        }
    }
}

/// Only rows with a filled primary column are listed; blank cells show `-`.
fn push_table(sections: &mut Vec<DetailSection>, session: &Session, kind: SubTableKind) {
    let rows: Vec<Vec<String>> = session
        .fields
        .tables
        .filled_cells(kind)
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| if cell.is_empty() { EMPTY_CELL.to_string() } else { cell })
                .collect()
        })
        .collect();
    if rows.is_empty() {
        return;
    }
    sections.push(DetailSection {
        title: kind.title().to_string(),
        content: SectionContent::Table {
            headings: kind.headings().iter().map(|h| h.to_string()).collect(),
            rows,
        },
    });
}

fn push_rows(sections: &mut Vec<DetailSection>, title: &str, entries: &[(&str, Option<&str>)]) {
    let mut rows = Vec::new();
    for (label, value) in entries {
        optional_row(&mut rows, label, *value);
    }
    if !rows.is_empty() {
        sections.push(DetailSection {
            title: title.to_string(),
            content: SectionContent::Rows { rows },
        });
    }
}
