use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Check,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Check => "check",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

/// Donation payload as submitted by the UI, before the queue assigns its
/// bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionDraft {
    pub user_id: String,
    pub team_id: Option<String>,
    pub tournee_id: Option<String>,
    pub amount: f64,
    pub calendars_given: i64,
    pub payment_method: PaymentMethod,
    pub donator_name: Option<String>,
    pub donator_email: Option<String>,
    pub notes: Option<String>,
}

/// A locally-recorded donation not yet confirmed persisted remotely.
///
/// Lives in the queue from creation until a confirmed remote write, at which
/// point it is deleted. `sync_attempts` only ever increases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTransaction {
    pub id: String,
    pub user_id: String,
    pub team_id: Option<String>,
    pub tournee_id: Option<String>,
    pub amount: f64,
    pub calendars_given: i64,
    pub payment_method: PaymentMethod,
    pub donator_name: Option<String>,
    pub donator_email: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sync_attempts: u32,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
}

impl PendingTransaction {
    /// Assigns the local id and zeroed bookkeeping. Ids are time+random and
    /// unique within the local queue only, not globally.
    pub fn from_draft(draft: TransactionDraft) -> Self {
        let now = Utc::now();
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        Self {
            id: format!("txn-{}-{}", now.timestamp_millis(), suffix),
            user_id: draft.user_id,
            team_id: draft.team_id,
            tournee_id: draft.tournee_id,
            amount: draft.amount,
            calendars_given: draft.calendars_given,
            payment_method: draft.payment_method,
            donator_name: draft.donator_name,
            donator_email: draft.donator_email,
            notes: draft.notes,
            created_at: now,
            sync_attempts: 0,
            last_sync_attempt: None,
            sync_error: None,
        }
    }
}

/// Row shape sent to the remote store. Local bookkeeping (`id`,
/// `sync_attempts`, `last_sync_attempt`, `sync_error`) stays behind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DonationRecord {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournee_id: Option<String>,
    pub amount: f64,
    pub calendars_given: i64,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donator_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donator_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&PendingTransaction> for DonationRecord {
    fn from(txn: &PendingTransaction) -> Self {
        Self {
            user_id: txn.user_id.clone(),
            team_id: txn.team_id.clone(),
            tournee_id: txn.tournee_id.clone(),
            amount: txn.amount,
            calendars_given: txn.calendars_given,
            payment_method: txn.payment_method,
            donator_name: txn.donator_name.clone(),
            donator_email: txn.donator_email.clone(),
            notes: txn.notes.clone(),
            created_at: txn.created_at,
        }
    }
}

/// Snapshot written to durable local storage after every queue mutation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedQueue {
    pub pending: Vec<PendingTransaction>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Read-only view published to subscribers after every mutation. The totals
/// are recomputed from the queue contents each time, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueSnapshot {
    pub is_online: bool,
    pub sync_in_progress: bool,
    pub pending: Vec<PendingTransaction>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub total_pending_amount: f64,
    pub total_pending_calendars: i64,
}
