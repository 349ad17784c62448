//! Loan origination commands.
//!
//! Every command is a plain data record carrying what the corresponding
//! resource API call needs. Creation commands carry an idempotency key that
//! is minted once, when the command is built or deserialized, so retrying
//! the same command value is deduplicated by the resource API.

use common::{IdempotencyKey, ResourceId};
use cqrs::{Command, Request};
use serde::{Deserialize, Serialize};

/// Role a party plays on a loan application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Borrower,
    CoBorrower,
    Guarantor,
}

/// Command to create the loan application record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterApplication {
    /// The loan product applied for.
    pub product_code: String,

    /// Requested principal in minor currency units.
    pub requested_amount_cents: i64,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Requested term in months.
    pub term_months: u32,

    /// Origination channel (branch, web, broker...).
    #[serde(default)]
    pub channel: Option<String>,

    #[serde(default)]
    pub idempotency_key: IdempotencyKey,
}

impl RegisterApplication {
    /// Creates a new RegisterApplication command with a fresh idempotency key.
    pub fn new(
        product_code: impl Into<String>,
        requested_amount_cents: i64,
        currency: impl Into<String>,
        term_months: u32,
    ) -> Self {
        Self {
            product_code: product_code.into(),
            requested_amount_cents,
            currency: currency.into(),
            term_months,
            channel: None,
            idempotency_key: IdempotencyKey::generate(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

impl Request for RegisterApplication {
    type Response = ResourceId;
}

impl Command for RegisterApplication {}

/// Command to attach a party to a loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterParty {
    /// The owning application; bound by the saga when not supplied.
    #[serde(default)]
    pub loan_application_id: Option<ResourceId>,

    /// The customer taking part in the application.
    pub party_id: ResourceId,

    pub role: PartyRole,

    #[serde(default)]
    pub idempotency_key: IdempotencyKey,
}

impl RegisterParty {
    /// Creates a new RegisterParty command with a fresh idempotency key.
    pub fn new(party_id: ResourceId, role: PartyRole) -> Self {
        Self {
            loan_application_id: None,
            party_id,
            role,
            idempotency_key: IdempotencyKey::generate(),
        }
    }
}

impl Request for RegisterParty {
    type Response = ResourceId;
}

impl Command for RegisterParty {}

/// Command to attach a supporting document to a loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDocument {
    /// The owning application; bound by the saga when not supplied.
    #[serde(default)]
    pub loan_application_id: Option<ResourceId>,

    /// Document category (payslip, identity, bank statement...).
    pub document_type: String,

    /// Location of the stored document.
    pub document_uri: String,

    #[serde(default)]
    pub idempotency_key: IdempotencyKey,
}

impl RegisterDocument {
    /// Creates a new RegisterDocument command with a fresh idempotency key.
    pub fn new(document_type: impl Into<String>, document_uri: impl Into<String>) -> Self {
        Self {
            loan_application_id: None,
            document_type: document_type.into(),
            document_uri: document_uri.into(),
            idempotency_key: IdempotencyKey::generate(),
        }
    }

    /// Targets an existing application.
    pub fn for_application(mut self, loan_application_id: ResourceId) -> Self {
        self.loan_application_id = Some(loan_application_id);
        self
    }
}

impl Request for RegisterDocument {
    type Response = ResourceId;
}

impl Command for RegisterDocument {}

/// Command to record a proposed offer on a loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterOffer {
    /// The owning application; bound by the saga when not supplied.
    #[serde(default)]
    pub loan_application_id: Option<ResourceId>,

    pub offered_amount_cents: i64,

    pub term_months: u32,

    /// Annual interest rate in basis points.
    pub annual_rate_bps: u32,

    #[serde(default)]
    pub idempotency_key: IdempotencyKey,
}

impl RegisterOffer {
    /// Creates a new RegisterOffer command with a fresh idempotency key.
    pub fn new(offered_amount_cents: i64, term_months: u32, annual_rate_bps: u32) -> Self {
        Self {
            loan_application_id: None,
            offered_amount_cents,
            term_months,
            annual_rate_bps,
            idempotency_key: IdempotencyKey::generate(),
        }
    }
}

impl Request for RegisterOffer {
    type Response = ResourceId;
}

impl Command for RegisterOffer {}

/// Command to append a status history entry to a loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterStatusHistory {
    /// The owning application; bound by the saga when not supplied.
    #[serde(default)]
    pub loan_application_id: Option<ResourceId>,

    pub status_code: String,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub idempotency_key: IdempotencyKey,
}

impl RegisterStatusHistory {
    /// Creates a new RegisterStatusHistory command with a fresh idempotency key.
    pub fn new(status_code: impl Into<String>) -> Self {
        Self {
            loan_application_id: None,
            status_code: status_code.into(),
            reason: None,
            idempotency_key: IdempotencyKey::generate(),
        }
    }
}

impl Request for RegisterStatusHistory {
    type Response = ResourceId;
}

impl Command for RegisterStatusHistory {}

/// Command to record the underwriting score of a loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterScore {
    /// The owning application; bound by the saga when not supplied.
    #[serde(default)]
    pub loan_application_id: Option<ResourceId>,

    pub score: i32,

    /// Scoring model that produced the value.
    pub model: String,

    #[serde(default)]
    pub idempotency_key: IdempotencyKey,
}

impl RegisterScore {
    /// Creates a new RegisterScore command with a fresh idempotency key.
    pub fn new(score: i32, model: impl Into<String>) -> Self {
        Self {
            loan_application_id: None,
            score,
            model: model.into(),
            idempotency_key: IdempotencyKey::generate(),
        }
    }
}

impl Request for RegisterScore {
    type Response = ResourceId;
}

impl Command for RegisterScore {}

/// Command to record the underwriting decision of a loan application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDecision {
    /// The owning application; bound by the saga when not supplied.
    #[serde(default)]
    pub loan_application_id: Option<ResourceId>,

    /// The score the decision was based on; bound by the saga when a score
    /// is registered in the same submission.
    #[serde(default)]
    pub underwriting_score_id: Option<ResourceId>,

    pub decision_code: String,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub idempotency_key: IdempotencyKey,
}

impl RegisterDecision {
    /// Creates a new RegisterDecision command with a fresh idempotency key.
    pub fn new(decision_code: impl Into<String>) -> Self {
        Self {
            loan_application_id: None,
            underwriting_score_id: None,
            decision_code: decision_code.into(),
            reason: None,
            idempotency_key: IdempotencyKey::generate(),
        }
    }
}

impl Request for RegisterDecision {
    type Response = ResourceId;
}

impl Command for RegisterDecision {}

/// Command to delete a loan application record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveApplication {
    pub loan_application_id: ResourceId,
}

impl Request for RemoveApplication {
    type Response = ();
}

impl Command for RemoveApplication {}

/// Command to detach a party from a loan application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveParty {
    pub loan_application_id: ResourceId,
    pub application_party_id: ResourceId,
}

impl Request for RemoveParty {
    type Response = ();
}

impl Command for RemoveParty {}

/// Command to delete a document from a loan application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDocument {
    pub loan_application_id: ResourceId,
    pub application_document_id: ResourceId,
}

impl Request for RemoveDocument {
    type Response = ();
}

impl Command for RemoveDocument {}

/// Command to withdraw a proposed offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOffer {
    pub loan_application_id: ResourceId,
    pub proposed_offer_id: ResourceId,
}

impl Request for RemoveOffer {
    type Response = ();
}

impl Command for RemoveOffer {}

/// Command to delete a status history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveStatusHistory {
    pub loan_application_id: ResourceId,
    pub status_history_id: ResourceId,
}

impl Request for RemoveStatusHistory {
    type Response = ();
}

impl Command for RemoveStatusHistory {}

/// Command to delete an underwriting score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveScore {
    pub loan_application_id: ResourceId,
    pub underwriting_score_id: ResourceId,
}

impl Request for RemoveScore {
    type Response = ();
}

impl Command for RemoveScore {}

/// Command to delete an underwriting decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDecision {
    pub loan_application_id: ResourceId,
    pub underwriting_decision_id: ResourceId,
}

impl Request for RemoveDecision {
    type Response = ();
}

impl Command for RemoveDecision {}

/// A complete loan application submission.
///
/// This is the input of the register-application saga rather than a
/// routed command: the saga splits it into one creation command per
/// sub-resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitApplication {
    pub application: RegisterApplication,

    #[serde(default)]
    pub parties: Vec<RegisterParty>,

    #[serde(default)]
    pub documents: Vec<RegisterDocument>,

    #[serde(default)]
    pub offers: Vec<RegisterOffer>,

    #[serde(default)]
    pub status_histories: Vec<RegisterStatusHistory>,

    #[serde(default)]
    pub score: Option<RegisterScore>,

    #[serde(default)]
    pub decision: Option<RegisterDecision>,
}

impl SubmitApplication {
    /// Creates a submission containing only the application record.
    pub fn new(application: RegisterApplication) -> Self {
        Self {
            application,
            parties: Vec::new(),
            documents: Vec::new(),
            offers: Vec::new(),
            status_histories: Vec::new(),
            score: None,
            decision: None,
        }
    }

    pub fn with_party(mut self, party: RegisterParty) -> Self {
        self.parties.push(party);
        self
    }

    pub fn with_document(mut self, document: RegisterDocument) -> Self {
        self.documents.push(document);
        self
    }

    pub fn with_offer(mut self, offer: RegisterOffer) -> Self {
        self.offers.push(offer);
        self
    }

    pub fn with_status_history(mut self, entry: RegisterStatusHistory) -> Self {
        self.status_histories.push(entry);
        self
    }

    pub fn with_score(mut self, score: RegisterScore) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_decision(mut self, decision: RegisterDecision) -> Self {
        self.decision = Some(decision);
        self
    }
}
