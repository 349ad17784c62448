//! Loan origination queries and the records they return.

use chrono::{DateTime, Utc};
use common::ResourceId;
use cqrs::{Query, Request};
use serde::{Deserialize, Serialize};

/// A loan application record as held by the resource API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub loan_application_id: ResourceId,
    pub product_code: String,
    pub requested_amount_cents: i64,
    pub currency: String,
    pub term_months: u32,
    pub channel: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An entry of the application status catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    pub application_status_id: ResourceId,
    pub code: String,
    pub description: String,
}

/// Query loading a loan application by ID. Cacheable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLoanApplication {
    pub loan_application_id: ResourceId,
}

impl GetLoanApplication {
    pub fn new(loan_application_id: ResourceId) -> Self {
        Self {
            loan_application_id,
        }
    }
}

impl Request for GetLoanApplication {
    type Response = LoanApplication;
}

impl Query for GetLoanApplication {
    fn cache_key(&self) -> Option<String> {
        Some(self.loan_application_id.to_string())
    }
}

/// Query loading an application status by ID or by code.
///
/// At least one of the two must be set. When both are set the ID wins and
/// the code is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetApplicationStatus {
    #[serde(default)]
    pub application_status_id: Option<ResourceId>,

    #[serde(default)]
    pub application_status_code: Option<String>,
}

impl GetApplicationStatus {
    pub fn by_id(application_status_id: ResourceId) -> Self {
        Self {
            application_status_id: Some(application_status_id),
            application_status_code: None,
        }
    }

    pub fn by_code(code: impl Into<String>) -> Self {
        Self {
            application_status_id: None,
            application_status_code: Some(code.into()),
        }
    }

    /// Sets the ID, which then takes precedence over any code.
    pub fn with_id(mut self, application_status_id: ResourceId) -> Self {
        self.application_status_id = Some(application_status_id);
        self
    }
}

impl Request for GetApplicationStatus {
    type Response = ApplicationStatus;
}

impl Query for GetApplicationStatus {}
