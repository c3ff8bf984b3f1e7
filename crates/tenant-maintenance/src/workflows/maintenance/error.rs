use chrono::{DateTime, Utc};

use super::domain::{QuoteStatus, VendorId, WorkOrderId};
use super::repository::{DirectoryError, EntityKind, RepositoryError};

/// Error raised by maintenance transitions. Every variant names the unmet
/// precondition so an operator can correct the input.
#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("cannot {operation} {entity} '{id}': status is {actual}, requires {required}")]
    InvalidState {
        entity: EntityKind,
        id: String,
        operation: &'static str,
        required: &'static str,
        actual: String,
    },
    #[error("not acceptable: {0}")]
    NotAcceptable(#[from] BusinessRule),
    #[error("work order '{work_order_id}' requires owner approval before it can be completed")]
    ApprovalRequired { work_order_id: WorkOrderId },
    #[error("{entity} '{id}' not found")]
    NotFound { entity: EntityKind, id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl MaintenanceError {
    pub(crate) fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_state(
        entity: EntityKind,
        id: impl ToString,
        operation: &'static str,
        required: &'static str,
        actual: impl ToString,
    ) -> Self {
        Self::InvalidState {
            entity,
            id: id.to_string(),
            operation,
            required,
            actual: actual.to_string(),
        }
    }
}

/// Business rules that can reject an otherwise well-formed transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusinessRule {
    #[error("vendor '{vendor_id}' is blacklisted")]
    VendorBlacklisted { vendor_id: VendorId },
    #[error("work order is already assigned to vendor '{vendor_id}'")]
    VendorAlreadyAssigned { vendor_id: VendorId },
    #[error("quote from vendor '{vendor_id}' is {status}; only accepted quotes can be selected")]
    QuoteNotAccepted {
        vendor_id: VendorId,
        status: QuoteStatus,
    },
    #[error("work order has no assigned vendor")]
    NoVendorAssigned,
    #[error("vendor '{vendor_id}' has not accepted the work order")]
    VendorNotAccepted { vendor_id: VendorId },
    #[error("actor '{actor_id}' is not the vendor assigned to this work order")]
    NotAssignedVendor { actor_id: String },
    #[error("bidding window closed at {closed_at}")]
    BiddingWindowExpired { closed_at: DateTime<Utc> },
    #[error("{field} must not be empty")]
    MissingField { field: &'static str },
}
