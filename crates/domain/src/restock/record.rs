//! Persistent record of one item's restock pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RestockError, RestockRequest, RestockStatus};

/// What a wake-up did to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestockStep {
    /// `Accepted -> Manufacturing`; nothing to announce.
    StartedManufacturing,
    /// `Manufacturing -> Completed`; the completion must be announced.
    Completed,
}

/// The pipeline instance for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockPipelineState {
    request: RestockRequest,
    status: RestockStatus,
    accepted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RestockPipelineState {
    /// Starts a pipeline for `request`, replacing `existing` if it finished.
    pub fn accept(
        existing: Option<&RestockPipelineState>,
        request: RestockRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, RestockError> {
        if request.quantity == 0 {
            return Err(RestockError::InvalidQuantity {
                item_id: request.item_id,
            });
        }
        if let Some(existing) = existing
            && !existing.status.can_accept()
        {
            return Err(RestockError::AlreadyInProgress {
                item_id: request.item_id,
            });
        }

        Ok(Self {
            request,
            status: RestockStatus::Accepted,
            accepted_at: now,
            updated_at: now,
        })
    }

    pub fn request(&self) -> &RestockRequest {
        &self.request
    }

    pub fn status(&self) -> RestockStatus {
        self.status
    }

    pub fn accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }

    /// Moves one stage forward.
    ///
    /// A wake-up on a completed pipeline is an invariant violation: the
    /// wake-up is deregistered in the same commit that completes it.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<RestockStep, RestockError> {
        let step = match self.status {
            RestockStatus::Accepted => {
                self.status = RestockStatus::Manufacturing;
                RestockStep::StartedManufacturing
            }
            RestockStatus::Manufacturing => {
                self.status = RestockStatus::Completed;
                RestockStep::Completed
            }
            RestockStatus::Completed => {
                return Err(RestockError::UnexpectedWakeup {
                    item_id: self.request.item_id,
                    status: self.status,
                });
            }
        };
        self.updated_at = now;
        Ok(step)
    }
}
