use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{EquipmentItem, EquipmentStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EquipmentError {
    #[error("equipment item {index} does not exist (declared items: {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("a reason is required when rejecting equipment item {0}")]
    MissingReason(usize),
}

pub fn set_item_status(
    equipment: Vec<EquipmentItem>,
    index: usize,
    status: EquipmentStatus,
    reason: Option<&str>,
) -> Result<Vec<EquipmentItem>, EquipmentError> {
    set_item_status_at(equipment, index, status, reason, Utc::now())
}

/// Record a reviewer verdict on one declared item.
///
/// Item verdicts never feed into the application's overall status.
pub fn set_item_status_at(
    mut equipment: Vec<EquipmentItem>,
    index: usize,
    status: EquipmentStatus,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<EquipmentItem>, EquipmentError> {
    let len = equipment.len();
    let item = equipment
        .get_mut(index)
        .ok_or(EquipmentError::IndexOutOfRange { index, len })?;

    let reason = reason.filter(|text| !text.trim().is_empty());
    item.rejection_reason = match status {
        EquipmentStatus::Rejected => Some(
            reason
                .ok_or(EquipmentError::MissingReason(index))?
                .to_string(),
        ),
        EquipmentStatus::Approved | EquipmentStatus::Pending => None,
    };
    item.status = status;
    item.updated_at = Some(now);

    Ok(equipment)
}

/// Per-status counts for the security review dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EquipmentSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl EquipmentSummary {
    pub fn from_items(equipment: &[EquipmentItem]) -> Self {
        equipment
            .iter()
            .fold(Self::default(), |mut summary, item| {
                summary.total += 1;
                match item.status {
                    EquipmentStatus::Pending => summary.pending += 1,
                    EquipmentStatus::Approved => summary.approved += 1,
                    EquipmentStatus::Rejected => summary.rejected += 1,
                }
                summary
            })
    }

    pub fn fully_reviewed(&self) -> bool {
        self.pending == 0
    }
}
