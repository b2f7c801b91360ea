use thiserror::Error;

/// A backend payload that parsed but breaks the contract we rely on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("malformed {record}: {reason}")]
    Malformed { record: &'static str, reason: String },
    #[error("{record} {id}: {field} must not be negative")]
    Negative {
        record: &'static str,
        id: u64,
        field: &'static str,
    },
    #[error("seller order {id}: item {item} has zero quantity")]
    EmptyItem { id: u64, item: u64 },
    #[error("seller order {id}: item prices overflow the order subtotal")]
    SubtotalOverflow { id: u64 },
    #[error("seller order {id}: shipping TAT {min}-{max} days is inverted")]
    InvertedTat { id: u64, min: u32, max: u32 },
    #[error("campaign {id}: remaining credits {remaining} exceed allocation {allocated}")]
    CreditsExceedAllocation {
        id: u64,
        allocated: i64,
        remaining: i64,
    },
}

impl ContractError {
    pub fn malformed(record: &'static str, err: impl std::fmt::Display) -> Self {
        ContractError::Malformed {
            record,
            reason: err.to_string(),
        }
    }
}
