//! Channel terms advertised by the hub.

use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, ChannelResult};

/// Hub-advertised ceilings for a c2h deposit. A limit of 0 means no cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTerms {
    /// Maximum deposit quantity
    pub deposit_limit: u64,

    /// Maximum deposit expire time, in blocks
    pub timeout_limit: u64,
}

impl ChannelTerms {
    /// Check a requested deposit against these terms.
    ///
    /// Purely local; must run before the deposit is built so that no funds
    /// are committed outside the hub's terms.
    pub fn validate(&self, deposit_quantity: u64, expire_time: u64) -> ChannelResult<()> {
        check_limit("deposit quantity", deposit_quantity, self.deposit_limit)?;
        check_limit("deposit expire time", expire_time, self.timeout_limit)
    }

    /// True if neither term caps the deposit.
    pub fn is_unlimited(&self) -> bool {
        self.deposit_limit == 0 && self.timeout_limit == 0
    }
}

fn check_limit(field: &'static str, requested: u64, limit: u64) -> ChannelResult<()> {
    if limit != 0 && requested > limit {
        return Err(ChannelError::TermsViolation {
            field,
            requested,
            limit,
        });
    }
    Ok(())
}
