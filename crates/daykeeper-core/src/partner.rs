//! Accountability partner pairing.
//!
//! A partnership grants one user read access to another's habits. Pairs
//! are deactivated rather than deleted so the change feed can report
//! removals; re-pairing an inactive pair reactivates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// A directed accountability pairing between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    /// The user who set up the pairing.
    pub user: Uuid,

    /// The partner granted read access.
    pub partner: Uuid,

    /// Unique key distinguishing this pairing from any re-pairing of the
    /// same two users.
    pub special_key: Uuid,

    pub started_at: DateTime<Utc>,

    /// Inactive pairings are retained for change detection.
    pub is_active: bool,

    pub updated_at: DateTime<Utc>,
}

impl Partnership {
    /// Pair `user` with `partner`. Self-pairing is rejected.
    pub fn new(user: Uuid, partner: Uuid) -> Result<Self, ValidationError> {
        if user == partner {
            return Err(ValidationError::SelfPartner);
        }
        let now = Utc::now();
        Ok(Self {
            user,
            partner,
            special_key: Uuid::new_v4(),
            started_at: now,
            is_active: true,
            updated_at: now,
        })
    }

    /// Whether `who` is one of the two members.
    pub fn involves(&self, who: Uuid) -> bool {
        self.user == who || self.partner == who
    }

    /// The other member of the pairing, if `who` is a member.
    pub fn counterpart(&self, who: Uuid) -> Option<Uuid> {
        if who == self.user {
            Some(self.partner)
        } else if who == self.partner {
            Some(self.user)
        } else {
            None
        }
    }

    /// Deactivate the pairing.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    /// Reactivate the pairing.
    pub fn reactivate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_pairing_is_rejected() {
        let user = Uuid::new_v4();
        assert_eq!(
            Partnership::new(user, user).unwrap_err(),
            ValidationError::SelfPartner
        );
    }

    #[test]
    fn counterpart_resolves_either_direction() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let pair = Partnership::new(a, b).unwrap();
        assert_eq!(pair.counterpart(a), Some(b));
        assert_eq!(pair.counterpart(b), Some(a));
        assert_eq!(pair.counterpart(Uuid::new_v4()), None);
        assert!(pair.involves(a) && pair.involves(b));
    }

    #[test]
    fn deactivate_keeps_the_pairing_around() {
        let mut pair = Partnership::new(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        let key = pair.special_key;
        pair.deactivate();
        assert!(!pair.is_active);
        pair.reactivate();
        assert!(pair.is_active);
        assert_eq!(pair.special_key, key);
    }
}
