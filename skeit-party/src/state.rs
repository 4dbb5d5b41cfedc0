//! Party state machine.
//!
//! ```text
//! NoParty --start--> Active --sync/add/move--> Active --finish--> NoParty
//!                      |  ^
//!             conflict |  | continue / sync / abort
//!                      v  |
//!                     Paused
//! ```
//!
//! The state is loaded from the store at the start of every command and
//! handed to the guarded transition methods below; there is no cached
//! "current party" anywhere else.

use skeit_core::{BranchName, PartyName, PartyRecord, PartyStore, PendingOp};

use crate::error::{not_found, PartyError};

/// The party recorded as active, with its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveParty {
    pub name: PartyName,
    pub record: PartyRecord,
}

impl ActiveParty {
    /// `party/<name>`.
    pub fn branch(&self) -> BranchName {
        self.name.branch()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyState {
    NoParty,
    Active(ActiveParty),
    /// An operation stopped part-way (conflict or interruption).
    Paused { party: ActiveParty, op: PendingOp },
}

impl PartyState {
    pub fn load(store: &PartyStore) -> Result<Self, PartyError> {
        let Some(name) = store.get_active()? else {
            return Ok(PartyState::NoParty);
        };
        let record = store
            .get(&name)?
            .ok_or_else(|| not_found("party", name.0.clone()))?;
        let pending = store.pending(&name)?;
        let party = ActiveParty { name, record };
        Ok(match pending {
            Some(op) => PartyState::Paused { party, op },
            None => PartyState::Active(party),
        })
    }

    pub fn name(&self) -> Option<&PartyName> {
        match self {
            PartyState::NoParty => None,
            PartyState::Active(party) | PartyState::Paused { party, .. } => Some(&party.name),
        }
    }

    /// Guard for `start`: no party may be active.
    pub fn require_none(&self) -> Result<(), PartyError> {
        match self.name() {
            None => Ok(()),
            Some(name) => Err(PartyError::AlreadyExists {
                what: "active party",
                name: name.0.clone(),
            }),
        }
    }

    /// Guard for commands that start new work: active and not paused.
    pub fn require_idle(self) -> Result<ActiveParty, PartyError> {
        match self {
            PartyState::NoParty => Err(PartyError::NoActiveParty),
            PartyState::Active(party) => Ok(party),
            PartyState::Paused { party, op } => Err(PartyError::Paused {
                party: party.name,
                op: op.to_string(),
            }),
        }
    }

    /// Guard for `status`, `continue` and `abort`: any active party.
    pub fn require_active(self) -> Result<(ActiveParty, Option<PendingOp>), PartyError> {
        match self {
            PartyState::NoParty => Err(PartyError::NoActiveParty),
            PartyState::Active(party) => Ok((party, None)),
            PartyState::Paused { party, op } => Ok((party, Some(op))),
        }
    }
}
