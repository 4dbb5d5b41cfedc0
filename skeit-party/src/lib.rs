//! # skeit-party
//!
//! A party is a named, persistent merged view of several branches, checked
//! out as `party/<name>` in the primary working tree. Commits made on top of
//! the view are replayed onto the party's default branch by [`Party::sync`],
//! which then rebuilds the view from the current branch tips.
//!
//! Entry point is [`Party`]; each method is one operator command.

pub mod builder;
pub mod error;
pub mod lifecycle;
pub mod state;
pub mod sync;
pub mod worktree;

pub use error::PartyError;
pub use lifecycle::{
    AbortOutcome, AddOutcome, BranchStatus, ContinueOutcome, FinishReport, MoveReport, Party,
    PartyStatus, StartReport,
};
pub use state::{ActiveParty, PartyState};
pub use sync::SyncReport;
pub use worktree::{AuxLease, AuxWorktree};
