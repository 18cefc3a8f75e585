//! Role hierarchy guard
//!
//! Every privilege comparison in the crate goes through the methods here.
//! Decisions are pure: no I/O, no logging.
//!
//! Rules:
//! - an actor may act on a target iff it strictly outranks it, or is root
//! - an actor may grant a role only if the role is strictly below its own,
//!   unless it is root
//! - root accounts are never disabled, deleted or demoted

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Role;

impl Role {
    /// Whether an actor with this role may view or modify `target`
    pub fn can_act_on(self, target: Role) -> bool {
        self == Role::Root || self > target
    }

    /// Whether an actor with this role may give an account `new_role`
    pub fn can_assign(self, new_role: Role) -> bool {
        self == Role::Root || new_role < self
    }

    /// Whether this role meets a route's minimum
    pub fn satisfies(self, min_role: Role) -> bool {
        self >= min_role
    }
}

/// Administrative actions on another account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManageAction {
    Disable,
    Enable,
    Delete,
    Promote,
    Demote,
}

impl ManageAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManageAction::Disable => "disable",
            ManageAction::Enable => "enable",
            ManageAction::Delete => "delete",
            ManageAction::Promote => "promote",
            ManageAction::Demote => "demote",
        }
    }
}

impl fmt::Display for ManageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the guard refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoleDenied {
    #[error("actor does not outrank the target")]
    NoPermission,

    #[error("cannot grant a role equal to or above your own")]
    CannotGrantRole,

    #[error("root accounts cannot be disabled")]
    CannotDisableRoot,

    #[error("root accounts cannot be deleted")]
    CannotDeleteRoot,

    #[error("root accounts cannot be demoted")]
    CannotDemoteRoot,

    #[error("only root may promote accounts")]
    CannotPromote,

    #[error("account is already an admin")]
    UserAlreadyAdmin,

    #[error("account is already a common user")]
    UserAlreadyCommon,

    #[error("root accounts cannot delete themselves")]
    RootCannotDeleteSelf,
}

/// Decide whether `actor` may perform `action` on an account holding `target`
pub fn check_manage(actor: Role, target: Role, action: ManageAction) -> Result<(), RoleDenied> {
    if !actor.can_act_on(target) {
        return Err(RoleDenied::NoPermission);
    }

    match action {
        ManageAction::Enable => Ok(()),
        ManageAction::Disable if target == Role::Root => Err(RoleDenied::CannotDisableRoot),
        ManageAction::Disable => Ok(()),
        ManageAction::Delete if target == Role::Root => Err(RoleDenied::CannotDeleteRoot),
        ManageAction::Delete => Ok(()),
        ManageAction::Promote if actor != Role::Root => Err(RoleDenied::CannotPromote),
        ManageAction::Promote if target >= Role::Admin => Err(RoleDenied::UserAlreadyAdmin),
        ManageAction::Promote => Ok(()),
        ManageAction::Demote if target == Role::Root => Err(RoleDenied::CannotDemoteRoot),
        ManageAction::Demote if target == Role::Common => Err(RoleDenied::UserAlreadyCommon),
        ManageAction::Demote => Ok(()),
    }
}

/// Decide whether `actor` may edit an account currently at `target` and
/// leave it at `new_role`
pub fn check_update(actor: Role, target: Role, new_role: Role) -> Result<(), RoleDenied> {
    if !actor.can_act_on(target) {
        return Err(RoleDenied::NoPermission);
    }
    if target == Role::Root && new_role < Role::Root {
        return Err(RoleDenied::CannotDemoteRoot);
    }
    if new_role != target && !actor.can_assign(new_role) {
        return Err(RoleDenied::CannotGrantRole);
    }
    Ok(())
}

/// Decide whether `actor` may create an account with `new_role`
pub fn check_create(actor: Role, new_role: Role) -> Result<(), RoleDenied> {
    if actor.can_assign(new_role) {
        Ok(())
    } else {
        Err(RoleDenied::CannotGrantRole)
    }
}

/// Decide whether `actor` may read another account's record
pub fn check_view(actor: Role, target: Role) -> Result<(), RoleDenied> {
    if actor.can_act_on(target) {
        Ok(())
    } else {
        Err(RoleDenied::NoPermission)
    }
}
