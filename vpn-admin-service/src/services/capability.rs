//! Capability matrix: (role, modules, status) -> permitted actions.
//!
//! This is the only place authorization policy lives. Presentation and the
//! identity service query it; neither re-derives policy on its own.
//!
//! | status  | primary                                   | replica                     |
//! |---------|-------------------------------------------|-----------------------------|
//! | Active  | view, downloadConfig, revoke              | view, downloadConfig        |
//! |         | + setPassword with `password-auth`        |                             |
//! |         | + viewRoutes, manageRoutes with `ccd`     | + viewRoutes with `ccd`     |
//! | Revoked | view, unrevoke, rotateCertificate, delete | view                        |
//! | Expired | view, rotateCertificate, delete           | view                        |
//!
//! A replica never receives a mutating action.

use crate::models::{AccountStatus, Action, Module, ModuleSet, OperatorContext, ServerRole};
use std::collections::BTreeSet;

pub type ActionSet = BTreeSet<Action>;

/// Actions a primary grants for `status`, before the role restriction.
fn primary_actions(modules: &ModuleSet, status: AccountStatus) -> ActionSet {
    let mut actions = ActionSet::from([Action::View]);

    match status {
        AccountStatus::Active => {
            actions.extend([Action::DownloadConfig, Action::Revoke]);
            if modules.contains(Module::PasswordAuth) {
                actions.insert(Action::SetPassword);
            }
            if modules.contains(Module::PerClientRouting) {
                actions.extend([Action::ViewRoutes, Action::ManageRoutes]);
            }
        }
        AccountStatus::Revoked => {
            actions.extend([Action::Unrevoke, Action::RotateCertificate, Action::Delete]);
        }
        AccountStatus::Expired => {
            actions.extend([Action::RotateCertificate, Action::Delete]);
        }
    }

    actions
}

pub fn permitted_actions(role: ServerRole, modules: &ModuleSet, status: AccountStatus) -> ActionSet {
    let actions = primary_actions(modules, status);
    match role {
        ServerRole::Primary => actions,
        ServerRole::Replica => actions.into_iter().filter(|a| !a.is_mutating()).collect(),
    }
}

pub fn is_permitted(ctx: &OperatorContext, status: AccountStatus, action: Action) -> bool {
    permitted_actions(ctx.role, &ctx.modules, status).contains(&action)
}

/// Creating identities is a roster-level mutation: primary only.
pub fn creation_permitted(role: ServerRole) -> bool {
    role.is_primary()
}
