//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for any valid input.

use proptest::prelude::*;

use keygate::auth::role::{check_create, check_manage, check_update, check_view};
use keygate::auth::{parse_api_key, ManageAction, RoleDenied};
use keygate::domain::Role;

// ============================================================================
// Custom Strategies
// ============================================================================

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Common), Just(Role::Admin), Just(Role::Root)]
}

fn arb_action() -> impl Strategy<Value = ManageAction> {
    prop_oneof![
        Just(ManageAction::Disable),
        Just(ManageAction::Enable),
        Just(ManageAction::Delete),
        Just(ManageAction::Promote),
        Just(ManageAction::Demote),
    ]
}

/// Secrets never contain the segment separator
fn arb_secret() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,48}"
}

fn arb_hint() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{1,12}"
}

// ============================================================================
// Role hierarchy laws
// ============================================================================

proptest! {
    /// Acting on a target requires strictly outranking it, or being root
    #[test]
    fn prop_view_iff_outranks_or_root(actor in arb_role(), target in arb_role()) {
        let allowed = check_view(actor, target).is_ok();
        prop_assert_eq!(allowed, actor > target || actor == Role::Root);
    }

    /// Granting a role at or above one's own fails unless root
    #[test]
    fn prop_no_escalation(actor in arb_role(), new_role in arb_role()) {
        let result = check_create(actor, new_role);
        if actor != Role::Root && new_role >= actor {
            prop_assert_eq!(result, Err(RoleDenied::CannotGrantRole));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    /// A role-changing update succeeds only for an outranking (or root) actor
    /// assigning a grantable role
    #[test]
    fn prop_update_requires_outranking(
        actor in arb_role(),
        target in arb_role(),
        new_role in arb_role(),
    ) {
        prop_assume!(new_role != target);
        let result = check_update(actor, target, new_role);
        if result.is_ok() {
            prop_assert!(actor > target || actor == Role::Root);
            prop_assert!(new_role < actor || actor == Role::Root);
        }
        if actor != Role::Root && new_role >= actor {
            prop_assert!(result.is_err());
        }
    }

    /// Root accounts never get disabled, deleted or demoted
    #[test]
    fn prop_root_is_protected(actor in arb_role(), action in arb_action()) {
        let result = check_manage(actor, Role::Root, action);
        match action {
            ManageAction::Disable | ManageAction::Delete | ManageAction::Demote => {
                prop_assert!(result.is_err());
            }
            _ => {}
        }
        prop_assert!(check_update(actor, Role::Root, Role::Admin).is_err());
        prop_assert!(check_update(actor, Role::Root, Role::Common).is_err());
    }

    /// Every allowed management action comes from an actor that may act on the target
    #[test]
    fn prop_manage_implies_outranking(
        actor in arb_role(),
        target in arb_role(),
        action in arb_action(),
    ) {
        if check_manage(actor, target, action).is_ok() {
            prop_assert!(actor > target || actor == Role::Root);
        }
    }
}

// ============================================================================
// API key parsing
// ============================================================================

proptest! {
    /// `sk-<secret>` yields the secret and no hint
    #[test]
    fn prop_plain_key(secret in arb_secret()) {
        let parsed = parse_api_key(Some(format!("Bearer sk-{secret}").as_str()), None);
        prop_assert_eq!(parsed.secret, secret);
        prop_assert_eq!(parsed.channel_override, None);
    }

    /// `sk-<secret>-<hint>` yields both, from either header
    #[test]
    fn prop_key_with_hint(secret in arb_secret(), hint in arb_hint(), alternate in any::<bool>()) {
        let raw = format!("sk-{secret}-{hint}");
        let parsed = if alternate {
            parse_api_key(Some("Bearer midjourney-proxy"), Some(raw.as_str()))
        } else {
            parse_api_key(Some(format!("Bearer {raw}").as_str()), None)
        };
        prop_assert_eq!(parsed.secret, secret);
        prop_assert_eq!(parsed.channel_override, Some(hint));
    }

    /// Parsing never panics on arbitrary header values
    #[test]
    fn prop_parse_total(primary in ".{0,64}", alternate in ".{0,64}") {
        let parsed = parse_api_key(Some(primary.as_str()), Some(alternate.as_str()));
        prop_assert!(!parsed.secret.contains('-'));
    }
}
