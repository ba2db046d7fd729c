// Integration tests for the ledger rule layer.
//
// These cover the precondition checks and derived values that do not need a
// running Postgres: the commit-time guards (balance >= amount, fingerprint
// match) are enforced by the store's conditional updates and the schema's
// CHECK constraint.

use chrono::Utc;
use currency_engine::errors::LedgerError;
use currency_engine::identity::{hash_address, UNKNOWN_FINGERPRINT};
use currency_engine::models::{Account, GlobalLock};
use currency_engine::services::{
    check_global_lock, check_transfer_parties, check_transfer_request, is_admin, mining_reward,
};
use currency_engine::verification::comment_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::types::Json;

fn account(username: &str, balance: Decimal, identity_hash: &str) -> Account {
    Account {
        username: username.to_string(),
        balance,
        identity_hash: identity_hash.to_string(),
        social_id: None,
        bio: String::new(),
        country: "Unknown".to_string(),
        join_date: Utc::now(),
        activity: Json(vec![]),
        warning: None,
    }
}

#[test]
fn test_transfer_preserves_total_balance() {
    // Alice (1000) sends 300 to Bob (1000): 700 / 1300, sum unchanged.
    let alice = account("Alice", dec!(1000), &hash_address(Some("203.0.113.7")));
    let bob = account("Bob", dec!(1000), &hash_address(Some("198.51.100.23")));
    let amount = dec!(300);

    assert!(check_transfer_request(&alice.username, &bob.username, amount).is_ok());
    assert!(check_transfer_parties(&alice, &bob, amount).is_ok());

    let sum_before = alice.balance + bob.balance;
    let (alice_after, bob_after) = (alice.balance - amount, bob.balance + amount);

    assert_eq!(alice_after, dec!(700));
    assert_eq!(bob_after, dec!(1300));
    assert_eq!(alice_after + bob_after, sum_before);
}

#[test]
fn test_matching_fingerprints_always_block() {
    // Eve registered from the same origin as Alice.
    let shared = hash_address(Some("203.0.113.7"));
    let alice = account("Alice", dec!(700), &shared);
    let eve = account("Eve", dec!(1000), &shared);

    let err = check_transfer_parties(&alice, &eve, dec!(50)).unwrap_err();
    assert!(matches!(err, LedgerError::AltAccount));
    assert_eq!(alice.balance, dec!(700));
    assert_eq!(eve.balance, dec!(1000));
}

#[test]
fn test_both_unknown_fingerprints_block() {
    let a = account("a", dec!(1000), UNKNOWN_FINGERPRINT);
    let b = account("b", dec!(1000), UNKNOWN_FINGERPRINT);

    let err = check_transfer_parties(&a, &b, dec!(1)).unwrap_err();
    assert!(matches!(err, LedgerError::AltAccount));
}

#[test]
fn test_overdraft_rejected_with_balances_untouched() {
    let alice = account("Alice", dec!(700), &hash_address(Some("203.0.113.7")));
    let bob = account("Bob", dec!(1300), &hash_address(Some("198.51.100.23")));

    let err = check_transfer_parties(&alice, &bob, dec!(2000)).unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(alice.balance, dec!(700));
    assert_eq!(bob.balance, dec!(1300));
}

#[test]
fn test_exact_balance_transfer_allowed() {
    // balance >= amount is inclusive; spending to zero is legal.
    let alice = account("Alice", dec!(700), &hash_address(Some("203.0.113.7")));
    let bob = account("Bob", dec!(1300), &hash_address(Some("198.51.100.23")));

    assert!(check_transfer_parties(&alice, &bob, dec!(700)).is_ok());
}

#[test]
fn test_global_lock_blocks_regardless_of_funds() {
    let lock = GlobalLock {
        is_locked: true,
        lock_message: "Economy paused for rebalancing".to_string(),
    };

    match check_global_lock(&lock).unwrap_err() {
        LedgerError::SystemLocked(message) => {
            assert_eq!(message, "Economy paused for rebalancing");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_lock_row_means_unlocked() {
    assert!(check_global_lock(&GlobalLock::default()).is_ok());
}

#[test]
fn test_request_shape_checks_run_in_order() {
    // Non-positive amount wins over self-transfer.
    let err = check_transfer_request("alice", "alice", dec!(0)).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = check_transfer_request("alice", "alice", dec!(10)).unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    assert!(check_transfer_request("alice", "bob", dec!(10)).is_ok());
}

#[test]
fn test_mining_reward_is_rate_times_elapsed() {
    // 120 seconds at the default 1/sec rate credits exactly 120.
    assert_eq!(mining_reward(dec!(1), 120), dec!(120));
    assert_eq!(mining_reward(dec!(2), 45), dec!(90));
    assert_eq!(mining_reward(dec!(0.25), 8), dec!(2));
}

#[test]
fn test_fingerprint_stability_and_drift() {
    // Same origin yields the same fingerprint (mining passes the guard);
    // a different origin yields a different one (mining is rejected).
    let stored = hash_address(Some("203.0.113.7"));
    assert_eq!(hash_address(Some("203.0.113.7")), stored);
    assert_ne!(hash_address(Some("198.51.100.23")), stored);
}

#[test]
fn test_admin_allow_list_is_exact_match() {
    let admins = vec!["moderator".to_string()];
    assert!(is_admin(&admins, "moderator"));
    assert!(!is_admin(&admins, "Moderator"));
    assert!(!is_admin(&admins, "moderator2"));
}

#[test]
fn test_verification_comment_matching() {
    // Author casing differs, code embedded in a longer comment.
    assert!(comment_matches(
        "AliceWonder",
        "here is my code: 7GQ2-XK42, thanks!",
        "alicewonder",
        "7GQ2-XK42"
    ));
    // Right code, wrong author.
    assert!(!comment_matches(
        "mallory",
        "7GQ2-XK42",
        "alicewonder",
        "7GQ2-XK42"
    ));
}
