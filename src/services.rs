use crate::config::LedgerConfig;
use crate::database::Database;
use crate::errors::{LedgerError, Result};
use crate::identity;
use crate::metrics;
use crate::models::{
    Account, ActivityEvent, AuthResponse, DeleteAccountRequest, DismissWarningRequest, GlobalLock,
    LeaderboardEntry, LockRequest, MineRequest, MineResponse, TransferRequest, TransferResponse,
    UpdateProfileRequest, VerifyRequest, WarnRequest,
};
use crate::verification::VerificationGateway;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct LedgerService {
    db: Arc<Database>,
    verifier: Arc<dyn VerificationGateway>,
    policy: LedgerConfig,
}

/// Reward for `elapsed_seconds` of mining at the configured rate.
pub fn mining_reward(rate_per_second: Decimal, elapsed_seconds: u64) -> Decimal {
    rate_per_second * Decimal::from(elapsed_seconds)
}

/// Request-shape checks for a transfer. Runs before anything is read from
/// the store; first failing check wins.
pub fn check_transfer_request(sender: &str, recipient: &str, amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation("Amount must be positive".to_string()));
    }
    if sender == recipient {
        return Err(LedgerError::Validation(
            "Cannot send funds to yourself".to_string(),
        ));
    }
    Ok(())
}

/// System-wide lock check. The configured message travels with the error.
pub fn check_global_lock(lock: &GlobalLock) -> Result<()> {
    if lock.is_locked {
        return Err(LedgerError::SystemLocked(lock.lock_message.clone()));
    }
    Ok(())
}

/// Per-party checks against account snapshots: alt-account policy, then
/// funds. Matching fingerprints always block, including when both sides
/// carry the "unknown" sentinel — two unknown origins are indistinguishable
/// from the same origin.
pub fn check_transfer_parties(sender: &Account, recipient: &Account, amount: Decimal) -> Result<()> {
    if sender.identity_hash == recipient.identity_hash {
        return Err(LedgerError::AltAccount);
    }
    if sender.balance < amount {
        return Err(LedgerError::InsufficientFunds {
            required: amount.to_string(),
            available: sender.balance.to_string(),
        });
    }
    Ok(())
}

pub fn is_admin(admin_usernames: &[String], username: &str) -> bool {
    admin_usernames.iter().any(|a| a == username)
}

/// Delegate identity proof to the gateway and normalize the outcome.
pub(crate) async fn ensure_verified(
    verifier: &dyn VerificationGateway,
    username: &str,
    code: &str,
) -> Result<()> {
    let verified = verifier
        .verify(username, code)
        .await
        .map_err(|e| LedgerError::VerificationGateway(e.to_string()))?;

    if !verified {
        return Err(LedgerError::VerificationFailed(
            "Verification code not found in recent comments".to_string(),
        ));
    }

    Ok(())
}

fn rejection_reason(err: &LedgerError) -> Option<&'static str> {
    match err {
        LedgerError::Validation(_) => Some("validation"),
        LedgerError::SystemLocked(_) => Some("system_locked"),
        LedgerError::AltAccount => Some("alt_account"),
        LedgerError::InsufficientFunds { .. } => Some("insufficient_funds"),
        LedgerError::AccountNotFound(_) => Some("not_found"),
        _ => None,
    }
}

impl LedgerService {
    pub fn new(db: Arc<Database>, verifier: Arc<dyn VerificationGateway>, policy: LedgerConfig) -> Self {
        LedgerService {
            db,
            verifier,
            policy,
        }
    }

    /// Register a new account or log an existing one in.
    ///
    /// Idempotent for existing accounts: a repeat verification only refreshes
    /// the identity fingerprint, never balance, activity, or join date.
    pub async fn register_or_login(
        &self,
        request: VerifyRequest,
        raw_address: Option<&str>,
    ) -> Result<AuthResponse> {
        validator::Validate::validate(&request)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        ensure_verified(self.verifier.as_ref(), &request.username, &request.code).await?;

        let fingerprint = identity::hash_address(raw_address);

        if let Some(_existing) = self.db.get_account(&request.username).await? {
            let account = self
                .db
                .refresh_identity_hash(&request.username, &fingerprint)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound(request.username.clone()))?;

            metrics::LOGINS.inc();
            info!("Logged in {}", request.username);

            return Ok(AuthResponse {
                created: false,
                message: "Logged in successfully".to_string(),
                account,
            });
        }

        let social_id = match self.verifier.lookup_social_id(&request.username).await {
            Ok(id) => id,
            Err(e) => {
                warn!("Social id lookup failed for {}: {}", request.username, e);
                None
            }
        };

        let join_event = ActivityEvent::join(&request.username);

        let created = self
            .db
            .create_account(
                &request.username,
                self.policy.initial_balance,
                &fingerprint,
                social_id.as_deref(),
                &self.policy.default_bio,
                &self.policy.default_country,
                join_event,
            )
            .await?;

        match created {
            Some(account) => {
                metrics::ACCOUNTS_REGISTERED.inc();
                info!(
                    "Registered {} with initial balance {}",
                    request.username, self.policy.initial_balance
                );

                Ok(AuthResponse {
                    created: true,
                    message: "Account created!".to_string(),
                    account,
                })
            }
            None => {
                // Lost the creation race to a concurrent first verification;
                // that request registered the account, this one is a login.
                let account = self
                    .db
                    .refresh_identity_hash(&request.username, &fingerprint)
                    .await?
                    .ok_or_else(|| {
                        LedgerError::Conflict("Account creation raced with deletion".to_string())
                    })?;

                metrics::LOGINS.inc();

                Ok(AuthResponse {
                    created: false,
                    message: "Logged in successfully".to_string(),
                    account,
                })
            }
        }
    }

    /// Credit time-based mining income.
    ///
    /// The claimed fingerprint must match the stored one exactly; the store
    /// applies the credit as a fingerprint-guarded atomic increment, so a
    /// guard miss never changes the balance. The rejection does not reveal
    /// whether the fingerprint drifted or the account vanished.
    pub async fn mine(&self, request: MineRequest, claimed_fingerprint: &str) -> Result<MineResponse> {
        validator::Validate::validate(&request)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        self.db
            .get_account(&request.username)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(request.username.clone()))?;

        let reward = mining_reward(self.policy.mining_rate_per_second, request.elapsed_seconds);

        match self
            .db
            .credit_mining(&request.username, claimed_fingerprint, reward)
            .await?
        {
            Some(new_balance) => {
                metrics::MINING_CREDITS.inc();
                info!(
                    "Credited mining reward {} to {} (new balance {})",
                    reward, request.username, new_balance
                );

                Ok(MineResponse {
                    reward,
                    new_balance,
                })
            }
            None => Err(LedgerError::FingerprintMismatch),
        }
    }

    /// Atomic funds transfer. Precondition order: positive amount, no
    /// self-transfer, global lock, both accounts exist, alt-account policy,
    /// sufficient funds. The commit itself re-checks funds, so concurrent
    /// spends cannot overdraw.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferResponse> {
        match self.transfer_inner(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                if let Some(reason) = rejection_reason(&err) {
                    metrics::TRANSFERS_REJECTED.with_label_values(&[reason]).inc();
                }
                Err(err)
            }
        }
    }

    async fn transfer_inner(&self, request: TransferRequest) -> Result<TransferResponse> {
        validator::Validate::validate(&request)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        check_transfer_request(&request.sender, &request.recipient, request.amount)?;

        let lock = self.db.get_global_lock().await?;
        check_global_lock(&lock)?;

        let sender = self
            .db
            .get_account(&request.sender)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(request.sender.clone()))?;
        let recipient = self
            .db
            .get_account(&request.recipient)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(request.recipient.clone()))?;

        check_transfer_parties(&sender, &recipient, request.amount)?;

        let committed = self
            .db
            .transfer(&request.sender, &request.recipient, request.amount)
            .await?;

        let Some(new_balance) = committed else {
            // The debit guard failed at commit: a concurrent spend won.
            let available = self
                .db
                .get_account(&request.sender)
                .await?
                .map(|a| a.balance.to_string())
                .unwrap_or_else(|| "0".to_string());

            return Err(LedgerError::InsufficientFunds {
                required: request.amount.to_string(),
                available,
            });
        };

        let sent = ActivityEvent::sent(&request.sender, &request.recipient, request.amount);
        if let Err(e) = self.db.append_activity(&request.sender, &sent).await {
            error!("Failed to record sender activity: {}", e);
        }

        let received = ActivityEvent::received(&request.sender, &request.recipient, request.amount);
        if let Err(e) = self.db.append_activity(&request.recipient, &received).await {
            error!("Failed to record recipient activity: {}", e);
        }

        metrics::TRANSFERS_COMMITTED.inc();
        metrics::TRANSFER_AMOUNT.observe(request.amount.to_f64().unwrap_or(0.0));

        info!(
            "Transferred {} from {} to {} (sender balance {})",
            request.amount, request.sender, request.recipient, new_balance
        );

        Ok(TransferResponse {
            success: true,
            new_balance,
        })
    }

    /// Administrative warning. Restricted to the configured allow-list.
    pub async fn set_warning(&self, request: WarnRequest) -> Result<()> {
        validator::Validate::validate(&request)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        if !is_admin(&self.policy.admin_usernames, &request.admin) {
            return Err(LedgerError::Unauthorized);
        }

        if !self
            .db
            .set_warning(&request.target, Some(&request.message))
            .await?
        {
            return Err(LedgerError::AccountNotFound(request.target.clone()));
        }

        info!("Warning set for {} by {}", request.target, request.admin);

        Ok(())
    }

    /// Holder-initiated warning dismissal.
    pub async fn dismiss_warning(&self, request: DismissWarningRequest) -> Result<()> {
        validator::Validate::validate(&request)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        if !self.db.set_warning(&request.username, None).await? {
            return Err(LedgerError::AccountNotFound(request.username.clone()));
        }

        Ok(())
    }

    /// Holder-initiated deletion. Irreversible, no soft delete.
    pub async fn delete_account(&self, request: DeleteAccountRequest) -> Result<()> {
        validator::Validate::validate(&request)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        if !self.db.delete_account(&request.username).await? {
            return Err(LedgerError::AccountNotFound(request.username.clone()));
        }

        metrics::ACCOUNTS_DELETED.inc();
        info!("Deleted account {}", request.username);

        Ok(())
    }

    /// Holder edit of descriptive metadata.
    pub async fn update_profile(&self, request: UpdateProfileRequest) -> Result<Account> {
        validator::Validate::validate(&request)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        self.db
            .update_profile(
                &request.username,
                request.bio.as_deref(),
                request.country.as_deref(),
            )
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(request.username.clone()))
    }

    /// Administrative global lock. Restricted to the configured allow-list.
    pub async fn set_global_lock(&self, request: LockRequest) -> Result<GlobalLock> {
        validator::Validate::validate(&request)
            .map_err(|e| LedgerError::Validation(e.to_string()))?;

        if !is_admin(&self.policy.admin_usernames, &request.admin) {
            return Err(LedgerError::Unauthorized);
        }

        let lock = self
            .db
            .set_global_lock(request.is_locked, &request.lock_message)
            .await?;

        warn!(
            "Global lock set to {} by {} ({})",
            lock.is_locked, request.admin, lock.lock_message
        );

        Ok(lock)
    }

    pub async fn get_account(&self, username: &str) -> Result<Account> {
        self.db
            .get_account(username)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(username.to_string()))
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.db.top_accounts().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UNKNOWN_FINGERPRINT;
    use crate::verification::MockVerificationGateway;
    use chrono::Utc;
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
    fn test_non_positive_amount_rejected_first() {
        let err = check_transfer_request("alice", "alice", dec!(0)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = check_transfer_request("alice", "bob", dec!(-5)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_self_transfer_rejected() {
        let err = check_transfer_request("alice", "alice", dec!(10)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn test_lock_rejects_with_configured_message() {
        let lock = GlobalLock {
            is_locked: true,
            lock_message: "Maintenance window".to_string(),
        };
        match check_global_lock(&lock).unwrap_err() {
            LedgerError::SystemLocked(msg) => assert_eq!(msg, "Maintenance window"),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(check_global_lock(&GlobalLock::default()).is_ok());
    }

    #[test]
    fn test_alt_account_rejected_before_funds() {
        let alice = account("Alice", dec!(700), "aabbccddee");
        let eve = account("Eve", dec!(1000), "aabbccddee");

        // Matching fingerprints block even when funds would suffice.
        let err = check_transfer_parties(&alice, &eve, dec!(50)).unwrap_err();
        assert!(matches!(err, LedgerError::AltAccount));
    }

    #[test]
    fn test_unknown_sentinel_pair_is_blocked() {
        let a = account("a", dec!(1000), UNKNOWN_FINGERPRINT);
        let b = account("b", dec!(1000), UNKNOWN_FINGERPRINT);

        let err = check_transfer_parties(&a, &b, dec!(1)).unwrap_err();
        assert!(matches!(err, LedgerError::AltAccount));
    }

    #[test]
    fn test_insufficient_funds_rejected() {
        let alice = account("Alice", dec!(700), "aabbccddee");
        let bob = account("Bob", dec!(1300), "1122334455");

        let err = check_transfer_parties(&alice, &bob, dec!(2000)).unwrap_err();
        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, "2000");
                assert_eq!(available, "700");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_distinct_fingerprints_with_funds_pass() {
        let alice = account("Alice", dec!(1000), "aabbccddee");
        let bob = account("Bob", dec!(1000), "1122334455");

        assert!(check_transfer_parties(&alice, &bob, dec!(300)).is_ok());
    }

    #[test]
    fn test_mining_reward_rate_times_elapsed() {
        assert_eq!(mining_reward(dec!(1), 120), dec!(120));
        assert_eq!(mining_reward(dec!(0.5), 60), dec!(30));
    }

    #[test]
    fn test_is_admin_allow_list() {
        let admins = vec!["mod-one".to_string(), "mod-two".to_string()];
        assert!(is_admin(&admins, "mod-one"));
        assert!(!is_admin(&admins, "Mod-One"));
        assert!(!is_admin(&[], "mod-one"));
    }

    #[tokio::test]
    async fn test_ensure_verified_passes_on_attested_claim() {
        let mut gateway = MockVerificationGateway::new();
        gateway.expect_verify().returning(|_, _| Ok(true));

        assert!(ensure_verified(&gateway, "alice", "XK42").await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_verified_rejects_unattested_claim() {
        let mut gateway = MockVerificationGateway::new();
        gateway.expect_verify().returning(|_, _| Ok(false));

        let err = ensure_verified(&gateway, "alice", "XK42").await.unwrap_err();
        assert!(matches!(err, LedgerError::VerificationFailed(_)));
    }

    #[tokio::test]
    async fn test_ensure_verified_surfaces_gateway_failure() {
        let mut gateway = MockVerificationGateway::new();
        gateway
            .expect_verify()
            .returning(|_, _| Err(anyhow::anyhow!("comment feed unreachable")));

        let err = ensure_verified(&gateway, "alice", "XK42").await.unwrap_err();
        assert!(matches!(err, LedgerError::VerificationGateway(_)));
    }
}
