//! Limit enforcement.
//!
//! Limits are keyed by (role, currency) and checked against the maker who
//! created the payment. The daily ceiling covers a rolling 24-hour window
//! over the maker's APPROVED and COMPLETED payments; the spent sum is read
//! fresh on every check, never cached.

use chrono::{Duration, Utc};

use cashgrid_types::{
    ActorId, AppError, Currency, LimitScope, MissingLimitPolicy, Money, PaymentRepository, Role,
};

/// Checks a payment amount against the active limit for the maker's role.
///
/// Called twice per payment lifecycle: once at submission and again at
/// approval, because the window keeps moving between the two.
pub(crate) async fn enforce<R: PaymentRepository>(
    repo: &R,
    policy: MissingLimitPolicy,
    role: Role,
    maker: ActorId,
    amount: Money,
) -> Result<(), AppError> {
    let currency: Currency = amount.currency();

    let limit = match repo.find_active_limit(role, currency).await? {
        Some(limit) => limit,
        None => {
            return match policy {
                MissingLimitPolicy::Unrestricted => Ok(()),
                MissingLimitPolicy::Deny => Err(AppError::LimitExceeded {
                    scope: LimitScope::Single,
                    limit: 0,
                    attempted: amount.amount(),
                }),
            };
        }
    };

    if amount.amount() > limit.max_single_amount {
        return Err(AppError::LimitExceeded {
            scope: LimitScope::Single,
            limit: limit.max_single_amount,
            attempted: amount.amount(),
        });
    }

    let since = Utc::now() - Duration::hours(24);
    let spent = repo.sum_spent_since(maker, currency, since).await?;
    let attempted = spent.saturating_add(amount.amount());

    if attempted > limit.max_daily_amount {
        return Err(AppError::LimitExceeded {
            scope: LimitScope::Daily,
            limit: limit.max_daily_amount,
            attempted,
        });
    }

    Ok(())
}
