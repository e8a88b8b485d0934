use rust_decimal::Decimal;

use super::domain::{MonthlyAggregate, UserReward};

/// Deterministic outcome of distributing one month's pool over the
/// accumulated points.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub total_points: Decimal,
    pub distributed: Decimal,
    pub next_carry_over: Decimal,
    pub rewards: Vec<UserReward>,
}

/// Splits `total_pool` across the month's aggregates.
///
/// With `P` the sum of points and `T` the pool:
/// - `P == 0`: nothing is paid out, the whole pool carries forward.
/// - `0 < P < T`: 1:1 payout, each user receives exactly their points; the
///   remainder carries forward.
/// - `P >= T`: proportional payout, each user receives `points / P * T`.
///
/// The branch boundary is `P >= T`, not `P > T`; at `P == T` both formulas
/// agree.
///
/// Rewards are rounded to 2 decimal places for reporting and sorted by points
/// descending, nickname ascending on ties.
pub fn distribute(total_pool: Decimal, aggregates: &[MonthlyAggregate]) -> Distribution {
    let total_points: Decimal = aggregates.iter().map(|aggregate| aggregate.points).sum();

    let (distributed, next_carry_over) = if total_points.is_zero() {
        (Decimal::ZERO, total_pool)
    } else if total_points < total_pool {
        (total_points, total_pool - total_points)
    } else {
        (total_pool, Decimal::ZERO)
    };

    let mut rewards: Vec<UserReward> = aggregates
        .iter()
        .map(|aggregate| {
            let reward = if total_points.is_zero() {
                Decimal::ZERO
            } else if total_points < total_pool {
                aggregate.points
            } else {
                aggregate.points / total_points * total_pool
            };
            UserReward {
                nickname: aggregate.nickname.clone(),
                points: aggregate.points,
                reward: reward.round_dp(2),
            }
        })
        .collect();
    rewards.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| a.nickname.cmp(&b.nickname))
    });

    Distribution {
        total_points,
        distributed,
        next_carry_over,
        rewards,
    }
}
