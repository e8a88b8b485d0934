use rust_decimal::Decimal;

use super::domain::StageId;

/// Stages below this area never accrue points, whatever the team count.
pub const MIN_SCORING_AREA: u32 = 19;

/// Outcome of the points rule for one approved submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsAward {
    pub points: Decimal,
    pub is_halved: bool,
}

impl PointsAward {
    const NONE: Self = Self {
        points: Decimal::ZERO,
        is_halved: false,
    };
}

fn base_points(team_count: u32) -> Decimal {
    match team_count {
        1 => Decimal::new(1, 1),
        2 => Decimal::new(5, 1),
        3 => Decimal::ONE,
        _ => Decimal::ZERO,
    }
}

/// Maps a stage, the clearing team count, and whether another approved
/// submission already exists for the same stage onto a point award.
///
/// Pure and side-effect free. The `has_other_approved` fact must be computed
/// by the caller against the submission registry, excluding the submission
/// being evaluated, at the moment of approval.
pub fn evaluate(stage: StageId, team_count: u32, has_other_approved: bool) -> PointsAward {
    if stage.area < MIN_SCORING_AREA {
        return PointsAward::NONE;
    }

    let base = base_points(team_count);
    if has_other_approved {
        PointsAward {
            points: base / Decimal::TWO,
            is_halved: true,
        }
    } else {
        PointsAward {
            points: base,
            is_halved: false,
        }
    }
}
