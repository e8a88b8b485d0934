use crate::infra::InMemorySubmissionRegistry;
use chrono::{NaiveDate, NaiveDateTime};
use clap::Args;
use points_engine::engine::{
    ApprovedSubmission, MemoryPointsStore, PointsEngine, StageId, SubmissionId, SystemClock,
    YearMonth, DEFAULT_BASE_POOL,
};
use points_engine::error::AppError;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Base pool for the demo month (defaults to the standard amount)
    #[arg(long)]
    pub(crate) base_pool: Option<Decimal>,
    /// Skip the reversal step of the replay
    #[arg(long)]
    pub(crate) skip_reversal: bool,
}

struct DemoSubmission {
    id: &'static str,
    nickname: &'static str,
    stage: StageId,
    team_count: u32,
    submitted_at: NaiveDateTime,
}

fn demo_month() -> YearMonth {
    YearMonth::new(2026, 7).expect("valid demo month")
}

fn demo_submissions() -> Vec<DemoSubmission> {
    let at = |day: u32, hour: u32| -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, day)
            .expect("valid demo date")
            .and_hms_opt(hour, 0, 0)
            .expect("valid demo time")
    };

    vec![
        DemoSubmission {
            id: "hw-1001",
            nickname: "alice",
            stage: StageId::new(19, 1),
            team_count: 3,
            submitted_at: at(2, 9),
        },
        DemoSubmission {
            id: "hw-1002",
            nickname: "bob",
            stage: StageId::new(19, 1),
            team_count: 3,
            submitted_at: at(3, 14),
        },
        DemoSubmission {
            id: "hw-1003",
            nickname: "alice",
            stage: StageId::new(20, 2),
            team_count: 2,
            submitted_at: at(8, 11),
        },
        DemoSubmission {
            id: "hw-1004",
            nickname: "carol",
            stage: StageId::new(12, 3),
            team_count: 3,
            submitted_at: at(12, 16),
        },
        DemoSubmission {
            id: "hw-1005",
            nickname: "dave",
            stage: StageId::new(21, 1),
            team_count: 1,
            submitted_at: at(19, 10),
        },
    ]
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let base_pool = args.base_pool.unwrap_or(DEFAULT_BASE_POOL);
    let store = Arc::new(MemoryPointsStore::new(base_pool));
    let clock = Arc::new(SystemClock);
    let engine = PointsEngine::new(store, clock);
    let registry = InMemorySubmissionRegistry::default();
    let month = demo_month();

    println!("Points settlement demo ({month}, base pool {base_pool})");

    println!("\nApproved submissions");
    for submission in demo_submissions() {
        let submission_id = SubmissionId(submission.id.to_string());
        let has_other_approved = registry.has_other_approved(submission.stage, &submission_id);
        let outcome = engine.record_approval(
            ApprovedSubmission {
                submission_id: submission_id.clone(),
                nickname: submission.nickname.to_string(),
                stage: submission.stage,
                team_count: submission.team_count,
                submitted_at: submission.submitted_at,
            },
            has_other_approved,
        )?;
        registry.mark_approved(submission_id, submission.stage);

        let note = if outcome.entry.is_halved {
            " (halved, stage already cleared)"
        } else if outcome.entry.points.is_zero() {
            " (area below scoring threshold)"
        } else {
            ""
        };
        println!(
            "- {} by {} on stage {}: {} points{}",
            submission.id, submission.nickname, submission.stage, outcome.entry.points, note
        );
    }

    if !args.skip_reversal {
        let retracted = SubmissionId("hw-1005".to_string());
        if let Some(reversal) = engine.record_reversal(&retracted)? {
            registry.mark_reversed(&retracted);
            println!(
                "\nReversal: {} retracted, {} points removed",
                retracted, reversal.entry.points
            );
        }
    }

    println!("\nStandings before settlement");
    let leaderboard = engine.leaderboard(month)?;
    for entry in &leaderboard.entries {
        println!(
            "{:>2}. {} - {} points across {} submissions (projected reward {})",
            entry.rank, entry.nickname, entry.points, entry.homework_count, entry.reward
        );
    }

    let report = engine.settle(month)?;
    println!("\nSettlement for {}", report.year_month);
    println!("- pool {} against {} points", report.total_pool, report.total_points);
    println!(
        "- {} distributed, {} carried over",
        report.distributed, report.next_carry_over
    );
    for reward in &report.rewards {
        println!("  - {} receives {}", reward.nickname, reward.reward);
    }

    let next = engine.pool(month.next())?;
    println!(
        "\nNext month {} opens with {} (base {} + carry-over {})",
        next.year_month, next.total_pool, next.base_pool, next.carry_over
    );

    Ok(())
}
