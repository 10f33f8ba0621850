use super::backfill::AnalyticKind;
use super::{fail, open_store, parse_date_or_today, runtime};
use crate::services::{MomentumStore, RelativeStrengthStore};

/// Delete analytic records dated before `before`; `None` prunes both tables
pub fn run(before: String, kind: Option<AnalyticKind>) {
    let before = match parse_date_or_today(Some(&before)) {
        Ok(d) => d,
        Err(e) => fail("Invalid arguments", e),
    };

    println!("🧹 Pruning analytic records before {}", before);

    let result = runtime().block_on(async {
        let store = open_store().await?;
        let mut momentum = 0;
        let mut strength = 0;
        if kind != Some(AnalyticKind::RelativeStrength) {
            momentum = store.delete_momentum_before(before).await?;
        }
        if kind != Some(AnalyticKind::Momentum) {
            strength = store.delete_relative_strength_before(before).await?;
        }
        store.close().await;
        Ok::<_, crate::error::AppError>((momentum, strength))
    });

    match result {
        Ok((momentum, strength)) => {
            println!("   🗑️  Momentum records removed:          {}", momentum);
            println!("   🗑️  Relative strength records removed: {}", strength);
        }
        Err(e) => fail("Prune failed", e),
    }
}
