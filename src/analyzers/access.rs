//! Food access classification and desert ranking.

use crate::analyzers::error::AnalysisError;
use crate::analyzers::types::{
    AccessAssessment, AccessCategory, AreaFoodAccess, Classification, Priority,
};
use crate::config::ClassifierConfig;

pub const DESERT_ACTION: &str = "Deploy mobile distribution (primary target)";
pub const SCARCE_ACTION: &str = "Deploy mobile distribution (secondary target)";
pub const SWAMP_ACTION: &str =
    "Pursue retailer partnership (stock healthy items) rather than deploying a truck";
pub const HEALTHY_ACTION: &str = "No intervention required";

/// Classifies a single area. First matching rule wins.
///
/// | Condition                              | Category       | Priority |
/// |----------------------------------------|----------------|----------|
/// | no retailers                           | Desert         | HIGH     |
/// | fewer than `scarce_retailer_threshold` | Scarce         | MEDIUM   |
/// | score < `healthy_score_swamp_threshold`| Swamp          | MEDIUM   |
/// | otherwise                              | Healthy Access | LOW      |
///
/// # Errors
///
/// [`AnalysisError::InvalidAreaRecord`] for a negative retailer count, or a
/// missing, NaN or out-of-range score on an area that has retailers.
pub fn classify(
    area: &AreaFoodAccess,
    config: &ClassifierConfig,
) -> Result<Classification, AnalysisError> {
    if area.total_retailers < 0 {
        return Err(AnalysisError::invalid_area(
            &area.area_id,
            format!("negative retailer count {}", area.total_retailers),
        ));
    }

    if area.total_retailers == 0 {
        return Ok(Classification {
            category: AccessCategory::Desert,
            priority: Priority::High,
            action: DESERT_ACTION,
        });
    }

    let score = match area.healthy_score {
        Some(s) if !s.is_nan() => s,
        _ => {
            return Err(AnalysisError::invalid_area(
                &area.area_id,
                format!(
                    "missing healthy score with {} retailers",
                    area.total_retailers
                ),
            ));
        }
    };
    if !(0.0..=config.healthy_score_max).contains(&score) {
        return Err(AnalysisError::invalid_area(
            &area.area_id,
            format!(
                "healthy score {score} outside 0..={}",
                config.healthy_score_max
            ),
        ));
    }

    if let Some(scarce) = config.scarce_retailer_threshold {
        if area.total_retailers < scarce {
            return Ok(Classification {
                category: AccessCategory::Scarce,
                priority: Priority::Medium,
                action: SCARCE_ACTION,
            });
        }
    }

    if score < config.healthy_score_swamp_threshold {
        Ok(Classification {
            category: AccessCategory::Swamp,
            priority: Priority::Medium,
            action: SWAMP_ACTION,
        })
    } else {
        Ok(Classification {
            category: AccessCategory::HealthyAccess,
            priority: Priority::Low,
            action: HEALTHY_ACTION,
        })
    }
}

/// Classifies every area, preserving order. Fails on the first invalid record.
pub fn classify_all(
    areas: &[AreaFoodAccess],
    config: &ClassifierConfig,
) -> Result<Vec<Classification>, AnalysisError> {
    areas.iter().map(|a| classify(a, config)).collect()
}

/// Like [`classify_all`], but returns flattened output rows.
pub fn assess_all(
    areas: &[AreaFoodAccess],
    config: &ClassifierConfig,
) -> Result<Vec<AccessAssessment>, AnalysisError> {
    areas.iter().map(|a| assess(a, config)).collect()
}

pub fn assess(
    area: &AreaFoodAccess,
    config: &ClassifierConfig,
) -> Result<AccessAssessment, AnalysisError> {
    let c = classify(area, config)?;
    Ok(AccessAssessment {
        area_id: area.area_id.clone(),
        tract_name: tract_display_name(&area.area_id),
        region: area.region.clone(),
        total_retailers: area.total_retailers,
        healthy_retailers: area.healthy_retailers,
        healthy_score: area.healthy_score,
        healthy_ratio: area.healthy_ratio(),
        category: c.category,
        priority: c.priority,
        action: c.action,
        color: c.category.color(),
    })
}

/// Returns the food deserts among `areas`, ordered by `key`.
///
/// The sort is stable, so areas with equal keys keep their input order.
pub fn rank_deserts<'a, K, F>(
    areas: &'a [AreaFoodAccess],
    config: &ClassifierConfig,
    mut key: F,
) -> Result<Vec<&'a AreaFoodAccess>, AnalysisError>
where
    K: Ord,
    F: FnMut(&AreaFoodAccess) -> K,
{
    let mut deserts = Vec::new();
    for area in areas {
        if classify(area, config)?.category == AccessCategory::Desert {
            deserts.push(area);
        }
    }
    deserts.sort_by_key(|a| key(a));
    Ok(deserts)
}

/// The `limit` areas with the lowest score, ties broken by `area_id`.
/// Areas without a score are left out.
pub fn rank_highest_need(areas: &[AreaFoodAccess], limit: usize) -> Vec<&AreaFoodAccess> {
    let mut scored: Vec<(&AreaFoodAccess, f64)> = areas
        .iter()
        .filter_map(|a| match a.healthy_score {
            Some(s) if s.is_finite() => Some((a, s)),
            _ => None,
        })
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| sa.total_cmp(sb).then_with(|| a.area_id.cmp(&b.area_id)));
    scored.into_iter().take(limit).map(|(a, _)| a).collect()
}

/// Formats a tract code as a readable name.
///
/// `6013355112` (state 6, county 013, tract 3551.12) becomes
/// `Census Tract 3551.12`. Codes too short to split are returned as-is.
pub fn tract_display_name(area_id: &str) -> String {
    if !area_id.bytes().all(|b| b.is_ascii_digit()) {
        return area_id.to_string();
    }
    let code = match area_id.len() {
        11 => &area_id[5..],
        10 => &area_id[4..],
        n if n >= 6 => &area_id[n - 6..],
        _ => return area_id.to_string(),
    };
    let (whole, frac) = code.split_at(code.len() - 2);
    let whole = match whole.trim_start_matches('0') {
        "" => "0",
        w => w,
    };
    format!("Census Tract {whole}.{frac}")
}
