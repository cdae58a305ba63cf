//! Fuzzy country-name matching against boundary attributes.
//!
//! Resolves a user-supplied country name to one of the COUNTRY values
//! present in the cleaned shapefile, tolerating spelling variations
//! while refusing ambiguous matches.

use strsim::jaro_winkler;
use tracing::debug;

use crate::constants::FUZZY_AMBIGUITY_MARGIN;
use crate::error::{AggregatorError, Result};

/// Resolve a country query against the candidate names from the boundary file.
///
/// With `exact` set, only a case-insensitive equality match is accepted.
/// Otherwise the best Jaro-Winkler match scoring at least `cutoff` wins,
/// unless the runner-up scores within the ambiguity margin of it.
pub fn match_country(
    query: &str,
    candidates: &[String],
    exact: bool,
    cutoff: f64,
) -> Result<String> {
    let trimmed = query.trim();

    if let Some(hit) = candidates
        .iter()
        .find(|c| c.eq_ignore_ascii_case(trimmed))
    {
        return Ok(hit.clone());
    }

    if exact {
        return Err(AggregatorError::CountryNotFound {
            name: trimmed.to_string(),
        });
    }

    let query_lower = trimmed.to_lowercase();
    let mut scored: Vec<(f64, &String)> = candidates
        .iter()
        .map(|c| (jaro_winkler(&query_lower, &c.to_lowercase()), c))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let Some(&(best_score, best)) = scored.first() else {
        return Err(AggregatorError::CountryNotFound {
            name: trimmed.to_string(),
        });
    };

    debug!(
        "Fuzzy match for '{}': best '{}' ({:.3})",
        trimmed, best, best_score
    );

    if best_score < cutoff {
        return Err(AggregatorError::CountryNotFound {
            name: trimmed.to_string(),
        });
    }

    if let Some(&(second_score, second)) = scored.get(1) {
        if second != best && best_score - second_score < FUZZY_AMBIGUITY_MARGIN {
            return Err(AggregatorError::AmbiguousCountry {
                name: trimmed.to_string(),
                first: best.clone(),
                second: second.clone(),
            });
        }
    }

    Ok(best.clone())
}
