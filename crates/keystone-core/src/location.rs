//! # Location Resolver
//!
//! Finds the front (sellable) and reserve (storage) locations of a branch.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  For each role (front, then reserve):                                   │
//! │                                                                         │
//! │  1. Active locations with role flag == role                             │
//! │       exactly one  → use it                                             │
//! │       two or more  → AmbiguousLocation                                  │
//! │       none         → step 2                                             │
//! │                                                                         │
//! │  2. Unflagged active locations whose name is a conventional alias      │
//! │       front:   front · display · sales floor · showroom                 │
//! │       reserve: reserve · back room · backroom · storage · warehouse     │
//! │     (case-insensitive; '-', '_' and repeated spaces count as a space)   │
//! │       exactly one  → use it                                             │
//! │       two or more  → AmbiguousLocation                                  │
//! │       none         → MissingLocation                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ConfigurationError;
use crate::types::{Location, LocationRole};

/// Names recognized as the front when no location carries the flag.
pub const FRONT_NAMES: &[&str] = &["front", "display", "sales floor", "showroom"];

/// Names recognized as the reserve when no location carries the flag.
pub const RESERVE_NAMES: &[&str] = &["reserve", "back room", "backroom", "storage", "warehouse"];

/// The two locations allocation works between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BranchLocations {
    pub front: Location,
    pub reserve: Location,
}

/// Resolves front and reserve among `locations` (all belonging to `branch_id`).
pub fn resolve_locations(
    branch_id: &str,
    locations: &[Location],
) -> Result<BranchLocations, ConfigurationError> {
    let front = resolve_role(branch_id, locations, LocationRole::Front)?;
    let reserve = resolve_role(branch_id, locations, LocationRole::Reserve)?;
    Ok(BranchLocations { front, reserve })
}

fn resolve_role(
    branch_id: &str,
    locations: &[Location],
    role: LocationRole,
) -> Result<Location, ConfigurationError> {
    let active = locations
        .iter()
        .filter(|l| l.is_active && l.branch_id == branch_id);

    let flagged: Vec<&Location> = active.clone().filter(|l| l.role == Some(role)).collect();
    if let Some(found) = single(branch_id, role, &flagged)? {
        return Ok(found);
    }

    let aliases = match role {
        LocationRole::Front => FRONT_NAMES,
        LocationRole::Reserve => RESERVE_NAMES,
    };
    let named: Vec<&Location> = active
        .filter(|l| l.role.is_none())
        .filter(|l| aliases.contains(&normalize_name(&l.name).as_str()))
        .collect();

    single(branch_id, role, &named)?.ok_or_else(|| ConfigurationError::MissingLocation {
        branch_id: branch_id.to_string(),
        role,
    })
}

fn single(
    branch_id: &str,
    role: LocationRole,
    candidates: &[&Location],
) -> Result<Option<Location>, ConfigurationError> {
    match candidates {
        [] => Ok(None),
        [only] => Ok(Some((*only).clone())),
        many => Err(ConfigurationError::AmbiguousLocation {
            branch_id: branch_id.to_string(),
            role,
            candidates: many.iter().map(|l| l.id.clone()).collect(),
        }),
    }
}

/// "Sales-Floor", "sales_floor" and "  SALES   FLOOR " all become "sales floor".
fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(id: &str, name: &str, role: Option<LocationRole>) -> Location {
        Location {
            id: id.to_string(),
            branch_id: "b-1".to_string(),
            name: name.to_string(),
            role,
            is_active: true,
        }
    }

    #[test]
    fn test_flags_win_over_names() {
        let locations = vec![
            loc("l-1", "Front", None),
            loc("l-2", "Counter", Some(LocationRole::Front)),
            loc("l-3", "Cellar", Some(LocationRole::Reserve)),
        ];
        let resolved = resolve_locations("b-1", &locations).unwrap();
        assert_eq!(resolved.front.id, "l-2");
        assert_eq!(resolved.reserve.id, "l-3");
    }

    #[test]
    fn test_name_fallback_is_case_insensitive() {
        let locations = vec![
            loc("l-1", "Sales-Floor", None),
            loc("l-2", "  BACK room ", None),
        ];
        let resolved = resolve_locations("b-1", &locations).unwrap();
        assert_eq!(resolved.front.id, "l-1");
        assert_eq!(resolved.reserve.id, "l-2");
    }

    #[test]
    fn test_missing_reserve_is_configuration_error() {
        let locations = vec![loc("l-1", "Display", None), loc("l-2", "Office", None)];
        let err = resolve_locations("b-1", &locations).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingLocation {
                branch_id: "b-1".to_string(),
                role: LocationRole::Reserve,
            }
        );
    }

    #[test]
    fn test_two_flagged_fronts_are_ambiguous() {
        let locations = vec![
            loc("l-1", "A", Some(LocationRole::Front)),
            loc("l-2", "B", Some(LocationRole::Front)),
            loc("l-3", "Storage", None),
        ];
        let err = resolve_locations("b-1", &locations).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::AmbiguousLocation { role: LocationRole::Front, ref candidates, .. }
                if candidates.len() == 2
        ));
    }

    #[test]
    fn test_inactive_and_foreign_locations_ignored() {
        let mut closed = loc("l-1", "Front", None);
        closed.is_active = false;
        let mut other_branch = loc("l-2", "Front", None);
        other_branch.branch_id = "b-2".to_string();
        let locations = vec![closed, other_branch, loc("l-3", "Warehouse", None)];

        let err = resolve_locations("b-1", &locations).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingLocation { role: LocationRole::Front, .. }
        ));
    }
}
