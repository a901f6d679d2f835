//! Stable/boundary/unstable ordering checks.
//!
//! A unit's resolved include list must contain the boundary exactly once,
//! every stable header before it and every unstable header after it.
//! Neutral headers may appear anywhere. Headers that occur more than once
//! are checked at every occurrence, so the first occurrence fixes the
//! header's side and any later occurrence on the other side is reported.

use crate::builder::errors::OrderingViolation;
use crate::core::header::{HeaderId, HeaderRole, RoleMap};
use crate::core::unit::BoundaryMarker;

/// Index of the boundary in a valid include list, or the first violation.
pub type ValidationResult = Result<usize, OrderingViolation>;

/// Checks include ordering against per-header roles.
///
/// Pure: no I/O, no shared state.
#[derive(Debug, Clone, Copy)]
pub struct OrderingValidator<'a> {
    roles: &'a RoleMap,
}

impl<'a> OrderingValidator<'a> {
    pub fn new(roles: &'a RoleMap) -> Self {
        OrderingValidator { roles }
    }

    /// Validate one unit's resolved include sequence.
    ///
    /// Boundary problems are reported first, then the first stable header
    /// after the boundary, then the first unstable header before it.
    pub fn validate(&self, resolved: &[HeaderId], boundary: &BoundaryMarker) -> ValidationResult {
        let mut boundary_positions = Vec::new();
        let mut unstable_before: Option<usize> = None;
        let mut stable_after: Option<usize> = None;

        for (position, header) in resolved.iter().enumerate() {
            if boundary.is(header) {
                boundary_positions.push(position);
                continue;
            }

            let past_boundary = !boundary_positions.is_empty();
            match self.roles.role_of(header) {
                HeaderRole::Unstable if !past_boundary && unstable_before.is_none() => {
                    unstable_before = Some(position);
                }
                HeaderRole::Stable if past_boundary && stable_after.is_none() => {
                    stable_after = Some(position);
                }
                _ => {}
            }
        }

        let boundary_position = match boundary_positions.as_slice() {
            [] => {
                return Err(OrderingViolation::BoundaryMissing {
                    boundary: boundary.name().to_string(),
                })
            }
            [single] => *single,
            _ => {
                return Err(OrderingViolation::BoundaryDuplicated {
                    boundary: boundary.name().to_string(),
                    positions: boundary_positions,
                })
            }
        };

        if let Some(position) = stable_after {
            return Err(OrderingViolation::StableAfterBoundary {
                header: resolved[position].clone(),
                position,
                boundary: boundary.name().to_string(),
                boundary_position,
            });
        }

        if let Some(position) = unstable_before {
            return Err(OrderingViolation::UnstableBeforeBoundary {
                header: resolved[position].clone(),
                position,
                boundary: boundary.name().to_string(),
                boundary_position,
            });
        }

        Ok(boundary_position)
    }
}

/// Split a validated include list into the stable prefix (boundary
/// included) and the unstable suffix.
pub fn split_at_boundary(resolved: &[HeaderId], boundary_position: usize) -> (&[HeaderId], &[HeaderId]) {
    resolved.split_at(boundary_position + 1)
}

/// The unit's own includes that lie inside the stable prefix, in order.
///
/// `direct` is the unit's include list resolved without expansion and
/// `stable` the expanded prefix from [`split_at_boundary`]. Headers only
/// reached through another include are left out.
pub fn direct_stable_includes(direct: &[HeaderId], stable: &[HeaderId]) -> Vec<HeaderId> {
    let mut remaining = stable.iter();
    direct
        .iter()
        .take_while(|header| remaining.any(|h| h == *header))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> RoleMap {
        RoleMap::new()
            .with("another.h", HeaderRole::Stable)
            .with("unstable.h", HeaderRole::Unstable)
    }

    fn headers(names: &[&str]) -> Vec<HeaderId> {
        names.iter().map(|n| HeaderId::new(format!("/proj/{}", n))).collect()
    }

    fn boundary() -> BoundaryMarker {
        BoundaryMarker::new("stable.h")
    }

    #[test]
    fn test_valid_ordering() {
        let roles = roles();
        let list = headers(&["another.h", "stable.h", "unstable.h"]);
        assert_eq!(OrderingValidator::new(&roles).validate(&list, &boundary()), Ok(1));
    }

    #[test]
    fn test_stable_after_boundary() {
        let roles = roles();
        let list = headers(&["unstable.h", "stable.h", "another.h"]);
        let err = OrderingValidator::new(&roles)
            .validate(&list, &boundary())
            .unwrap_err();

        // Stable-after-boundary takes precedence over unstable-before-boundary.
        assert_eq!(err.kind(), "stable-after-boundary");
        assert_eq!(err.header(), Some(&HeaderId::new("/proj/another.h")));

        let list = headers(&["stable.h", "unstable.h", "another.h"]);
        let err = OrderingValidator::new(&roles)
            .validate(&list, &boundary())
            .unwrap_err();
        assert_eq!(err.kind(), "stable-after-boundary");
        assert_eq!(err.header(), Some(&HeaderId::new("/proj/another.h")));
    }

    #[test]
    fn test_unstable_before_boundary() {
        let roles = roles();
        let list = headers(&["another.h", "unstable.h", "stable.h"]);
        let err = OrderingValidator::new(&roles)
            .validate(&list, &boundary())
            .unwrap_err();
        assert_eq!(
            err,
            OrderingViolation::UnstableBeforeBoundary {
                header: HeaderId::new("/proj/unstable.h"),
                position: 1,
                boundary: "stable.h".to_string(),
                boundary_position: 2,
            }
        );
    }

    #[test]
    fn test_stable_after_boundary_with_unclassified_unstable_side() {
        let roles = RoleMap::new().with("another.h", HeaderRole::Stable);
        let list = headers(&["unstable.h", "stable.h", "another.h"]);
        let err = OrderingValidator::new(&roles)
            .validate(&list, &boundary())
            .unwrap_err();
        assert_eq!(
            err,
            OrderingViolation::StableAfterBoundary {
                header: HeaderId::new("/proj/another.h"),
                position: 2,
                boundary: "stable.h".to_string(),
                boundary_position: 1,
            }
        );
    }

    #[test]
    fn test_boundary_missing() {
        let roles = roles();
        let list = headers(&["another.h", "unstable.h"]);
        let err = OrderingValidator::new(&roles)
            .validate(&list, &boundary())
            .unwrap_err();
        assert_eq!(err.kind(), "boundary missing");
    }

    #[test]
    fn test_boundary_duplicated() {
        let roles = roles();
        let list = headers(&["stable.h", "another.h", "stable.h"]);
        let err = OrderingValidator::new(&roles)
            .validate(&list, &boundary())
            .unwrap_err();
        assert_eq!(
            err,
            OrderingViolation::BoundaryDuplicated {
                boundary: "stable.h".to_string(),
                positions: vec![0, 2],
            }
        );
    }

    #[test]
    fn test_neutral_headers_ignored() {
        let roles = roles();
        let list = headers(&["stdio.h", "another.h", "stable.h", "stdio.h", "unstable.h"]);
        assert_eq!(OrderingValidator::new(&roles).validate(&list, &boundary()), Ok(2));
    }

    #[test]
    fn test_repeated_stable_header_after_boundary_is_flagged() {
        let roles = roles();
        let list = headers(&["another.h", "stable.h", "unstable.h", "another.h"]);
        let err = OrderingValidator::new(&roles)
            .validate(&list, &boundary())
            .unwrap_err();
        assert_eq!(err.kind(), "stable-after-boundary");
        assert!(matches!(
            err,
            OrderingViolation::StableAfterBoundary { position: 3, .. }
        ));
    }

    #[test]
    fn test_empty_list() {
        let roles = roles();
        assert!(OrderingValidator::new(&roles).validate(&[], &boundary()).is_err());
    }

    #[test]
    fn test_split_at_boundary() {
        let list = headers(&["another.h", "stable.h", "unstable.h"]);
        let (stable, unstable) = split_at_boundary(&list, 1);
        assert_eq!(stable.len(), 2);
        assert!(stable[1].matches("stable.h"));
        assert_eq!(unstable, &list[2..]);
    }

    #[test]
    fn test_direct_stable_includes_skip_nested() {
        let resolved = headers(&["another.h", "common.h", "stable.h", "unstable.h"]);
        let direct = headers(&["another.h", "stable.h", "unstable.h"]);
        let (stable, _) = split_at_boundary(&resolved, 2);

        assert_eq!(
            direct_stable_includes(&direct, stable),
            headers(&["another.h", "stable.h"])
        );
    }

    #[test]
    fn test_direct_stable_includes_with_nested_boundary() {
        // stable.h is only reached through pch.h
        let resolved = headers(&["pch.h", "another.h", "stable.h", "unstable.h"]);
        let direct = headers(&["pch.h", "unstable.h"]);
        let (stable, _) = split_at_boundary(&resolved, 2);

        assert_eq!(direct_stable_includes(&direct, stable), headers(&["pch.h"]));
    }
}
