//! Reservation identifiers and the display-order comparator.
//!
//! The remote service hands out opaque unicast ids; groups get synthetic
//! `MP-<n>` ids allocated locally. Classification happens once, here, at the
//! boundary — everything downstream works with the tagged [`ReservationId`].

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Prefix marking a synthetic group identifier.
pub const GROUP_PREFIX: &str = "MP-";

/// Opaque identifier of one unicast circuit, assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnicastId(pub String);

impl UnicastId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UnicastId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Synthetic identifier of a reservation group, rendered `MP-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{GROUP_PREFIX}{}", self.0)
    }
}

/// A reservation identifier, classified at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReservationId {
    Unicast(UnicastId),
    Group(GroupId),
}

impl ReservationId {
    /// Classify an identifier string. Only a well-formed `MP-<n>` is a
    /// group; anything else is treated as a unicast id.
    pub fn parse(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix(GROUP_PREFIX)
            && let Ok(n) = rest.parse::<u64>()
        {
            return ReservationId::Group(GroupId(n));
        }
        ReservationId::Unicast(UnicastId(s.to_string()))
    }

    pub fn as_unicast(&self) -> Option<&UnicastId> {
        match self {
            ReservationId::Unicast(id) => Some(id),
            ReservationId::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<GroupId> {
        match self {
            ReservationId::Group(id) => Some(*id),
            ReservationId::Unicast(_) => None,
        }
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationId::Unicast(id) => id.fmt(f),
            ReservationId::Group(id) => id.fmt(f),
        }
    }
}

/// Display-order comparator for identifiers with numeric suffixes.
///
/// Plain lexicographic sorting puts "x-100" before "x-2"; this comparator
/// makes "x-2" sort first. Equal-length strings compare lexicographically.
/// For different lengths: if the lexicographically smaller string is
/// literally contained in the larger one (e.g. "10" inside "100"), the
/// lexicographic sign stands; if the sign contradicts the length ordering,
/// it is inverted so the shorter (assumed numerically smaller) string sorts
/// first; otherwise the lexicographic result stands.
///
/// This is a heuristic over id strings, not numeric parsing. Its exact
/// branch structure is load-bearing for display compatibility — change it
/// only together with the pinned tests below.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let lex = a.cmp(b);
    if a.len() == b.len() {
        return lex;
    }
    match lex {
        Ordering::Less if b.contains(a) => lex,
        Ordering::Greater if a.contains(b) => lex,
        Ordering::Less if b.len() < a.len() => lex.reverse(),
        Ordering::Greater if a.len() < b.len() => lex.reverse(),
        _ => lex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_group_id() {
        assert_eq!(ReservationId::parse("MP-7"), ReservationId::Group(GroupId(7)));
        assert_eq!(ReservationId::parse("MP-0"), ReservationId::Group(GroupId(0)));
    }

    #[test]
    fn parse_unicast_id() {
        let id = ReservationId::parse("es.net-41");
        assert_eq!(id, ReservationId::Unicast(UnicastId("es.net-41".into())));
    }

    #[test]
    fn malformed_group_prefix_is_unicast() {
        // "MP-" followed by anything but digits is not one of our groups
        assert!(ReservationId::parse("MP-abc").as_unicast().is_some());
        assert!(ReservationId::parse("MP-").as_unicast().is_some());
    }

    #[test]
    fn group_id_round_trips_through_display() {
        let id = GroupId(12);
        assert_eq!(ReservationId::parse(&id.to_string()), ReservationId::Group(id));
    }

    #[test]
    fn equal_length_matches_lexicographic() {
        for (a, b) in [("abc", "abd"), ("x-1", "x-2"), ("foo", "foo"), ("b-9", "a-9")] {
            assert_eq!(natural_cmp(a, b), a.cmp(b), "{a} vs {b}");
        }
    }

    #[test]
    fn numeric_suffixes_sort_naturally() {
        let mut ids = vec!["a10", "a2", "a11", "a1", "a9"];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(ids, vec!["a1", "a2", "a9", "a10", "a11"]);
    }

    #[test]
    fn containment_keeps_lexicographic_sign() {
        // "10" is contained in "100": plain lexicographic order stands
        assert_eq!(natural_cmp("es.net-10", "es.net-100"), Ordering::Less);
        assert_eq!(natural_cmp("es.net-100", "es.net-10"), Ordering::Greater);
    }

    #[test]
    fn length_contradiction_inverts_sign() {
        // "100" < "20" lexicographically but the shorter string sorts first
        assert_eq!(natural_cmp("es.net-100", "es.net-20"), Ordering::Greater);
        assert_eq!(natural_cmp("es.net-20", "es.net-100"), Ordering::Less);
    }

    #[test]
    fn gri_listing_order() {
        let mut ids = vec![
            "es.net-1", "es.net-100", "es.net-2", "es.net-10", "es.net-101", "es.net-11",
        ];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(
            ids,
            vec!["es.net-1", "es.net-2", "es.net-10", "es.net-11", "es.net-100", "es.net-101"]
        );
    }
}
