//! Pure transformation from a normalized spec into a wire creation request.

use crate::error::MultipathError;
use crate::model::{MIN_DURATION_SECS, ReservationSpec};
use crate::service::{Constraint, CreateRequest};

/// Reject bad caller input before any remote call is made.
pub fn validate(spec: &ReservationSpec) -> Result<(), MultipathError> {
    if spec.bandwidth <= 0 {
        return Err(MultipathError::InvalidRequest("bandwidth must be positive"));
    }
    if spec.ends_at <= spec.starts_at {
        return Err(MultipathError::InvalidRequest("end time must be after start time"));
    }
    if spec.ends_at - spec.starts_at < MIN_DURATION_SECS {
        return Err(MultipathError::InvalidRequest("duration must be at least 60 seconds"));
    }
    if spec.num_paths < 1 {
        return Err(MultipathError::InvalidRequest("at least one path must be requested"));
    }
    if spec.source.is_empty() {
        return Err(MultipathError::InvalidRequest("source endpoint is empty"));
    }
    let dest_ok = match &spec.destination {
        crate::model::Destination::Single(d) => !d.is_empty(),
        crate::model::Destination::Candidates(c) => {
            !c.is_empty() && c.iter().all(|d| !d.is_empty())
        }
    };
    if !dest_ok {
        return Err(MultipathError::InvalidRequest("destination endpoint is empty"));
    }
    Ok(())
}

/// Build one wire creation request against a single destination.
///
/// Tagged endpoints carry their explicit VLAN value, untagged ones "any".
/// Each entry in `avoid` becomes one ordered avoidance constraint; the
/// computed path must be link-disjoint from all of them.
pub fn build_create_request(
    spec: &ReservationSpec,
    destination: &str,
    avoid: &[String],
) -> Result<CreateRequest, MultipathError> {
    validate(spec)?;

    Ok(CreateRequest {
        description: spec.description.clone(),
        source: spec.source.clone(),
        source_tagged: spec.source_tag.is_tagged(),
        source_vlan: spec.source_tag.wire_value().to_string(),
        destination: destination.to_string(),
        destination_tagged: spec.destination_tag.is_tagged(),
        destination_vlan: spec.destination_tag.wire_value().to_string(),
        bandwidth: spec.bandwidth,
        setup_mode: spec.setup_mode,
        starts_at: spec.starts_at,
        ends_at: spec.ends_at,
        constraints: avoid.iter().map(Constraint::avoid_path).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Destination, PathSetupMode, TagState};
    use crate::service::MULTIPATH_CONSTRAINT;

    fn spec() -> ReservationSpec {
        ReservationSpec {
            description: "test circuit".into(),
            source: "urn:domain=es.net:node=SUNN:port=1:link=1".into(),
            source_tag: TagState::Untagged,
            destination: Destination::Single("urn:domain=es.net:node=DENV:port=4:link=1".into()),
            destination_tag: TagState::Tagged("3021".into()),
            bandwidth: 100,
            setup_mode: PathSetupMode::TimerAutomatic,
            starts_at: 1_700_000_000,
            ends_at: 1_700_003_600,
            num_paths: 1,
            avoid: Vec::new(),
        }
    }

    #[test]
    fn vlan_tagging_rules() {
        let req = build_create_request(&spec(), "dst", &[]).unwrap();
        assert!(!req.source_tagged);
        assert_eq!(req.source_vlan, "any");
        assert!(req.destination_tagged);
        assert_eq!(req.destination_vlan, "3021");
    }

    #[test]
    fn avoidance_constraints_in_order() {
        let avoid = vec!["a;b;".to_string(), "c;d;".to_string()];
        let req = build_create_request(&spec(), "dst", &avoid).unwrap();
        assert_eq!(req.constraints.len(), 2);
        assert_eq!(req.constraints[0].category, MULTIPATH_CONSTRAINT);
        assert_eq!(req.constraints[0].value, "a;b;");
        assert_eq!(req.constraints[1].value, "c;d;");
    }

    #[test]
    fn rejects_non_positive_bandwidth() {
        let mut s = spec();
        s.bandwidth = 0;
        assert!(matches!(
            build_create_request(&s, "dst", &[]),
            Err(MultipathError::InvalidRequest(_))
        ));
        s.bandwidth = -5;
        assert!(build_create_request(&s, "dst", &[]).is_err());
    }

    #[test]
    fn rejects_inverted_window() {
        let mut s = spec();
        s.ends_at = s.starts_at;
        assert!(build_create_request(&s, "dst", &[]).is_err());
        s.ends_at = s.starts_at - 100;
        assert!(build_create_request(&s, "dst", &[]).is_err());
    }

    #[test]
    fn rejects_short_duration() {
        let mut s = spec();
        s.ends_at = s.starts_at + 59;
        assert!(build_create_request(&s, "dst", &[]).is_err());
        s.ends_at = s.starts_at + 60;
        assert!(build_create_request(&s, "dst", &[]).is_ok());
    }

    #[test]
    fn rejects_empty_endpoints() {
        let mut s = spec();
        s.source = String::new();
        assert!(validate(&s).is_err());

        let mut s = spec();
        s.destination = Destination::Single(String::new());
        assert!(validate(&s).is_err());

        let mut s = spec();
        s.destination = Destination::Candidates(vec!["a".into(), String::new()]);
        assert!(validate(&s).is_err());
    }

    #[test]
    fn rejects_zero_paths() {
        let mut s = spec();
        s.num_paths = 0;
        assert!(validate(&s).is_err());
    }
}
