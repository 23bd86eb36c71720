//! Deterministic plain-text certificate rendering.
//!
//! Given a verified individual, produces a fixed-format block suitable for
//! logging or display; the crate does no file or network I/O itself, so
//! whatever the caller does with the rendered string is up to them.

#![forbid(unsafe_code)]

use std::fmt::Write as _;

use crate::agent::Individual;

const NO_CERTIFICATE: &str = "No proof certificate available";

/// Renders `individual`'s verification record as a delimited plain-text
/// block. Returns [`NO_CERTIFICATE`] verbatim if the individual has not
/// passed the gate.
pub fn render(individual: &Individual) -> String {
    let Some(proof) = &individual.proof else {
        return NO_CERTIFICATE.to_string();
    };
    if !proof.verified {
        return NO_CERTIFICATE.to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "=== verification certificate ===");
    let _ = writeln!(out, "id: {}", individual.id);
    let _ = writeln!(out, "kind: {}", individual.kind_label());
    let _ = writeln!(out, "generation: {}", individual.generation);
    let _ = writeln!(out, "verified-at: {}", proof.timestamp.to_rfc3339());
    let _ = writeln!(out, "verified: {}", proof.verified);
    let _ = writeln!(out, "spec-summary: {}", proof.spec_summary);
    let _ = writeln!(out, "proof-blob: {}", proof.proof_blob);
    let _ = writeln!(out, "checks:");
    for check in &proof.checks {
        let _ = writeln!(out, "  - {} [{}] value={} threshold={:?}", check.name, if check.passed { "pass" } else { "fail" }, check.value, check.threshold);
    }
    let _ = writeln!(out, "lineage: {}", individual.lineage.join(" -> "));
    let _ = write!(out, "=== end certificate ===");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Kind;
    use crate::proof_gate::{CheckResult, VerificationRecord};
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn unverified_individual_renders_the_fixed_message() {
        let ind = Individual::genesis("agent-0", Kind::Generic, 2, 2, now());
        assert_eq!(render(&ind), NO_CERTIFICATE);
    }

    #[test]
    fn verified_individual_renders_a_full_block() {
        let mut ind = Individual::genesis("agent-0", Kind::Trader, 2, 2, now());
        ind.proof = Some(VerificationRecord {
            spec_summary: "2 of 2 checks passed".to_string(),
            proof_blob: "deadbeef".to_string(),
            verified: true,
            timestamp: now(),
            checks: vec![CheckResult { name: "cost".to_string(), passed: true, value: 1.0, threshold: Some(2.0), message: "ok".to_string() }],
        });
        let rendered = render(&ind);
        assert!(rendered.contains("id: agent-0"));
        assert!(rendered.contains("kind: trader"));
        assert!(rendered.contains("proof-blob: deadbeef"));
        assert!(rendered.contains("cost"));
    }

    #[test]
    fn a_failed_record_still_renders_the_fixed_message() {
        let mut ind = Individual::genesis("agent-0", Kind::Generic, 2, 2, now());
        ind.proof = Some(VerificationRecord {
            spec_summary: "0 of 1 checks passed".to_string(),
            proof_blob: "abc123".to_string(),
            verified: false,
            timestamp: now(),
            checks: vec![],
        });
        assert_eq!(render(&ind), NO_CERTIFICATE);
    }
}
