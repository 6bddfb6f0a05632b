use ark_ec::pairing::Pairing;

use super::SurveyQuery;
use crate::proofs::RangeBounds;

const LOG_TARGET: &str = "drynx_proofs::query::validation";

fn ranges_all_zero(ranges: &[RangeBounds]) -> bool {
    ranges.iter().all(|(u, l)| *u == 0 && *l == 0)
}

fn ranges_all_bits(ranges: &[RangeBounds]) -> bool {
    ranges.iter().all(|(u, l)| *u == 2 && *l == 1)
}

/// Cross-field consistency of a survey. Every failed rule is reported in one
/// log line; the result only says whether the survey may run.
pub fn check_parameters<E: Pairing>(sq: &SurveyQuery<E>, diff_p_wanted: bool) -> bool {
    let mut reasons: Vec<&'static str> = Vec::new();
    let query = &sq.query;
    let ranges = query.ranges.as_deref().unwrap_or(&[]);
    let sigs = query.iv_sigs.input_validation_sigs.as_ref();

    match query.proofs {
        1 => {
            if query.obfuscation {
                if sq.obfuscation_proof_threshold == 0.0 {
                    reasons.push("obfuscation threshold is 0 while obfuscation is true");
                }
                if !query.operation.name_op.accepts_obfuscation() {
                    reasons.push("obfuscation for a non accepted operation");
                }
                if !ranges_all_bits(ranges) {
                    reasons.push("obfuscation and proofs but ranges not for 0,1");
                }
            } else if sq.obfuscation_proof_threshold != 0.0 {
                reasons.push("obfuscation threshold is set and there is no obfuscation");
            }
            if query.ranges.is_none() {
                reasons.push("proofs but no range");
            }
            if sigs.is_none() && !ranges_all_zero(ranges) {
                reasons.push("proofs but no signatures");
            }
            if ranges_all_zero(ranges) && sigs.is_some() {
                reasons.push("ranges to 0 but signatures also set");
            }
            if let (Some(sigs), Some(ranges)) = (sigs, query.ranges.as_ref()) {
                let nbr_output = query.operation.nbr_output;
                if sigs.first().map(Vec::len) != Some(nbr_output) || ranges.len() != nbr_output {
                    reasons.push("ranges or signatures length do not match with nbr output");
                }
            }
        }
        0 => {
            if sq.key_switching_proof_threshold != 0.0
                || sq.aggregation_proof_threshold != 0.0
                || sq.obfuscation_proof_threshold != 0.0
                || sq.range_proof_threshold != 0.0
                || sq.threshold != 0.0
            {
                reasons.push("no proofs and one of the thresholds not 0");
            }
            if query.ranges.is_some() || sigs.is_some() {
                reasons.push("no proofs and some ranges or signatures");
            }
            if query.roster_vns.is_some() {
                reasons.push("no proofs but VN roster");
            }
        }
        _ => reasons.push("unsupported proof type"),
    }

    let dp = &query.diff_p;
    if !diff_p_wanted {
        if dp.is_enabled() {
            reasons.push("no diffP but parameters not to 0");
        }
    } else if (dp.limit == 0.0 && dp.quanta == 0.0)
        || dp.scale == 0.0
        || dp.noise_list_size == 0
        || dp.lap_scale == 0.0
    {
        reasons.push("diffP but parameters are 0");
    }

    if query.operation.query_min != query.dp_data_gen.generate_data_min
        || query.operation.query_max != query.dp_data_gen.generate_data_max
    {
        reasons.push("min or max are inconsistent at DP and operations");
    }

    if !reasons.is_empty() {
        tracing::info!(
            target: LOG_TARGET,
            survey = %sq.survey_id,
            reasons = %reasons.join("; "),
            "survey parameters rejected"
        );
    }
    reasons.is_empty()
}

/// Proofs each verifier should expect, ordered range, shuffle, aggregation,
/// obfuscation, key switch.
pub fn query_to_proofs_nbrs<E: Pairing>(sq: &SurveyQuery<E>) -> [usize; 5] {
    let nbr_dps: usize = sq
        .server_to_dp
        .values()
        .flatten()
        .map(Vec::len)
        .sum();
    let nbr_servers = if sq.query.proofs == 0 {
        0
    } else {
        sq.roster_servers.len()
    };
    let shuffle = if sq.query.diff_p.is_enabled() { nbr_servers } else { 0 };
    let obfuscation = if sq.query.obfuscation { nbr_servers } else { 0 };
    [nbr_dps, shuffle, nbr_servers, obfuscation, nbr_servers]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proofs::init_range_proof_signature_deterministic;
    use crate::query::{choose_operation, Query, QueryDiffP, QueryIVSigs, Roster, ServerIdentity};
    use crate::suite::Suite;
    use ark_bn254::{Bn254, G1Projective};
    use ark_ec::PrimeGroup;

    fn survey(proofs: i64) -> SurveyQuery<Bn254> {
        let g = G1Projective::generator();
        let roster = Roster::new(vec![
            ServerIdentity::new("cn0", g),
            ServerIdentity::new("cn1", g + g),
        ]);
        let mut query = Query::new(choose_operation("sum", 0, 10, 0, 0).unwrap());
        query.dp_data_gen.generate_data_min = 0;
        query.dp_data_gen.generate_data_max = 10;
        query.proofs = proofs;
        let mut sq = SurveyQuery::new("s", roster, g, query);
        sq.server_to_dp
            .insert("cn0".into(), Some(vec![ServerIdentity::new("dp0", g), ServerIdentity::new("dp1", g)]));
        sq.server_to_dp.insert("cn1".into(), None);
        sq
    }

    fn with_proofs() -> SurveyQuery<Bn254> {
        let mut sq = survey(1);
        let suite = Suite::<Bn254>::new();
        let sig = init_range_proof_signature_deterministic(&suite, 2).unwrap();
        sq.query.ranges = Some(vec![(2, 4)]);
        sq.query.iv_sigs = QueryIVSigs::new(vec![vec![sig.clone()], vec![sig]]);
        sq.threshold = 1.0;
        sq
    }

    #[test]
    fn plain_survey_is_accepted_and_idempotent() {
        let sq = survey(0);
        assert!(check_parameters(&sq, false));
        assert_eq!(check_parameters(&sq, false), check_parameters(&sq, false));
    }

    #[test]
    fn no_proofs_rejects_thresholds_and_ranges() {
        let mut sq = survey(0);
        sq.threshold = 0.5;
        assert!(!check_parameters(&sq, false));

        let mut sq = survey(0);
        sq.query.ranges = Some(vec![(0, 0)]);
        assert!(!check_parameters(&sq, false));

        let mut sq = survey(0);
        sq.query.roster_vns = Some(sq.roster_servers.clone());
        assert!(!check_parameters(&sq, false));
    }

    #[test]
    fn proofs_require_matching_ranges_and_signatures() {
        assert!(check_parameters(&with_proofs(), false));

        let mut sq = with_proofs();
        sq.query.ranges = None;
        assert!(!check_parameters(&sq, false));

        let mut sq = with_proofs();
        sq.query.iv_sigs = QueryIVSigs::default();
        assert!(!check_parameters(&sq, false));

        let mut sq = with_proofs();
        sq.query.ranges = Some(vec![(0, 0)]);
        assert!(!check_parameters(&sq, false));

        let mut sq = with_proofs();
        sq.query.ranges = Some(vec![(2, 4), (2, 4)]);
        assert!(!check_parameters(&sq, false));

        let mut sq = survey(1);
        sq.query.ranges = Some(vec![(0, 0)]);
        assert!(check_parameters(&sq, false));
        sq.query.proofs = 2;
        assert!(!check_parameters(&sq, false));
    }

    #[test]
    fn obfuscation_needs_bit_ranges_and_accepted_operation() {
        let mut sq = with_proofs();
        sq.query.obfuscation = true;
        sq.obfuscation_proof_threshold = 1.0;
        assert!(!check_parameters(&sq, false));

        sq.query.operation = choose_operation("bool_OR", 0, 10, 0, 0).unwrap();
        sq.query.ranges = Some(vec![(2, 1)]);
        assert!(check_parameters(&sq, false));

        sq.obfuscation_proof_threshold = 0.0;
        assert!(!check_parameters(&sq, false));
    }

    #[test]
    fn diff_p_and_bounds_consistency() {
        let mut sq = survey(0);
        sq.query.diff_p = QueryDiffP {
            lap_mean: 0.0,
            lap_scale: 15.0,
            noise_list_size: 1000,
            quanta: 1.0,
            scale: 1.0,
            limit: 65.0,
        };
        assert!(!check_parameters(&sq, false));
        assert!(check_parameters(&sq, true));

        sq.query.diff_p.scale = 0.0;
        assert!(!check_parameters(&sq, true));

        let mut sq = survey(0);
        sq.query.dp_data_gen.generate_data_max = 11;
        assert!(!check_parameters(&sq, false));
    }

    #[test]
    fn proof_counts_follow_query() {
        let mut sq = survey(1);
        assert_eq!(query_to_proofs_nbrs(&sq), [2, 0, 2, 0, 2]);
        sq.query.obfuscation = true;
        sq.query.diff_p.limit = 1.0;
        assert_eq!(query_to_proofs_nbrs(&sq), [2, 2, 2, 2, 2]);
        sq.query.proofs = 0;
        assert_eq!(query_to_proofs_nbrs(&sq), [2, 0, 0, 0, 0]);
    }
}
