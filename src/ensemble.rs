//! Ensemble sampling around a base scenario.
//!
//! Generates N parameter vectors inside per-parameter `[min, max]` ranges
//! and registers each as a scenario. Two modes:
//! - `random`: every parameter's N values drawn independently and
//!   uniformly.
//! - `latin` (Latin hypercube): per parameter, `[0, 1]` is split into N
//!   equal strata, the strata are shuffled and one uniform draw is taken
//!   inside each, so the N samples cover every stratum exactly once.
//!   Stratified orderings are independent across parameters; there is no
//!   joint-space guarantee.
//!
//! Sampling is driven by an explicit seed, never ambient RNG state.

use std::collections::BTreeMap;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::{AnalysisError, Result};
use crate::scenario::ScenarioStore;

/// Per-parameter sweep ranges, `name -> (min, max)`.
pub type ParameterRanges = BTreeMap<String, (f64, f64)>;

/// Closed set of sampling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    Random,
    Latin,
}

impl SamplingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingMode::Random => "random",
            SamplingMode::Latin => "latin",
        }
    }
}

impl FromStr for SamplingMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(SamplingMode::Random),
            "latin" => Ok(SamplingMode::Latin),
            other => Err(AnalysisError::UnknownMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample `count` ensemble members around `base` and register them.
///
/// Member parameters are copied from the base scenario; swept parameters
/// are overwritten by the sampled values, which always lie within their
/// inclusive `[min, max]` range. Member names are
/// `"<base>_member_<i>"`, returned in sampling order. When
/// `ensemble_name` is given, the member list is also registered as an
/// ensemble in the store.
pub fn create_ensemble(
    store: &mut ScenarioStore,
    base: &str,
    ranges: &ParameterRanges,
    count: usize,
    mode: SamplingMode,
    ensemble_name: Option<&str>,
    seed: u64,
) -> Result<Vec<String>> {
    if count < 1 {
        return Err(AnalysisError::invalid_parameter(
            "member count must be at least 1",
        ));
    }
    if ranges.is_empty() {
        return Err(AnalysisError::invalid_parameter(
            "at least one parameter range is required",
        ));
    }
    for (name, &(min, max)) in ranges {
        if min > max {
            return Err(AnalysisError::invalid_parameter(format!(
                "inverted range for '{}': {} > {}",
                name, min, max
            )));
        }
    }
    let base_parameters = store.get(base)?.parameters.clone();

    let mut rng = StdRng::seed_from_u64(seed);
    let draws: BTreeMap<&str, Vec<f64>> = ranges
        .iter()
        .map(|(name, &(min, max))| {
            let values = match mode {
                SamplingMode::Random => sample_uniform(&mut rng, min, max, count),
                SamplingMode::Latin => sample_latin(&mut rng, min, max, count),
            };
            (name.as_str(), values)
        })
        .collect();

    let mut members = Vec::with_capacity(count);
    for i in 0..count {
        let mut parameters = base_parameters.clone();
        for (name, values) in &draws {
            parameters.insert(name.to_string(), values[i]);
        }
        let member = format!("{}_member_{}", base, i);
        store.add(&member, parameters, None);
        members.push(member);
    }

    info!(
        base,
        mode = %mode,
        count,
        swept = ranges.len(),
        "ensemble sampled"
    );
    if let Some(name) = ensemble_name {
        store.register_ensemble(name, members.clone());
    }
    Ok(members)
}

/// Independent uniform draws over the inclusive range.
fn sample_uniform(rng: &mut StdRng, min: f64, max: f64, count: usize) -> Vec<f64> {
    if min == max {
        return vec![min; count];
    }
    (0..count).map(|_| rng.gen_range(min..=max)).collect()
}

/// Latin-hypercube draws: one uniform value inside each shuffled stratum.
fn sample_latin(rng: &mut StdRng, min: f64, max: f64, count: usize) -> Vec<f64> {
    let mut strata: Vec<usize> = (0..count).collect();
    strata.shuffle(rng);
    strata
        .into_iter()
        .map(|stratum| {
            let fraction = (stratum as f64 + rng.gen::<f64>()) / count as f64;
            min + fraction * (max - min)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Parameters;

    fn seeded_store() -> ScenarioStore {
        let mut store = ScenarioStore::new();
        let mut params = Parameters::new();
        params.insert("warming_rate".to_string(), 0.03);
        params.insert("noise_level".to_string(), 0.5);
        store.add("baseline", params, None);
        store
    }

    fn ranges(pairs: &[(&str, f64, f64)]) -> ParameterRanges {
        pairs
            .iter()
            .map(|&(name, min, max)| (name.to_string(), (min, max)))
            .collect()
    }

    #[test]
    fn test_latin_covers_every_stratum_once() {
        let mut store = seeded_store();
        let n = 10;
        let members = create_ensemble(
            &mut store,
            "baseline",
            &ranges(&[("warming_rate", 0.0, 1.0)]),
            n,
            SamplingMode::Latin,
            None,
            42,
        )
        .unwrap();

        let mut used = vec![false; n];
        for member in &members {
            let value = *store
                .get(member)
                .unwrap()
                .parameters
                .get("warming_rate")
                .unwrap();
            assert!((0.0..=1.0).contains(&value), "out of range: {}", value);
            let stratum = ((value * n as f64).floor() as usize).min(n - 1);
            assert!(!used[stratum], "stratum {} used twice", stratum);
            used[stratum] = true;
        }
        assert!(used.iter().all(|&u| u), "every stratum used exactly once");
    }

    #[test]
    fn test_latin_stratification_independent_per_parameter() {
        let mut store = seeded_store();
        let n = 8;
        create_ensemble(
            &mut store,
            "baseline",
            &ranges(&[("warming_rate", 0.0, 1.0), ("noise_level", 10.0, 20.0)]),
            n,
            SamplingMode::Latin,
            None,
            7,
        )
        .unwrap();

        for param in ["warming_rate", "noise_level"] {
            let (lo, hi) = if param == "warming_rate" {
                (0.0, 1.0)
            } else {
                (10.0, 20.0)
            };
            let mut used = vec![false; n];
            for i in 0..n {
                let member = format!("baseline_member_{}", i);
                let value = *store.get(&member).unwrap().parameters.get(param).unwrap();
                let fraction = (value - lo) / (hi - lo);
                let stratum = ((fraction * n as f64).floor() as usize).min(n - 1);
                assert!(!used[stratum], "{}: stratum {} reused", param, stratum);
                used[stratum] = true;
            }
        }
    }

    #[test]
    fn test_random_members_within_bounds() {
        let mut store = seeded_store();
        let members = create_ensemble(
            &mut store,
            "baseline",
            &ranges(&[("warming_rate", -0.1, 0.2)]),
            25,
            SamplingMode::Random,
            None,
            3,
        )
        .unwrap();
        assert_eq!(members.len(), 25);
        for member in &members {
            let value = *store
                .get(member)
                .unwrap()
                .parameters
                .get("warming_rate")
                .unwrap();
            assert!(
                (-0.1..=0.2).contains(&value),
                "{}: out of range {}",
                member,
                value
            );
        }
    }

    #[test]
    fn test_unswept_parameters_copied_exactly() {
        let mut store = seeded_store();
        let members = create_ensemble(
            &mut store,
            "baseline",
            &ranges(&[("warming_rate", 0.0, 1.0)]),
            5,
            SamplingMode::Random,
            None,
            11,
        )
        .unwrap();
        for member in &members {
            let scenario = store.get(member).unwrap();
            assert_eq!(scenario.parameters.get("noise_level"), Some(&0.5));
            // Key set matches the base scenario
            let mut keys: Vec<&String> = scenario.parameters.keys().collect();
            keys.sort();
            assert_eq!(keys, vec!["noise_level", "warming_rate"]);
        }
    }

    #[test]
    fn test_same_seed_reproduces_samples() {
        let mut store_a = seeded_store();
        let mut store_b = seeded_store();
        let r = ranges(&[("warming_rate", 0.0, 1.0)]);
        create_ensemble(&mut store_a, "baseline", &r, 6, SamplingMode::Latin, None, 99).unwrap();
        create_ensemble(&mut store_b, "baseline", &r, 6, SamplingMode::Latin, None, 99).unwrap();
        for i in 0..6 {
            let name = format!("baseline_member_{}", i);
            assert_eq!(
                store_a.get(&name).unwrap().parameters,
                store_b.get(&name).unwrap().parameters
            );
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut store_a = seeded_store();
        let mut store_b = seeded_store();
        let r = ranges(&[("warming_rate", 0.0, 1.0)]);
        create_ensemble(&mut store_a, "baseline", &r, 6, SamplingMode::Random, None, 1).unwrap();
        create_ensemble(&mut store_b, "baseline", &r, 6, SamplingMode::Random, None, 2).unwrap();
        let differs = (0..6).any(|i| {
            let name = format!("baseline_member_{}", i);
            store_a.get(&name).unwrap().parameters != store_b.get(&name).unwrap().parameters
        });
        assert!(differs, "distinct seeds should produce distinct draws");
    }

    #[test]
    fn test_ensemble_registration() {
        let mut store = seeded_store();
        let members = create_ensemble(
            &mut store,
            "baseline",
            &ranges(&[("warming_rate", 0.0, 1.0)]),
            3,
            SamplingMode::Latin,
            Some("sweep1"),
            5,
        )
        .unwrap();
        assert_eq!(store.ensemble("sweep1").unwrap(), members.as_slice());
        assert_eq!(members[0], "baseline_member_0");
        assert_eq!(members[2], "baseline_member_2");
    }

    #[test]
    fn test_degenerate_range_collapses() {
        let mut store = seeded_store();
        let members = create_ensemble(
            &mut store,
            "baseline",
            &ranges(&[("warming_rate", 0.5, 0.5)]),
            4,
            SamplingMode::Latin,
            None,
            8,
        )
        .unwrap();
        for member in &members {
            assert_eq!(
                store.get(member).unwrap().parameters.get("warming_rate"),
                Some(&0.5)
            );
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let mut store = seeded_store();
        let r = ranges(&[("warming_rate", 0.0, 1.0)]);
        assert!(matches!(
            create_ensemble(&mut store, "baseline", &r, 0, SamplingMode::Random, None, 1),
            Err(AnalysisError::InvalidParameter { .. })
        ));
        assert!(matches!(
            create_ensemble(
                &mut store,
                "baseline",
                &ranges(&[("warming_rate", 1.0, 0.0)]),
                3,
                SamplingMode::Random,
                None,
                1
            ),
            Err(AnalysisError::InvalidParameter { .. })
        ));
        assert!(matches!(
            create_ensemble(
                &mut store,
                "baseline",
                &ParameterRanges::new(),
                3,
                SamplingMode::Random,
                None,
                1
            ),
            Err(AnalysisError::InvalidParameter { .. })
        ));
        assert!(matches!(
            create_ensemble(&mut store, "missing", &r, 3, SamplingMode::Random, None, 1),
            Err(AnalysisError::NotFound { .. })
        ));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("latin".parse::<SamplingMode>().unwrap(), SamplingMode::Latin);
        assert!(matches!(
            "sobol".parse::<SamplingMode>(),
            Err(AnalysisError::UnknownMethod { .. })
        ));
    }
}
