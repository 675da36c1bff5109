use std::fmt;

use regex::RegexBuilder;

use super::error::CatalogError;
use super::model::{CatalogMode, ColumnMapping, FeatureColumn, Header};
use crate::config::Options;

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Non-fatal findings of column resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveWarning {
    /// A band pattern selected no column.
    NoMatch { pattern: String },
    /// A flux column was skipped because its error column is absent.
    MissingErrorColumn { column: String, expected: String },
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveWarning::NoMatch { pattern } => {
                write!(f, "no column found matching the regular expression '{pattern}'")
            }
            ResolveWarning::MissingErrorColumn { column, expected } => write!(
                f,
                "flux column {column} has no corresponding error column ({expected}) and will be ignored"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Band name from what follows the flux prefix: `f_g` with prefix `f` is
/// band `g`, as is `fg`.
fn band_name(suffix: &str) -> &str {
    suffix.strip_prefix('_').unwrap_or(suffix)
}

/// Map header columns onto roles.
///
/// Each pattern of `opts.bands_regex` is tried in order against the columns
/// that start with the flux prefix and are not yet claimed. Patterns are
/// case-insensitive and may match anywhere in the column name. The error
/// column of `<flux prefix><rest>` is `<error prefix><rest>`. Features end
/// up sorted by band name, so the result does not depend on pattern or
/// column order.
///
/// If `opts.bands` is already set (from a model file or an earlier catalog)
/// the new band list must equal it.
pub fn resolve_columns(
    header: &Header,
    opts: &Options,
    mode: CatalogMode,
) -> Result<ColumnMapping, CatalogError> {
    let mut claimed = vec![false; header.len()];
    let mut warnings = Vec::new();

    let mut output = None;
    let mut weight = None;
    let mut id = None;

    match mode {
        CatalogMode::Training => {
            let col = header
                .position(&opts.output_column)
                .ok_or_else(|| CatalogError::MissingColumn {
                    kind: "output",
                    name: opts.output_column.clone(),
                })?;
            claimed[col] = true;
            output = Some(col);

            if !opts.weight_column.is_empty() {
                let col = header
                    .position(&opts.weight_column)
                    .ok_or_else(|| CatalogError::MissingColumn {
                        kind: "weight",
                        name: opts.weight_column.clone(),
                    })?;
                claimed[col] = true;
                weight = Some(col);
            }
        }
        CatalogMode::Prediction => {
            id = header.position("id");
            if let Some(col) = id {
                claimed[col] = true;
            }
        }
    }

    let flux_prefix = opts.flux_column_prefix.to_lowercase();
    let error_prefix = opts.error_column_prefix.to_lowercase();

    let mut found: Vec<(String, FeatureColumn)> = Vec::new();

    for pattern in &opts.bands_regex {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CatalogError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;

        let candidates: Vec<usize> = header
            .names()
            .iter()
            .enumerate()
            .filter(|(col, name)| {
                !claimed[*col] && name.starts_with(&flux_prefix) && re.is_match(name)
            })
            .map(|(col, _)| col)
            .collect();

        if candidates.is_empty() {
            let warning = ResolveWarning::NoMatch {
                pattern: pattern.clone(),
            };
            log::warn!("{warning}");
            warnings.push(warning);
            continue;
        }

        for col in candidates {
            // An earlier candidate of this pattern may have claimed it as
            // its error column.
            if claimed[col] {
                continue;
            }

            let name = &header[col];
            let suffix = &name[flux_prefix.len()..];
            let band = band_name(suffix);

            let error = if opts.use_errors {
                let expected = format!("{error_prefix}{suffix}");
                match header.position(&expected).filter(|&e| !claimed[e]) {
                    Some(e) => Some(e),
                    None => {
                        let warning = ResolveWarning::MissingErrorColumn {
                            column: name.to_string(),
                            expected,
                        };
                        log::warn!("{warning}");
                        warnings.push(warning);
                        continue;
                    }
                }
            } else {
                None
            };

            claimed[col] = true;
            if let Some(e) = error {
                claimed[e] = true;
            }
            found.push((band.to_string(), FeatureColumn { value: col, error }));
        }
    }

    if found.is_empty() {
        return Err(CatalogError::NoFeatures {
            patterns: opts.bands_regex.clone(),
            available: header.names().to_vec(),
        });
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    let (bands, features): (Vec<String>, Vec<FeatureColumn>) = found.into_iter().unzip();

    if !opts.bands.is_empty() && opts.bands != bands {
        let (first, second) = match mode {
            CatalogMode::Training => ("stored model", "training catalog"),
            CatalogMode::Prediction => ("training catalog", "prediction catalog"),
        };
        return Err(CatalogError::BandMismatch {
            first,
            first_bands: opts.bands.clone(),
            second,
            second_bands: bands,
        });
    }

    Ok(ColumnMapping {
        output,
        weight,
        id,
        features,
        bands,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header(line: &str) -> Header {
        Header::parse_line(line).unwrap()
    }

    fn options(patterns: &[&str]) -> Options {
        Options {
            training_catalog: "train.cat".into(),
            bands_regex: patterns.iter().map(|p| p.to_string()).collect(),
            ..Options::default()
        }
    }

    #[test]
    fn pairs_fluxes_with_errors() {
        let h = header("# id F_g F_r E_g E_r");
        let map = resolve_columns(&h, &options(&["F_."]), CatalogMode::Prediction).unwrap();
        assert_eq!(map.bands, vec!["g", "r"]);
        assert_eq!(
            map.features,
            vec![
                FeatureColumn { value: 1, error: Some(3) },
                FeatureColumn { value: 2, error: Some(4) },
            ]
        );
        assert_eq!(map.id, Some(0));
        assert!(map.warnings.is_empty());
    }

    #[test]
    fn missing_error_column_skips_only_that_band() {
        let h = header("# id F_g F_r E_g");
        let map = resolve_columns(&h, &options(&["F_."]), CatalogMode::Prediction).unwrap();
        assert_eq!(map.bands, vec!["g"]);
        assert_eq!(
            map.warnings,
            vec![ResolveWarning::MissingErrorColumn {
                column: "f_r".into(),
                expected: "e_r".into()
            }]
        );
    }

    #[test]
    fn training_requires_output_column() {
        let h = header("# f_g e_g");
        let err = resolve_columns(&h, &options(&["f_g"]), CatalogMode::Training).unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { kind: "output", .. }));
    }

    #[test]
    fn configured_weight_column_must_exist() {
        let h = header("# z_spec f_g e_g");
        let mut opts = options(&["f_g"]);
        opts.weight_column = "w".into();
        let err = resolve_columns(&h, &opts, CatalogMode::Training).unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { kind: "weight", .. }));

        let h = header("# z_spec W f_g e_g");
        let map = resolve_columns(&h, &opts, CatalogMode::Training).unwrap();
        assert_eq!(map.output, Some(0));
        assert_eq!(map.weight, Some(1));
    }

    #[test]
    fn earlier_patterns_claim_columns() {
        let h = header("# z_spec f_u f_g e_u e_g");
        let map = resolve_columns(&h, &options(&["f_g", "f_.", "nothing"]), CatalogMode::Training)
            .unwrap();
        assert_eq!(map.bands, vec!["g", "u"]);
        assert_eq!(map.features[0], FeatureColumn { value: 2, error: Some(4) });
        assert_eq!(
            map.warnings,
            vec![ResolveWarning::NoMatch {
                pattern: "nothing".into()
            }]
        );
    }

    #[test]
    fn output_column_is_never_a_feature() {
        let h = header("# f_z f_g");
        let mut opts = options(&["f_."]);
        opts.output_column = "f_z".into();
        opts.use_errors = false;
        let map = resolve_columns(&h, &opts, CatalogMode::Training).unwrap();
        assert_eq!(map.bands, vec!["g"]);
        assert_eq!(map.features, vec![FeatureColumn { value: 1, error: None }]);
    }

    #[test]
    fn no_features_lists_available_columns() {
        let h = header("# z_spec mag_g");
        let err = resolve_columns(&h, &options(&["f_."]), CatalogMode::Training).unwrap_err();
        match err {
            CatalogError::NoFeatures { available, .. } => {
                assert_eq!(available, vec!["z_spec", "mag_g"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn band_list_must_match_previous_dataset() {
        let h = header("# id f_g f_r e_g e_r");
        let mut opts = options(&["f_."]);
        opts.bands = vec!["g".into(), "i".into()];
        let err = resolve_columns(&h, &opts, CatalogMode::Prediction).unwrap_err();
        match err {
            CatalogError::BandMismatch {
                first, second, second_bands, ..
            } => {
                assert_eq!(first, "training catalog");
                assert_eq!(second, "prediction catalog");
                assert_eq!(second_bands, vec!["g", "r"]);
            }
            other => panic!("unexpected error {other:?}"),
        }

        opts.bands = vec!["g".into(), "r".into()];
        assert!(resolve_columns(&h, &opts, CatalogMode::Prediction).is_ok());
    }

    #[test]
    fn training_bands_must_match_stored_model() {
        let h = header("# f_g f_r e_g e_r z_spec");
        let mut opts = options(&["f_."]);
        opts.bands = vec!["g".into()];
        let err = resolve_columns(&h, &opts, CatalogMode::Training).unwrap_err();
        match err {
            CatalogError::BandMismatch {
                first,
                first_bands,
                second,
                second_bands,
            } => {
                assert_eq!(first, "stored model");
                assert_eq!(first_bands, vec!["g"]);
                assert_eq!(second, "training catalog");
                assert_eq!(second_bands, vec!["g", "r"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn invalid_pattern_is_fatal() {
        let h = header("# z_spec f_g e_g");
        let err = resolve_columns(&h, &options(&["f_("]), CatalogMode::Training).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPattern { .. }));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn band_order_ignores_pattern_and_column_order(
            bands in proptest::sample::subsequence(vec!["u", "g", "r", "i", "z", "y"], 1..=6),
            seed in any::<u64>(),
        ) {
            let mut shuffled = bands.clone();
            // Cheap deterministic permutation driven by the seed.
            let n = shuffled.len();
            for i in (1..n).rev() {
                let j = (seed.rotate_left(i as u32) % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }

            let columns = |order: &[&str]| {
                let mut line = String::from("# z_spec");
                for b in order {
                    line.push_str(&format!(" f_{b} e_{b}"));
                }
                header(&line)
            };
            let patterns = |order: &[&str]| -> Vec<String> {
                order.iter().map(|b| format!("f_{b}$")).collect()
            };

            let mut opts_a = options(&[]);
            opts_a.bands_regex = patterns(&bands);
            let mut opts_b = options(&[]);
            opts_b.bands_regex = patterns(&shuffled);

            let a = resolve_columns(&columns(&bands), &opts_a, CatalogMode::Training).unwrap();
            let b = resolve_columns(&columns(&shuffled), &opts_b, CatalogMode::Training).unwrap();

            let mut sorted: Vec<String> = bands.iter().map(|b| b.to_string()).collect();
            sorted.sort();
            prop_assert_eq!(&a.bands, &sorted);
            prop_assert_eq!(&a.bands, &b.bands);
        }
    }
}
