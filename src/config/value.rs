use crate::engine::settings::{
    CovarianceType, NormalizationScheme, OutputUncertaintyType, PriorMeanFunction,
    TrainValidationSplitMethod, WeightingScheme,
};

// ---------------------------------------------------------------------------
// ConfigValue – one fallible parser per target type
// ---------------------------------------------------------------------------

/// A type that can be read from (and written back to) the right-hand side of
/// a `key = value` line.
pub trait ConfigValue: Sized {
    /// Name of the type as shown in diagnostics.
    const TYPE_NAME: &'static str;

    /// Parse a trimmed raw value. `None` means the value is not a valid
    /// spelling for this type.
    fn parse_config(raw: &str) -> Option<Self>;

    /// Render the value so that [`ConfigValue::parse_config`] reads it back.
    fn render_config(&self) -> String;
}

/// Strip at most one leading and one trailing character found in `chars`.
pub(crate) fn remove_first_last<'a>(val: &'a str, chars: &[char]) -> &'a str {
    let val = val.strip_prefix(chars).unwrap_or(val);
    val.strip_suffix(chars).unwrap_or(val)
}

impl ConfigValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn parse_config(raw: &str) -> Option<Self> {
        match raw {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        }
    }

    fn render_config(&self) -> String {
        if *self { "1" } else { "0" }.to_string()
    }
}

macro_rules! numeric_config_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl ConfigValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn parse_config(raw: &str) -> Option<Self> {
                    raw.parse().ok()
                }

                fn render_config(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

numeric_config_value! {
    usize => "unsigned integer",
    u64 => "unsigned integer",
    f64 => "floating point number",
}

impl ConfigValue for String {
    const TYPE_NAME: &'static str = "string";

    fn parse_config(raw: &str) -> Option<Self> {
        Some(remove_first_last(raw, &['\'', '"']).to_string())
    }

    fn render_config(&self) -> String {
        format!("\"{self}\"")
    }
}

/// Lists are written `[a, b, c]`; `[]` is the empty list.
impl<T: ConfigValue> ConfigValue for Vec<T> {
    const TYPE_NAME: &'static str = "list";

    fn parse_config(raw: &str) -> Option<Self> {
        let inner = remove_first_last(raw, &['[', ']']).trim();
        if inner.is_empty() {
            return Some(Vec::new());
        }
        inner
            .split(',')
            .map(|item| T::parse_config(item.trim()))
            .collect()
    }

    fn render_config(&self) -> String {
        let items: Vec<String> = self.iter().map(T::render_config).collect();
        format!("[{}]", items.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Enumerated options: closed sets of lower-case spellings
// ---------------------------------------------------------------------------

macro_rules! enum_config_value {
    ($ty:ty, $name:literal, { $($spelling:literal => $variant:expr),* $(,)? }) => {
        impl ConfigValue for $ty {
            const TYPE_NAME: &'static str = $name;

            fn parse_config(raw: &str) -> Option<Self> {
                match raw {
                    $($spelling => Some($variant),)*
                    _ => None,
                }
            }

            fn render_config(&self) -> String {
                $(if *self == $variant { return $spelling.to_string(); })*
                format!("{self:?}").to_lowercase()
            }
        }
    };
}

enum_config_value!(CovarianceType, "covariance type", {
    "gpgl" => CovarianceType::GlobalLength,
    "gpvl" => CovarianceType::VariableLength,
    "gpgd" => CovarianceType::GlobalDiagonal,
    "gpvd" => CovarianceType::VariableDiagonal,
    "gpgc" => CovarianceType::GlobalCovariance,
    "gpvc" => CovarianceType::VariableCovariance,
});

enum_config_value!(PriorMeanFunction, "prior mean function", {
    "none" => PriorMeanFunction::Zero,
    "constant" => PriorMeanFunction::ConstantPreprocess,
    "linear" => PriorMeanFunction::LinearPreprocess,
    "linear_marg" => PriorMeanFunction::LinearMarginalize,
});

enum_config_value!(WeightingScheme, "weighting scheme", {
    "uniform" => WeightingScheme::Uniform,
    "1/(1+z)" => WeightingScheme::OneOverOnePlusOutput,
    "balanced" => WeightingScheme::Balanced,
});

enum_config_value!(NormalizationScheme, "normalization scheme", {
    "natural" => NormalizationScheme::Natural,
    "whiten" => NormalizationScheme::Whiten,
});

enum_config_value!(TrainValidationSplitMethod, "validation split method", {
    "random" => TrainValidationSplitMethod::Random,
    "sequential" => TrainValidationSplitMethod::Sequential,
});

enum_config_value!(OutputUncertaintyType, "output uncertainty type", {
    "uniform" => OutputUncertaintyType::Uniform,
    "input_dependent" => OutputUncertaintyType::InputDependent,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_lose_one_layer_of_quotes() {
        assert_eq!(String::parse_config("\"train.cat\"").unwrap(), "train.cat");
        assert_eq!(String::parse_config("'a'").unwrap(), "a");
        assert_eq!(String::parse_config("\"\"a\"\"").unwrap(), "\"a\"");
        assert_eq!(String::parse_config("plain").unwrap(), "plain");
        assert_eq!(String::parse_config("\"\"").unwrap(), "");
    }

    #[test]
    fn booleans_accept_digits_and_words() {
        assert_eq!(bool::parse_config("1"), Some(true));
        assert_eq!(bool::parse_config("false"), Some(false));
        assert_eq!(bool::parse_config("yes"), None);
    }

    #[test]
    fn floats_accept_infinities() {
        assert_eq!(f64::parse_config("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(f64::parse_config(&f64::INFINITY.render_config()), Some(f64::INFINITY));
        assert_eq!(usize::parse_config("-3"), None);
    }

    #[test]
    fn lists_split_on_commas() {
        let v = Vec::<String>::parse_config("[f_u, 'f_g' , f_r]").unwrap();
        assert_eq!(v, vec!["f_u", "f_g", "f_r"]);
        assert!(Vec::<String>::parse_config("[]").unwrap().is_empty());
        assert!(Vec::<String>::parse_config("[ ]").unwrap().is_empty());
        assert_eq!(Vec::<f64>::parse_config("[1, x]"), None);
        assert_eq!(Vec::<f64>::parse_config("[1.5, 2]"), Some(vec![1.5, 2.0]));
    }

    #[test]
    fn enums_only_accept_their_spellings() {
        assert_eq!(
            CovarianceType::parse_config("gpvc"),
            Some(CovarianceType::VariableCovariance)
        );
        assert_eq!(CovarianceType::parse_config("GPVC"), None);
        assert_eq!(
            WeightingScheme::parse_config("1/(1+z)"),
            Some(WeightingScheme::OneOverOnePlusOutput)
        );
        assert_eq!(WeightingScheme::parse_config("custom"), None);
        assert_eq!(
            PriorMeanFunction::LinearMarginalize.render_config(),
            "linear_marg"
        );
    }
}
