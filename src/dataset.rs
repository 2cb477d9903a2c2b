//! Benchmark problem sizes.

use std::fmt;
use std::str::FromStr;

/// Square problem sizes of the polybench ATAX benchmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dataset {
    Mini,
    Small,
    #[default]
    Standard,
    Large,
    ExtraLarge,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::Mini,
        Dataset::Small,
        Dataset::Standard,
        Dataset::Large,
        Dataset::ExtraLarge,
    ];

    /// `(nx, ny)` for this dataset.
    pub fn dims(self) -> (usize, usize) {
        let n = match self {
            Dataset::Mini => 32,
            Dataset::Small => 500,
            Dataset::Standard => 4000,
            Dataset::Large => 8000,
            Dataset::ExtraLarge => 100_000,
        };
        (n, n)
    }

    pub fn name(self) -> &'static str {
        match self {
            Dataset::Mini => "MINI_DATASET",
            Dataset::Small => "SMALL_DATASET",
            Dataset::Standard => "STANDARD_DATASET",
            Dataset::Large => "LARGE_DATASET",
            Dataset::ExtraLarge => "EXTRALARGE_DATASET",
        }
    }

    /// Dataset named by `ATAX_DATASET`, or [`Dataset::Standard`] when the
    /// variable is unset or not recognised.
    pub fn from_env() -> Self {
        match std::env::var("ATAX_DATASET") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                log::warn!("{e}; using {}", Dataset::Standard);
                Dataset::Standard
            }),
            Err(_) => Dataset::Standard,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a dataset name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dataset `{0}`")]
pub struct ParseDatasetError(String);

impl FromStr for Dataset {
    type Err = ParseDatasetError;

    /// Accepts `mini`, `Mini`, `MINI_DATASET`, `extra-large`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        let norm = norm.strip_suffix("dataset").unwrap_or(&norm);
        let dataset = match norm {
            "mini" => Dataset::Mini,
            "small" => Dataset::Small,
            "standard" => Dataset::Standard,
            "large" => Dataset::Large,
            "extralarge" => Dataset::ExtraLarge,
            _ => return Err(ParseDatasetError(s.to_string())),
        };
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims() {
        assert_eq!(Dataset::Mini.dims(), (32, 32));
        assert_eq!(Dataset::Standard.dims(), (4000, 4000));
        assert_eq!(Dataset::ExtraLarge.dims(), (100_000, 100_000));
    }

    #[test]
    fn test_parse_names() {
        for d in Dataset::ALL {
            assert_eq!(d.name().parse::<Dataset>().unwrap(), d);
        }
        assert_eq!("mini".parse::<Dataset>().unwrap(), Dataset::Mini);
        assert_eq!("Extra-Large".parse::<Dataset>().unwrap(), Dataset::ExtraLarge);
        assert!("huge".parse::<Dataset>().is_err());
        assert!("dataset".parse::<Dataset>().is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("ATAX_DATASET", "mini");
        let named = Dataset::from_env();
        std::env::set_var("ATAX_DATASET", " LARGE_DATASET ");
        let padded = Dataset::from_env();
        std::env::set_var("ATAX_DATASET", "nonsense");
        let unknown = Dataset::from_env();
        std::env::remove_var("ATAX_DATASET");
        let unset = Dataset::from_env();

        assert_eq!(named, Dataset::Mini);
        assert_eq!(padded, Dataset::Large);
        assert_eq!(unknown, Dataset::Standard);
        assert_eq!(unset, Dataset::Standard);
    }
}
