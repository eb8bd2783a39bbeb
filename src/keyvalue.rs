//! Translates the external `key=value` CLI contract (spec §6) into the
//! `--key value` argv clap expects, so `Args` can stay an ordinary derive.

use crate::error::HapIbdError;

const KNOWN_KEYS: &[&str] = &[
    "gt",
    "map",
    "out",
    "excludesamples",
    "min-mac",
    "min-seed",
    "max-gap",
    "min-extend",
    "min-output",
    "min-markers",
    "nthreads",
];

/// Convert `key=value key2=value2 ...` tokens into `["--key", "value", ...]`.
///
/// Unrecognized keys are a `ConfigError`, matching spec §6's "unknown keys →
/// error".
pub fn translate(raw_args: &[String]) -> Result<Vec<String>, HapIbdError> {
    let mut out = Vec::with_capacity(raw_args.len() * 2);
    for token in raw_args {
        let (key, value) = token.split_once('=').ok_or_else(|| {
            HapIbdError::Config(format!("argument '{token}' is not in key=value form"))
        })?;
        if !KNOWN_KEYS.contains(&key) {
            return Err(HapIbdError::Config(format!("unknown parameter '{key}'")));
        }
        out.push(format!("--{key}"));
        out.push(value.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_basic() {
        let raw = vec!["gt=in.vcf.gz".to_string(), "min-seed=3.0".to_string()];
        let out = translate(&raw).unwrap();
        assert_eq!(out, vec!["--gt", "in.vcf.gz", "--min-seed", "3.0"]);
    }

    #[test]
    fn test_translate_unknown_key() {
        let raw = vec!["bogus=1".to_string()];
        assert!(translate(&raw).is_err());
    }

    #[test]
    fn test_translate_missing_equals() {
        let raw = vec!["gt".to_string()];
        assert!(translate(&raw).is_err());
    }

    #[test]
    fn test_translate_value_with_embedded_equals() {
        let raw = vec!["out=/tmp/a=b".to_string()];
        let out = translate(&raw).unwrap();
        assert_eq!(out, vec!["--out", "/tmp/a=b"]);
    }
}
