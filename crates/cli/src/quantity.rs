//! Parsing of CPU and memory quantities as written in pod specs

use advisor_lib::MILLICORES_PER_CORE;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity '{0}'")]
    Invalid(String),

    #[error("quantity '{0}' is out of range")]
    OutOfRange(String),
}

/// Binary and decimal memory suffixes, longest first
const MEMORY_SUFFIXES: [(&str, f64); 8] = [
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("K", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
];

/// Parse a CPU quantity ("500m", "2", "0.25") into millicores
pub fn parse_cpu(input: &str) -> Result<u64, QuantityError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    let millicores = match s.strip_suffix('m') {
        Some(milli) => parse_number(milli, input)?,
        None => parse_number(s, input)? * MILLICORES_PER_CORE as f64,
    };
    to_u64(millicores.round(), input)
}

/// Parse a memory quantity ("512Mi", "1Gi", "1G", "1048576") into bytes
pub fn parse_memory(input: &str) -> Result<u64, QuantityError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    for (suffix, multiplier) in MEMORY_SUFFIXES {
        if let Some(number) = s.strip_suffix(suffix) {
            let bytes = parse_number(number, input)? * multiplier;
            return to_u64(bytes.round(), input);
        }
    }
    to_u64(parse_number(s, input)?.round(), input)
}

fn parse_number(number: &str, input: &str) -> Result<f64, QuantityError> {
    let value: f64 = number
        .parse()
        .map_err(|_| QuantityError::Invalid(input.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(QuantityError::Invalid(input.to_string()));
    }
    Ok(value)
}

fn to_u64(value: f64, input: &str) -> Result<u64, QuantityError> {
    if value > u64::MAX as f64 {
        return Err(QuantityError::OutOfRange(input.to_string()));
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_lib::{GIB, MIB};

    #[test]
    fn test_cpu_quantities() {
        assert_eq!(parse_cpu("500m").unwrap(), 500);
        assert_eq!(parse_cpu("2").unwrap(), 2000);
        assert_eq!(parse_cpu("0.25").unwrap(), 250);
        assert_eq!(parse_cpu(" 1.5 ").unwrap(), 1500);
    }

    #[test]
    fn test_memory_quantities() {
        assert_eq!(parse_memory("512Mi").unwrap(), 512 * MIB);
        assert_eq!(parse_memory("1Gi").unwrap(), GIB);
        assert_eq!(parse_memory("1.5Gi").unwrap(), 3 * GIB / 2);
        assert_eq!(parse_memory("1G").unwrap(), 1_000_000_000);
        assert_eq!(parse_memory("64Ki").unwrap(), 64 * 1024);
        assert_eq!(parse_memory("1048576").unwrap(), MIB);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_cpu(""), Err(QuantityError::Empty));
        assert_eq!(parse_cpu("abc"), Err(QuantityError::Invalid("abc".into())));
        assert_eq!(parse_cpu("-1"), Err(QuantityError::Invalid("-1".into())));
        assert!(parse_memory("12Xi").is_err());
        assert!(parse_memory("Gi").is_err());
        assert!(parse_memory("NaN").is_err());
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            parse_memory("1e30Ti"),
            Err(QuantityError::OutOfRange(_))
        ));
    }
}
