use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::ReviverRegistryBuilder;
use super::value::conversion_error;
use crate::error::ArgError;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

pub(super) fn register_all(b: &mut ReviverRegistryBuilder) {
    b.insert::<bool, _>(parse_bool);
    b.insert_parse::<char>();
    b.insert_parse::<String>();

    b.insert_parse::<i8>();
    b.insert_parse::<i16>();
    b.insert_parse::<i32>();
    b.insert_parse::<i64>();
    b.insert_parse::<i128>();
    b.insert_parse::<isize>();
    b.insert_parse::<u8>();
    b.insert_parse::<u16>();
    b.insert_parse::<u32>();
    b.insert_parse::<u64>();
    b.insert_parse::<u128>();
    b.insert_parse::<usize>();
    b.insert_parse::<f32>();
    b.insert_parse::<f64>();

    b.insert_parse::<PathBuf>();
    b.insert_parse::<IpAddr>();
    b.insert_parse::<SocketAddr>();
    b.insert_parse::<uuid::Uuid>();
    b.insert_parse::<url::Url>();
    b.insert_parse::<semver::Version>();
    b.insert_parse::<DateTime<Utc>>();

    b.insert::<NaiveDate, _>(|name, raw| parse_with_formats(name, raw, "NaiveDate", DATE_FORMATS, NaiveDate::parse_from_str));
    b.insert::<NaiveDateTime, _>(|name, raw| {
        parse_with_formats(name, raw, "NaiveDateTime", DATE_TIME_FORMATS, NaiveDateTime::parse_from_str)
    });
}

/// `true|false|1|0`, case-insensitive.
pub(super) fn parse_bool(name: &str, raw: &str) -> Result<bool, ArgError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ArgError::Validation {
            message: format!("'{raw}' is not a valid bool for argument '{name}', use true, false, 1 or 0"),
            raw: Some(raw.to_string()),
            source: None,
        }),
    }
}

fn parse_with_formats<T>(
    name: &str,
    raw: &str,
    type_name: &str,
    formats: &[&str],
    parse: fn(&str, &str) -> chrono::ParseResult<T>,
) -> Result<T, ArgError> {
    let mut last_err = None;
    for fmt in formats {
        match parse(raw.trim(), fmt) {
            Ok(v) => return Ok(v),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(conversion_error(type_name, name, raw, e)),
        None => Err(ArgError::validation(format!(
            "'{raw}' is not a valid {type_name} for argument '{name}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_accepts_words_and_digits() {
        assert!(parse_bool("b", "True").unwrap());
        assert!(parse_bool("b", "1").unwrap());
        assert!(!parse_bool("b", "FALSE").unwrap());
        assert!(!parse_bool("b", "0").unwrap());
        assert!(parse_bool("b", "yes").is_err());
    }

    #[test]
    fn dates_accept_several_formats() {
        let iso = parse_with_formats("d", "2023-07-04", "NaiveDate", DATE_FORMATS, NaiveDate::parse_from_str);
        let us = parse_with_formats("d", "07/04/2023", "NaiveDate", DATE_FORMATS, NaiveDate::parse_from_str);
        assert_eq!(iso.unwrap(), us.unwrap());
        let err = parse_with_formats("d", "July", "NaiveDate", DATE_FORMATS, NaiveDate::parse_from_str)
            .unwrap_err();
        assert_eq!(err.raw_value(), Some("July"));
    }
}
