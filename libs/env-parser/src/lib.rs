//! environment variable lookups for settings that don't go through clap
#![warn(
    missing_debug_implementations,
    missing_docs,
    missing_copy_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]
use anyhow::Context;

use std::{env, str};

/// Parse the variable `name` as `T`. An unset or empty variable parses
/// `default` instead.
pub fn parse_var<T, S>(name: &str, default: S) -> Result<T, <T as str::FromStr>::Err>
where
    T: str::FromStr,
    S: ToString,
{
    var_nonempty(name)
        .unwrap_or_else(|| default.to_string())
        .parse::<T>()
}

/// [`parse_var`] with the variable name in the error
pub fn parse_var_with_err<T, S>(name: &str, default: S) -> anyhow::Result<T>
where
    T: str::FromStr,
    <T as str::FromStr>::Err: std::error::Error + Send + Sync + 'static,
    S: ToString + Send,
{
    parse_var::<T, S>(name, default).with_context(|| format!("error parsing env var {name}"))
}

/// the trimmed value of `name`, if it is set to something
fn var_nonempty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
