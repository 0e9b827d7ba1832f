use std::env;
use std::str::FromStr;
use tracing::warn;

/// Retrieves an environment variable and splits it into a vector of strings based on a delimiter.
///
/// Empty segments are dropped, so an unset variable yields an empty vector.
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reads and parses an environment variable, keeping `default` when the variable
/// is unset or cannot be parsed.
pub fn get_env_var_or<T>(var: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(var) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable value '{}' for {}", raw, var);
                default
            }
        },
        Err(_) => default,
    }
}

/// Path of the SQLite database file.
pub fn database_path() -> String {
    env::var("DATABASE_PATH").unwrap_or_else(|_| "newswire.db".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_vars_fall_back() {
        assert!(get_env_var_as_vec("NEWSWIRE_TEST_UNSET_LIST", ';').is_empty());
        assert_eq!(get_env_var_or("NEWSWIRE_TEST_UNSET_NUMBER", 0.6_f64), 0.6);
    }
}
