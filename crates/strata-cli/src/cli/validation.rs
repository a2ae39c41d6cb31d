use strata_bundler::build::HASH_LENGTH_RANGE;

/// Parse `--hash-length`.
pub fn parse_hash_length(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if !HASH_LENGTH_RANGE.contains(&value) {
        return Err(format!(
            "must be between {} and {}",
            HASH_LENGTH_RANGE.start(),
            HASH_LENGTH_RANGE.end()
        ));
    }
    Ok(value)
}

/// Parse `--jobs`.
pub fn parse_jobs(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{s}' is not a number")),
    }
}
