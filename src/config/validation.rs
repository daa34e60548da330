use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Threshold must be at least 1: {field} = {value}")]
    InvalidThreshold { field: String, value: u32 },

    #[error("soft_exclude_after ({soft}) exceeds remove_after ({remove})")]
    SoftExcludeAboveRemoval { soft: u32, remove: u32 },

    #[error("Timeout must be positive: {field}")]
    ZeroTimeout { field: String },

    #[error("max_attempts must be at least 1")]
    NoAttempts,

    #[error("Proxy file path is empty")]
    EmptyProxyFile,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_pool(config)?;
    validate_fetch(config)?;
    Ok(())
}

fn validate_pool(config: &Config) -> Result<(), ValidationError> {
    let pool = &config.pool;

    if pool.proxy_file.as_os_str().is_empty() {
        return Err(ValidationError::EmptyProxyFile);
    }

    for (field, value) in [
        ("remove_after", pool.remove_after),
        ("soft_exclude_after", pool.soft_exclude_after),
    ] {
        if value == 0 {
            return Err(ValidationError::InvalidThreshold {
                field: field.to_string(),
                value,
            });
        }
    }

    if pool.soft_exclude_after > pool.remove_after {
        return Err(ValidationError::SoftExcludeAboveRemoval {
            soft: pool.soft_exclude_after,
            remove: pool.remove_after,
        });
    }

    Ok(())
}

fn validate_fetch(config: &Config) -> Result<(), ValidationError> {
    let fetch = &config.fetch;

    for (field, value) in [
        ("connect_timeout", fetch.connect_timeout),
        ("read_timeout", fetch.read_timeout),
    ] {
        if value.is_zero() {
            return Err(ValidationError::ZeroTimeout {
                field: field.to_string(),
            });
        }
    }

    if fetch.max_attempts == 0 {
        return Err(ValidationError::NoAttempts);
    }

    Ok(())
}
