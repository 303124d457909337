//! Custom macros for reducing code repetition in vidd

/// Log an error and continue execution (non-fatal error handling)
///
/// # Example
/// ```ignore
/// log_and_continue!(backend.set_volume(volume), "apply volume");
/// ```
#[macro_export]
macro_rules! log_and_continue {
    ($expr:expr, $context:expr) => {
        if let Err(e) = $expr {
            log::error!("Failed to {}: {}", $context, e);
        }
    };
}

/// Validate an enum-like string value
///
/// # Example
/// ```ignore
/// validate_enum!(origin, "top-left", "bottom-left");
/// validate_enum!(kind, "gstreamer", "headless");
/// ```
#[macro_export]
macro_rules! validate_enum {
    ($value:expr, $($variant:expr),+) => {
        match $value {
            $($variant)|+ => Ok(()),
            _ => anyhow::bail!("Invalid value: {} (expected one of: {})", $value, [$($variant),+].join(", ")),
        }
    };
}

/// Reject a non-finite float argument with `PlayerError::InvalidArgument`
///
/// # Example
/// ```ignore
/// ensure_finite!(volume, "volume");
/// ```
#[macro_export]
macro_rules! ensure_finite {
    ($value:expr, $name:expr) => {
        if !$value.is_finite() {
            return Err(common::PlayerError::InvalidArgument(format!(
                "{} must be a finite number, got {}",
                $name, $value
            )));
        }
    };
}
