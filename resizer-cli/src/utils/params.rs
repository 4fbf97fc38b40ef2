use crate::error::AppError;
use tracing::{debug, error};

/// Parses per-stage worker overrides.
///
/// Each entry is `stage=count`. The entry is split at the first `=`; the count
/// must be a positive integer. Stage names are checked later, together with the
/// rest of the run options.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` when an entry has no `=` or its count is not
/// a positive integer.
///
/// # Examples
///
/// ```ignore
/// let overrides = parse_stage_workers(&["decode=2".to_string(), "persist=8".to_string()])?;
/// assert_eq!(overrides, vec![("decode".to_string(), 2), ("persist".to_string(), 8)]);
/// ```
pub fn parse_stage_workers(params: &[String]) -> Result<Vec<(String, usize)>, AppError> {
    debug!("Parsing {} stage worker overrides", params.len());

    let result: Result<Vec<(String, usize)>, AppError> = params
        .iter()
        .map(|param| {
            let (stage, count) = param.split_once('=').ok_or_else(|| {
                error!("Invalid stage worker format: {param}");
                AppError::InvalidInput(format!(
                    "Invalid stage worker format: {param} (expected stage=count)"
                ))
            })?;

            match count.trim().parse::<usize>() {
                Ok(count) if count > 0 => {
                    debug!("Stage '{}' uses {count} workers", stage.trim());
                    Ok((stage.trim().to_string(), count))
                }
                _ => Err(AppError::InvalidInput(format!(
                    "Invalid worker count for stage '{}': {count}",
                    stage.trim()
                ))),
            }
        })
        .collect();

    if let Err(e) = &result {
        error!("Failed to parse stage workers: {e}");
    }

    result
}
