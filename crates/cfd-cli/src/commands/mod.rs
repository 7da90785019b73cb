//! CLI command implementations.

pub mod drive;

use cfd_driver::StageError;

pub const BUILD_FAILURE_EXIT_CODE: &str = "BUILD_FAILURE_EXIT_CODE";
pub const SYSTEM_FAILURE_EXIT_CODE: &str = "SYSTEM_FAILURE_EXIT_CODE";

/// Exit code for a failed command.
///
/// A failing job script maps to GitLab Runner's build failure code, anything
/// else to its system failure code. Without those, 1.
pub fn exit_code(err: &anyhow::Error, lookup: impl Fn(&str) -> Option<String>) -> u8 {
    let build_failure = err
        .chain()
        .filter_map(|e| e.downcast_ref::<StageError>())
        .any(StageError::is_build_failure);

    let key = if build_failure {
        BUILD_FAILURE_EXIT_CODE
    } else {
        SYSTEM_FAILURE_EXIT_CODE
    };

    lookup(key)
        .and_then(|code| code.trim().parse().ok())
        .unwrap_or(1)
}
