// Capability negotiation
//
// Checks required extension names against what the driver reports before any
// object that depends on them is created.

use std::ffi::{CStr, CString};

use super::error::{BackendError, ExtensionKind};

/// Required names that do not appear in `available`.
///
/// Each requirement carries its own flag; a match for one name never
/// satisfies another.
pub fn missing_extensions<'a>(required: &[&'a CStr], available: &[CString]) -> Vec<&'a CStr> {
    let mut found = vec![false; required.len()];

    for name in available {
        for (flag, wanted) in found.iter_mut().zip(required) {
            if name.as_c_str() == *wanted {
                *flag = true;
            }
        }
    }

    required
        .iter()
        .zip(found)
        .filter(|(_, found)| !found)
        .map(|(name, _)| *name)
        .collect()
}

/// Fail if any required extension is absent
pub fn negotiate(
    kind: ExtensionKind,
    required: &[&CStr],
    available: &[CString],
) -> Result<(), BackendError> {
    let missing = missing_extensions(required, available);
    if missing.is_empty() {
        log::debug!("All {} {} extensions present", required.len(), kind);
        return Ok(());
    }

    Err(BackendError::MissingExtensions {
        kind,
        names: missing
            .iter()
            .map(|name| name.to_string_lossy().into_owned())
            .collect(),
    })
}
