use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::from_str;
use which::which;
use wheelship_domain::AbiTag;

use crate::process::run_command;

const ABI_SCRIPT: &str = r#"import json, sys
print(json.dumps({
    "implementation": sys.implementation.name,
    "major": sys.version_info[0],
    "minor": sys.version_info[1],
}))
"#;

/// Picks the interpreter used for every build, install, and test step.
///
/// # Errors
///
/// Returns an error when neither `python3` nor `python` is on `PATH`.
pub fn detect_interpreter(explicit: Option<&str>) -> Result<String> {
    if let Some(explicit) = explicit.filter(|value| !value.trim().is_empty()) {
        return Ok(explicit.to_string());
    }

    for candidate in ["python3", "python"] {
        if let Ok(path) = which(candidate) {
            return path
                .into_os_string()
                .into_string()
                .map_err(|_| anyhow!("non-utf8 path"));
        }
    }

    bail!("no python interpreter found; set WHEELSHIP_PYTHON")
}

/// Asks the interpreter for its CPython ABI tag (`cp<major><minor>`).
///
/// # Errors
///
/// Returns an error when the interpreter cannot be executed, the payload is
/// malformed, or the interpreter is not CPython.
pub fn detect_abi_tag(python: &str, capture_limit: usize) -> Result<AbiTag> {
    let payload: AbiPayload = query_python(python, ABI_SCRIPT, "ABI tag", capture_limit)?;
    if payload.implementation != "cpython" {
        bail!(
            "{python} is {} but wheels are tagged for CPython",
            payload.implementation
        );
    }
    Ok(AbiTag::cpython(payload.major, payload.minor))
}

fn query_python<T>(python: &str, script: &str, guide: &str, capture_limit: usize) -> Result<T>
where
    T: DeserializeOwned,
{
    let output = run_command(
        python,
        &["-c".to_string(), script.to_string()],
        Path::new("."),
        capture_limit,
    )
    .with_context(|| format!("failed to query {guide} from {python}"))?;
    if !output.success() {
        bail!("python {guide} query failed: {}", output.stderr.trim());
    }
    from_str(output.stdout.trim()).with_context(|| format!("invalid {guide} payload"))
}

#[derive(Deserialize)]
struct AbiPayload {
    implementation: String,
    major: u32,
    minor: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_interpreter_wins() {
        assert_eq!(
            detect_interpreter(Some("/opt/python/bin/python3.11")).expect("explicit"),
            "/opt/python/bin/python3.11"
        );
    }

    #[test]
    fn abi_payload_parses() {
        let payload: AbiPayload =
            from_str(r#"{"implementation": "cpython", "major": 3, "minor": 12}"#).expect("json");
        assert_eq!(
            AbiTag::cpython(payload.major, payload.minor).to_string(),
            "cp312"
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_interpreter_is_reported() {
        let err = detect_abi_tag("/bin/false", crate::process::DEFAULT_MAX_CAPTURE_BYTES)
            .expect_err("query fails");
        assert!(err.to_string().contains("query failed"));
    }
}
