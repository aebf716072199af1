//! Solidity compilation through an external `solc` binary.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{RpcError, RpcResult};

/// Runs `solc --combined-json` on sources received over RPC.
#[derive(Debug, Clone)]
pub struct SolcCompiler {
    path: PathBuf,
}

impl SolcCompiler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Compiler version, or `None` when the binary cannot be run.
    pub fn version(&self) -> Option<String> {
        let output = Command::new(&self.path).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version(&stdout)
    }

    /// Compile a source unit into the `eth_compileSolidity` result shape.
    pub fn compile(&self, source: &str) -> RpcResult<Value> {
        let mut child = Command::new(&self.path)
            .args(["--combined-json", "abi,bin,userdoc,devdoc", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                warn!("Failed to run {}: {}", self.path.display(), e);
                RpcError::Compiler(format!("solc not available at {}: {e}", self.path.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|e| RpcError::Compiler(format!("failed to pass source to solc: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| RpcError::Compiler(format!("solc did not finish: {e}")))?;
        if !output.status.success() {
            return Err(RpcError::Compiler(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let combined: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| RpcError::Compiler(format!("unreadable solc output: {e}")))?;
        let version = self.version().unwrap_or_default();
        debug!("Compiled {} bytes of Solidity with solc {}", source.len(), version);
        contracts_from_combined_json(&combined, source, &version)
    }
}

/// Extract the semantic version from `solc --version` output.
fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("Version: "))
        .map(|v| v.trim().to_string())
}

/// Convert `solc --combined-json` output into `{ Name: { code, info } }`.
fn contracts_from_combined_json(combined: &Value, source: &str, version: &str) -> RpcResult<Value> {
    let contracts = combined
        .get("contracts")
        .and_then(Value::as_object)
        .ok_or_else(|| RpcError::Compiler("solc output has no contracts".to_string()))?;

    let mut result = Map::new();
    for (key, contract) in contracts {
        // Keys look like "<stdin>:Name".
        let name = key.rsplit(':').next().unwrap_or(key);
        let bin = contract.get("bin").and_then(Value::as_str).unwrap_or_default();
        result.insert(
            name.to_string(),
            json!({
                "code": format!("0x{bin}"),
                "info": {
                    "source": source,
                    "language": "Solidity",
                    "languageVersion": version,
                    "compilerVersion": version,
                    "abiDefinition": embedded_json(contract.get("abi")),
                    "userDoc": embedded_json(contract.get("userdoc")),
                    "developerDoc": embedded_json(contract.get("devdoc")),
                }
            }),
        );
    }
    Ok(Value::Object(result))
}

/// Older solc releases embed these fields as JSON strings.
fn embedded_json(field: Option<&Value>) -> Value {
    match field {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::String(s.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let output = "solc, the solidity compiler commandline interface\nVersion: 0.8.24+commit.e11b9ed9.Linux.g++\n";
        assert_eq!(
            parse_version(output).as_deref(),
            Some("0.8.24+commit.e11b9ed9.Linux.g++")
        );
        assert_eq!(parse_version("garbage"), None);
    }

    #[test]
    fn test_contracts_from_combined_json() {
        let combined = json!({
            "contracts": {
                "<stdin>:Greeter": {
                    "abi": "[{\"type\":\"function\",\"name\":\"greet\"}]",
                    "bin": "6080",
                    "userdoc": {"methods": {}},
                    "devdoc": "{\"methods\":{}}"
                }
            },
            "version": "0.4.24"
        });
        let result = contracts_from_combined_json(&combined, "contract Greeter {}", "0.4.24").unwrap();
        let greeter = &result["Greeter"];
        assert_eq!(greeter["code"], "0x6080");
        assert_eq!(greeter["info"]["language"], "Solidity");
        assert_eq!(greeter["info"]["abiDefinition"][0]["name"], "greet");
        assert_eq!(greeter["info"]["developerDoc"], json!({"methods": {}}));
        assert_eq!(greeter["info"]["source"], "contract Greeter {}");
    }

    #[test]
    fn test_missing_compiler() {
        let solc = SolcCompiler::new("/nonexistent/solc");
        assert_eq!(solc.version(), None);
        assert!(matches!(
            solc.compile("contract A {}"),
            Err(RpcError::Compiler(_))
        ));
    }
}
