//! Command dispatch: one engine call per subcommand, rendered as JSON.

use std::io;
use std::path::PathBuf;

use redemption_engine::{
    AdministrationApi, NewVoucher, RedemptionApi, RedemptionError, ScanContext,
};
use serde::Serialize;
use serde_json::{json, Value};
use shared_types::CallerIdentity;
use thiserror::Error;

use crate::cli::{Command, CreateVoucherArgs};

/// Failure of a single command. Engine errors keep their stable code.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Engine(#[from] RedemptionError),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CommandError {
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Engine(e) => e.code(),
            CommandError::Read { .. } => "invalid_request",
            CommandError::Encode(_) => "internal",
        }
    }

    /// Fixed, user-facing text for each code. Underlying store, OS and blob
    /// messages are logged, never rendered.
    pub fn summary(&self) -> &'static str {
        match self.code() {
            "not_found" => "token or voucher not found",
            "invalid" => "voucher instance is not redeemable",
            "redeemed_concurrently" => "voucher instance was redeemed concurrently",
            "storage_failure" => "storage unavailable, retry later",
            "signature_failure" => "signature could not be stored",
            "forbidden" => "caller is not allowed to perform this operation",
            "invalid_request" => "invalid request",
            "entropy_unavailable" => "token generation unavailable",
            "restricted" => "public token status is disabled",
            _ => "internal error",
        }
    }

    /// JSON error body: `{"error": code, "message": summary, "reason"?: ..}`.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": self.code(),
            "message": self.summary(),
        });
        if let CommandError::Engine(e) = self {
            if let Some(reason) = e.reason() {
                body["reason"] = json!(reason);
            }
        }
        body
    }
}

/// Run `command` as `caller` against `service`.
pub fn execute<S>(
    command: &Command,
    caller: &CallerIdentity,
    service: &S,
) -> Result<Value, CommandError>
where
    S: RedemptionApi + AdministrationApi,
{
    match command {
        Command::CreateVoucher(args) => to_json(service.create_voucher(caller, new_voucher(args))?),
        Command::VoucherStatus { voucher_id, status } => {
            to_json(service.set_voucher_status(caller, *voucher_id, (*status).into())?)
        }
        Command::Vouchers => to_json(service.list_vouchers(caller)?),
        Command::Generate {
            voucher_id,
            count,
            expiry_days,
        } => to_json(service.generate_batch(caller, *voucher_id, *count, *expiry_days)?),
        Command::Instances {
            voucher_id,
            offset,
            limit,
        } => to_json(service.list_instances(caller, *voucher_id, *offset, *limit)?),
        Command::InstanceStatus { token, status } => {
            to_json(service.set_instance_status(caller, token, (*status).into())?)
        }
        Command::Validate {
            token,
            ip,
            user_agent,
        } => to_json(service.validate(token, caller, &ScanContext::new(ip, user_agent))?),
        Command::Redeem {
            token,
            signature,
            signature_file,
        } => {
            let signature = match (signature, signature_file) {
                (Some(url), _) => Some(url.clone()),
                (None, Some(path)) => Some(read_signature(path)?),
                (None, None) => None,
            };
            to_json(service.redeem(token, caller, signature.as_deref())?)
        }
        Command::Redemptions { limit } => to_json(service.list_redemptions(caller, *limit)?),
        Command::Scans { limit } => to_json(service.list_scans(caller, *limit)?),
        Command::Stats => to_json(service.stats(caller)?),
        Command::Status { token } => to_json(service.public_status(token)?),
    }
}

/// Render `value` for stdout.
pub fn render(value: &Value, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    // Serializing a `Value` cannot fail.
    rendered.unwrap_or_default()
}

fn new_voucher(args: &CreateVoucherArgs) -> NewVoucher {
    NewVoucher::new(args.name.clone(), args.reward_type.into(), args.value)
        .with_status(args.status.into())
        .with_window(args.starts_at, args.ends_at)
        .with_limits(args.max_total, args.max_per_user)
}

fn read_signature(path: &PathBuf) -> Result<String, CommandError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| CommandError::Read {
            path: path.clone(),
            source,
        })
}

fn to_json<T: Serialize>(value: T) -> Result<Value, CommandError> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{RewardArg, StatusArg};
    use redemption_engine::test_utils::{admin, operator, TestHarness, TINY_PNG_DATA_URL};
    use redemption_engine::{EngineConfig, KVStoreError, VoucherId};

    fn create(h: &TestHarness) -> VoucherId {
        let value = execute(
            &Command::CreateVoucher(CreateVoucherArgs {
                name: "Coffee".to_string(),
                reward_type: RewardArg::FreeItem,
                value: 0.0,
                status: StatusArg::Active,
                starts_at: None,
                ends_at: None,
                max_total: 0,
                max_per_user: 0,
            }),
            &admin(),
            h.service.as_ref(),
        )
        .unwrap();
        assert_eq!(value["reward_type"], "FREE_ITEM");
        serde_json::from_value(value["id"].clone()).unwrap()
    }

    #[test]
    fn test_generate_validate_redeem_flow() {
        let h = TestHarness::new();
        let voucher_id = create(&h);

        let batch = execute(
            &Command::Generate {
                voucher_id,
                count: 3,
                expiry_days: Some(7),
            },
            &admin(),
            h.service.as_ref(),
        )
        .unwrap();
        assert_eq!(batch["created"], 3);
        let token = batch["tokens_preview"][0].as_str().unwrap().to_string();

        let verdict = execute(
            &Command::Validate {
                token: token.clone(),
                ip: "10.1.1.1".to_string(),
                user_agent: "test".to_string(),
            },
            &operator(),
            h.service.as_ref(),
        )
        .unwrap();
        assert_eq!(verdict["valid"], true);
        assert_eq!(verdict["reason"], "ok");

        let receipt = execute(
            &Command::Redeem {
                token: token.clone(),
                signature: Some(TINY_PNG_DATA_URL.to_string()),
                signature_file: None,
            },
            &operator(),
            h.service.as_ref(),
        )
        .unwrap();
        assert_eq!(receipt["redeemed"], true);
        assert!(receipt["signature_path"].is_string());

        let again = execute(
            &Command::Redeem {
                token,
                signature: None,
                signature_file: None,
            },
            &operator(),
            h.service.as_ref(),
        )
        .unwrap_err();
        let body = again.to_json();
        assert_eq!(body["error"], "invalid");
        assert_eq!(body["reason"], "already_redeemed");
    }

    #[test]
    fn test_signature_file_is_read() {
        let h = TestHarness::new();
        let voucher_id = create(&h);
        let token = h.issue_one(voucher_id);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sig.txt");
        std::fs::write(&path, format!("{}\n", TINY_PNG_DATA_URL)).unwrap();

        let receipt = execute(
            &Command::Redeem {
                token: token.as_str().to_string(),
                signature: None,
                signature_file: Some(path),
            },
            &operator(),
            h.service.as_ref(),
        )
        .unwrap();
        assert!(receipt["signature_path"].is_string());
        assert_eq!(h.blobs.len(), 1);
    }

    #[test]
    fn test_missing_signature_file() {
        let h = TestHarness::new();
        let err = execute(
            &Command::Redeem {
                token: "whatever".to_string(),
                signature: None,
                signature_file: Some(PathBuf::from("/nonexistent/sig.txt")),
            },
            &operator(),
            h.service.as_ref(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_forbidden_and_restricted_codes() {
        let h = TestHarness::new();
        let err = execute(&Command::Stats, &operator(), h.service.as_ref()).unwrap_err();
        assert_eq!(err.to_json()["error"], "forbidden");

        let err = execute(
            &Command::Status {
                token: "anything".to_string(),
            },
            &operator(),
            h.service.as_ref(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "restricted");
    }

    #[test]
    fn test_public_status_when_enabled() {
        let h = TestHarness::with_config(EngineConfig::default().with_public_token_status(true));
        let voucher_id = create(&h);
        let token = h.issue_one(voucher_id);

        let status = execute(
            &Command::Status {
                token: token.as_str().to_string(),
            },
            &operator(),
            h.service.as_ref(),
        )
        .unwrap();
        assert_eq!(status["valid"]["valid"], true);
        assert_eq!(status["details"]["name"], "Coffee");
    }

    #[test]
    fn test_error_body_hides_internal_messages() {
        let err = CommandError::from(RedemptionError::from(KVStoreError::IOError {
            message: "Permission denied (os error 13)".to_string(),
        }));
        let body = err.to_json();
        assert_eq!(body["error"], "storage_failure");
        assert_eq!(body["message"], "storage unavailable, retry later");
        assert!(body.get("reason").is_none());
        assert!(!body.to_string().contains("os error"));

        let err = CommandError::Read {
            path: PathBuf::from("/secret/sig.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        let rendered = err.to_json().to_string();
        assert!(!rendered.contains("/secret"));
        assert!(!rendered.contains("No such file"));
    }

    #[test]
    fn test_render_compact() {
        let value = json!({"a": 1});
        assert_eq!(render(&value, true), r#"{"a":1}"#);
        assert!(render(&value, false).contains('\n'));
    }
}
