use std::path::Path;
use std::process;

use serde::Serialize;
use serde_json::{json, Value};
use tracechain_ledger::{ErrorKind, Ledger, LedgerConfig, LedgerError};
use tracechain_storage::MemoryStorage;

use crate::etag::compute_etag;
use crate::scenario::{self, Action, Step};
use crate::tap::Tap;
use crate::{report_error, OutputFormat};

/// Outcome of one scenario step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub description: String,
    /// Whether the step behaved as declared.
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub passed: usize,
    pub failed: usize,
    pub events: usize,
    pub etag: String,
}

pub(crate) async fn cmd_run(path: &Path, config: &LedgerConfig, output: OutputFormat, quiet: bool) {
    let scenario = match scenario::load(path) {
        Ok(s) => s,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let mut config = config.clone();
    if let Some(admin) = scenario.admin {
        config.admin = admin;
    }

    let report = match run_steps(&scenario.steps, &config).await {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("ledger error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                report_error(&format!("serialization error: {}", e), output, quiet);
                process::exit(1);
            }
        },
        OutputFormat::Text => {
            let mut tap = Tap::new();
            for step in &report.steps {
                if step.ok {
                    tap.ok(&step.description);
                } else {
                    tap.not_ok(&step.description, diagnostics(step));
                }
            }
            if !quiet {
                tap.comment(format!("events {}", report.events));
                tap.comment(format!("etag {}", report.etag));
            }
            tap.finish();
        }
    }

    if report.failed > 0 {
        process::exit(1);
    }
}

fn diagnostics(step: &StepReport) -> String {
    match &step.error {
        Some(e) => format!("failed with {}: {}", e.kind, e.message),
        None => "succeeded, but an error was expected".to_string(),
    }
}

/// Replay `steps` against a fresh in-memory ledger.
///
/// A step passes when it succeeds and declares no `expect_error`, or fails
/// with exactly the declared kind. Failing steps never stop the run.
pub async fn run_steps(steps: &[Step], config: &LedgerConfig) -> Result<RunReport, LedgerError> {
    let storage = MemoryStorage::new();
    let ledger = Ledger::initialize(storage.clone(), config).await?;

    let mut reports = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let outcome = execute(&ledger, step).await;
        let ok = match (&outcome, step.expect_error) {
            (Ok(_), None) => true,
            (Err(e), Some(kind)) => e.kind() == kind,
            _ => false,
        };
        tracing::debug!(step = i + 1, action = step.action.name(), ok, "scenario step");
        let (result, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(e) => (
                None,
                Some(StepError {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            ),
        };
        reports.push(StepReport {
            step: i + 1,
            description: step.describe(),
            ok,
            result,
            error,
        });
    }

    let events = ledger.audit_log(None, 0).await?.len();
    let state = storage.dump()?;
    let etag = compute_etag(&state).map_err(|e| LedgerError::Corrupt {
        key: "*".to_string(),
        message: e.to_string(),
    })?;
    let failed = reports.iter().filter(|r| !r.ok).count();
    Ok(RunReport {
        passed: reports.len() - failed,
        failed,
        steps: reports,
        events,
        etag,
    })
}

async fn execute(ledger: &Ledger<MemoryStorage>, step: &Step) -> Result<Value, LedgerError> {
    let caller = &step.actor;
    let value = match &step.action {
        Action::GrantRole { account, role } => {
            json!({ "changed": ledger.grant_role(caller, account, *role).await? })
        }
        Action::RevokeRole { account, role } => {
            json!({ "changed": ledger.revoke_role(caller, account, *role).await? })
        }
        Action::RenounceRole { role } => {
            json!({ "changed": ledger.renounce_role(caller, *role).await? })
        }
        Action::HasRole { account, role } => json!(ledger.has_role(account, *role).await?),
        Action::CreateAnimal {
            species,
            weight,
            sex,
        } => to_value(ledger.create_animal(caller, species, *weight, sex).await?)?,
        Action::SetAnimalData { id, data } => {
            to_value(ledger.set_animal_data(caller, *id, data.clone()).await?)?
        }
        Action::KillAnimal { id } => to_value(ledger.kill_animal(caller, *id).await?)?,
        Action::TransferAnimal { id, to } => {
            ledger.transfer_animal(caller, *id, to).await?;
            json!({ "token_id": id, "owner": to })
        }
        Action::GetAnimal { id } => to_value(ledger.animal(*id).await?)?,
        Action::CreateTransport { animal_id } => {
            to_value(ledger.create_transport(caller, *animal_id).await?)?
        }
        Action::SetTransportData { id, data } => {
            to_value(ledger.set_transport_data(caller, *id, data.clone()).await?)?
        }
        Action::GetTransport { id } => to_value(ledger.transport(*id).await?)?,
        Action::CreateCarcass { animal_id } => {
            to_value(ledger.create_carcass(caller, *animal_id).await?)?
        }
        Action::SetCarcassData { id, data } => {
            to_value(ledger.set_carcass_data(caller, *id, data.clone()).await?)?
        }
        Action::TransferCarcass { id, to } => {
            ledger.transfer_carcass(caller, *id, to).await?;
            json!({ "token_id": id, "owner": to })
        }
        Action::GetCarcass { id } => to_value(ledger.carcass(*id).await?)?,
        Action::CreateMeat {
            carcass_id,
            part,
            weight,
        } => to_value(ledger.create_meat(caller, *carcass_id, part, *weight).await?)?,
        Action::SetMeatData { id, data } => {
            to_value(ledger.set_meat_data(caller, *id, data.clone()).await?)?
        }
        Action::GetMeat { id } => to_value(ledger.meat(*id).await?)?,
        Action::CreateRecipe {
            name,
            description,
            species,
            parts,
            weights,
        } => to_value(
            ledger
                .create_recipe(caller, name, description, species, parts, weights)
                .await?,
        )?,
        Action::GetRecipe { id } => to_value(ledger.recipe(*id).await?)?,
        Action::CheckMeatForRecipe { recipe_id, meat_id } => {
            json!(ledger.check_meat_for_recipe(*recipe_id, *meat_id).await?)
        }
        Action::CreateManufacturedProduct {
            recipe_id,
            meat_ids,
            product_name,
            price,
            description,
        } => to_value(
            ledger
                .create_manufactured_product(
                    caller,
                    *recipe_id,
                    meat_ids,
                    product_name,
                    *price,
                    description,
                )
                .await?,
        )?,
        Action::UpdateManufacturedProduct { id, data } => to_value(
            ledger
                .update_manufactured_product(caller, *id, data.clone())
                .await?,
        )?,
        Action::GetManufacturedProduct { id } => to_value(ledger.manufactured_product(*id).await?)?,
        Action::TraceProduct { id } => to_value(ledger.trace_product(*id).await?)?,
        Action::TransferToken { id, to } => {
            ledger.transfer_token(caller, *id, to).await?;
            json!({ "token_id": id, "owner": to })
        }
        Action::OwnerOf { id } => to_value(ledger.owner_of(*id).await?)?,
        Action::TokensOfOwner { owner } => to_value(ledger.tokens_of_owner(owner).await?)?,
        Action::TokensByCategory { category } => {
            to_value(ledger.tokens_by_category(*category).await?)?
        }
    };
    Ok(value)
}

fn to_value<T: Serialize>(value: T) -> Result<Value, LedgerError> {
    serde_json::to_value(value).map_err(|e| LedgerError::Corrupt {
        key: "result".to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;

    fn steps(toml_text: &str) -> Vec<Step> {
        toml::from_str::<Scenario>(toml_text).unwrap().steps
    }

    #[tokio::test]
    async fn expected_failures_count_as_passes() {
        let steps = steps(
            r#"
            [[step]]
            actor = "admin"
            action = "grant_role"
            account = "b"
            role = "BREEDER"

            [[step]]
            actor = "b"
            action = "create_animal"
            species = "Cow"
            weight = 10
            sex = "male"

            [[step]]
            actor = "b"
            action = "kill_animal"
            id = 0

            [[step]]
            actor = "b"
            action = "kill_animal"
            id = 0
            expect_error = "IllegalStateTransition"
            "#,
        );
        let report = run_steps(&steps, &LedgerConfig::default()).await.unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(report.passed, 4);
        assert_eq!(report.steps[1].result.as_ref().unwrap()["id"], 0);
        assert_eq!(
            report.steps[3].error.as_ref().unwrap().message,
            "Animal already has been slaughtered"
        );
        // admin grant, breeder grant, mint, kill
        assert_eq!(report.events, 4);
    }

    #[tokio::test]
    async fn unexpected_outcomes_fail_the_step() {
        let steps = steps(
            r#"
            [[step]]
            actor = "nobody"
            action = "create_animal"
            species = "Cow"
            weight = 10
            sex = "male"

            [[step]]
            actor = "admin"
            action = "grant_role"
            account = "b"
            role = "BREEDER"
            expect_error = "Unauthorized"
            "#,
        );
        let report = run_steps(&steps, &LedgerConfig::default()).await.unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(
            diagnostics(&report.steps[0]),
            "failed with Unauthorized: Caller is not a breeder"
        );
        assert_eq!(
            diagnostics(&report.steps[1]),
            "succeeded, but an error was expected"
        );
    }

    #[tokio::test]
    async fn identical_runs_share_an_etag() {
        let text = r#"
            [[step]]
            actor = "admin"
            action = "grant_role"
            account = "m"
            role = "MANUFACTURER"
        "#;
        let a = run_steps(&steps(text), &LedgerConfig::default()).await.unwrap();
        let b = run_steps(&steps(text), &LedgerConfig::default()).await.unwrap();
        assert_eq!(a.etag, b.etag);
        let empty = run_steps(&[], &LedgerConfig::default()).await.unwrap();
        assert_ne!(a.etag, empty.etag);
    }
}
