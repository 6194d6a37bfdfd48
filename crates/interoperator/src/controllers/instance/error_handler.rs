use tracing::{debug, instrument, warn};

use fluvio_future::timer::sleep;

use interoperator_metadata::{ObjectKey, ResourceClient};
use interoperator_metadata::constants::{ERROR_THRESHOLD, TIMEOUT_DESCRIPTION};
use interoperator_metadata::instance::{
    ErrorCount, InstanceState, LastOperation, ServiceInstance, ServiceInstanceSpec,
};

use crate::ReconcileError;
use crate::runtime::{Action, RetryPolicy};

/// what the bookkeeping decided for the outcome of a pass
enum Verdict {
    /// nothing to record
    Keep,
    /// record and pass on the outcome
    Record(ErrorCount),
    /// too many failures, give up on the instance
    Fail(ErrorCount),
}

fn verdict(instance: &ServiceInstance, failed: bool) -> Verdict {
    let count = instance.error_count();
    if !failed {
        return if count.is_zero() {
            Verdict::Keep
        } else {
            Verdict::Record(ErrorCount::default())
        };
    }
    let count = count.increment();
    if count.0 > ERROR_THRESHOLD {
        Verdict::Fail(count)
    } else {
        Verdict::Record(count)
    }
}

/// track consecutive failures of an instance in its `errorCount` label.
///
/// Once the count exceeds the threshold the instance is marked failed with a
/// timeout description and the error is swallowed. Otherwise the outcome of
/// the pass is returned untouched.
#[instrument(skip(client, policy, outcome), fields(%key, %last_operation))]
pub async fn handle_error(
    client: &dyn ResourceClient,
    key: &ObjectKey,
    last_operation: LastOperation,
    outcome: Result<Action, ReconcileError>,
    policy: RetryPolicy,
) -> Result<Action, ReconcileError> {
    for attempt in 1..=policy.calls() {
        let mut instance = match client.get_obj_opt::<ServiceInstanceSpec>(key).await {
            Ok(Some(instance)) => instance,
            Ok(None) => return outcome,
            Err(err) => {
                warn!(attempt, %err, "fetching instance failed");
                sleep(policy.delay).await;
                continue;
            }
        };

        let swallow = match verdict(&instance, outcome.is_err()) {
            Verdict::Keep => return outcome,
            Verdict::Record(count) => {
                instance.set_error_count(count);
                false
            }
            Verdict::Fail(count) => {
                let reason = match &outcome {
                    Err(err) => err.to_string(),
                    Ok(_) => String::new(),
                };
                warn!(errors = count.0, "retry threshold reached, marking failed");
                instance.set_state(InstanceState::Failed);
                instance.status.error =
                    format!("Retry threshold reached for {}.\n{reason}", instance.name());
                instance.status.description = TIMEOUT_DESCRIPTION.to_owned();
                instance.set_last_operation(last_operation);
                instance.set_error_count(ErrorCount::default());
                true
            }
        };

        match client.update_obj(instance).await {
            Ok(updated) => {
                debug!(errors = updated.error_count().0, "error count recorded");
                return if swallow { Ok(Action::Await) } else { outcome };
            }
            Err(err) => {
                warn!(attempt, %err, "recording error count failed");
                sleep(policy.delay).await;
            }
        }
    }
    outcome
}
