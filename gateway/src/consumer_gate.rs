//! Consumer Tool Gate (base spec §4.6): for a parsed function call whose name is not
//! in the platform set, create an Action, transition the run to `action_required`, and
//! block by polling run status until an external fulfiller moves it on (or the run is
//! cancelled). Grounded on the same poll-loop shape as [`crate::cancellation`]'s
//! monitor, since the source implements only one polling pattern
//! (`start_cancellation_listener`'s `time.sleep` loop).

use std::time::Duration;

use serde_json::Map;
use serde_json::Value;

use crate::cancellation::CancellationFlag;
use crate::error::GatewayError;
use crate::storage::{ActionStatus, RunStatus, StorageClient};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of waiting on a consumer tool's external fulfillment.
#[derive(Debug, PartialEq, Eq)]
pub enum GateOutcome {
    /// The run moved off `action_required`; re-entry should proceed.
    Resumed,
    /// The run was cancelled while the gate was waiting.
    Cancelled,
}

/// Creates a pending Action, flips the run to `action_required`, then blocks until the
/// run status changes or cancellation is observed (base spec §4.6 steps 1-3). Step 4
/// (re-streaming with the updated conversation) is the orchestrator's job once this
/// returns [`GateOutcome::Resumed`].
pub async fn gate_on_consumer_tool(
    storage: &dyn StorageClient,
    run_id: &str,
    tool_name: &str,
    arguments: &Map<String, Value>,
    cancellation: &CancellationFlag,
    poll_interval: Duration,
) -> Result<GateOutcome, GatewayError> {
    storage.create_action(run_id, tool_name, arguments).await?;
    storage.set_run_status(run_id, RunStatus::ActionRequired).await?;

    loop {
        if cancellation.is_cancelled() {
            return Ok(GateOutcome::Cancelled);
        }
        let status = storage.get_run_status(run_id).await?;
        match status {
            RunStatus::ActionRequired => {
                tokio::time::sleep(poll_interval).await;
            }
            RunStatus::Cancelling | RunStatus::Cancelled => return Ok(GateOutcome::Cancelled),
            _ => return Ok(GateOutcome::Resumed),
        }
    }
}

/// Marks the Action `completed`/`failed` once a platform handler has run (base spec
/// §4.5: "mark the Action `completed` (or `failed` on exception)"). Used by platform
/// handlers, not the consumer gate itself (a consumer tool's Action is completed by the
/// external fulfiller, never by the gateway).
pub async fn finalize_platform_action(
    storage: &dyn StorageClient,
    action_id: &str,
    succeeded: bool,
) -> Result<(), GatewayError> {
    let status = if succeeded {
        ActionStatus::Completed
    } else {
        ActionStatus::Failed
    };
    storage.update_action_status(action_id, status).await
}
