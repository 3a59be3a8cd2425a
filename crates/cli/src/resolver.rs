//! Turns one interrupt into one authorization decision.

use std::sync::Arc;

use proto::{Decision, Interrupt, InterruptKind};
use tools::AuthorizationWaiter;
use tracing::{debug, warn};

use crate::terminal::{Terminal, confirm, system_line};

/// Resolves interrupts by talking to the operator and the tool service.
pub struct InterruptResolver {
    waiter: Arc<dyn AuthorizationWaiter>,
}

impl InterruptResolver {
    pub fn new(waiter: Arc<dyn AuthorizationWaiter>) -> Self {
        Self { waiter }
    }

    /// Produces exactly one decision. Failures along the way deny the call.
    pub async fn resolve(&self, interrupt: &Interrupt, terminal: &mut dyn Terminal) -> Decision {
        debug!(id = %interrupt.id, kind = ?interrupt.kind, "Resolving interrupt");
        match &interrupt.kind {
            InterruptKind::AuthorizationRequired {
                tool_name,
                url,
                authorization_id,
            } => {
                notice(
                    terminal,
                    &format!("Authorization required for tool call {tool_name}"),
                )
                .await;
                notice(terminal, &format!("Please authorize in your browser {url}")).await;
                notice(terminal, "Waiting for you to complete authorization...").await;

                match self.waiter.wait_for_completion(authorization_id).await {
                    Ok(()) => {
                        notice(terminal, "Authorization granted. Resuming execution...").await;
                        Decision::allow()
                    }
                    Err(e) => {
                        warn!(tool = %tool_name, error = %e, "Authorization did not complete");
                        notice(
                            terminal,
                            &format!("Error waiting for authorization to complete: {e}"),
                        )
                        .await;
                        Decision::deny()
                    }
                }
            }
            InterruptKind::HumanApprovalRequired { tool_name, input } => {
                notice(
                    terminal,
                    &format!("Human in the loop required for tool call {tool_name}"),
                )
                .await;
                notice(terminal, &format!("Please approve the tool call {input}")).await;
                let approved = confirm(terminal, "Do you approve this tool call?").await;
                debug!(tool = %tool_name, approved, "Approval answered");
                Decision { authorized: approved }
            }
            InterruptKind::Unrecognized { payload } => {
                warn!(id = %interrupt.id, payload = %payload, "Unrecognized interrupt denied");
                notice(
                    terminal,
                    &format!("Unrecognized interrupt for call {}; denying it", interrupt.id),
                )
                .await;
                Decision::deny()
            }
        }
    }
}

async fn notice(terminal: &mut dyn Terminal, text: &str) {
    if let Err(e) = terminal.write_line(&system_line(text)).await {
        debug!(error = %e, "Failed to write notice");
    }
}
