//! The stage worker loop.

use super::{Envelope, Handshake, Mailbox, PipelineSystem, ShutdownQuorum, StageRef};
use crate::core::{FailureNotice, Payload, StageOutput, Stereotype};
use crate::errors::ContractViolation;
use crate::events::{STAGE_CONTRACT_VIOLATION, STAGE_FAILED};
use crate::observability::SpanTimer;
use crate::stages::{Stage, StageContext};
use std::ops::ControlFlow;
use tracing::{debug, error, warn};

/// Drives one stage instance: one envelope at a time, in mailbox order.
pub(crate) struct StageWorker {
    stage: Box<dyn Stage>,
    mailbox: Mailbox,
    wiring: Wiring,
}

/// Everything but the stage itself. Shared by reference across awaits.
struct Wiring {
    stereotype: Stereotype,
    ctx: StageContext,
    system: PipelineSystem,
    handshake: Handshake,
    quorum: ShutdownQuorum,
}

impl StageWorker {
    pub(crate) fn new(
        stage: Box<dyn Stage>,
        stereotype: Stereotype,
        ctx: StageContext,
        mailbox: Mailbox,
        system: PipelineSystem,
    ) -> Self {
        Self {
            stage,
            mailbox,
            wiring: Wiring {
                stereotype,
                ctx,
                system,
                handshake: Handshake::default(),
                quorum: ShutdownQuorum::default(),
            },
        }
    }

    pub(crate) async fn run(mut self) {
        let cancel = self.wiring.system.cancel_token();
        loop {
            let envelope = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = self.mailbox.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            match envelope {
                Envelope::Init(handshake) => {
                    debug!(
                        downstream = handshake.downstream.len(),
                        has_error_handler = handshake.error_handler.is_some(),
                        upstream = ?handshake.upstream,
                        "initialized"
                    );
                    self.wiring.quorum = ShutdownQuorum::new(handshake.upstream);
                    self.wiring.handshake = handshake;
                }
                Envelope::Data(payload) => {
                    let flow = self.process(payload).await;
                    self.mailbox.complete_one();
                    if flow.is_break() {
                        break;
                    }
                }
                Envelope::Shutdown => {
                    let quorum = &mut self.wiring.quorum;
                    if quorum.record() {
                        debug!(received = quorum.received(), "shutdown quorum reached");
                        propagate_shutdown(&self.wiring.handshake).await;
                        break;
                    }
                    debug!(received = quorum.received(), "shutdown signal counted");
                }
                Envelope::AddUpstream(extra) => {
                    self.wiring.quorum.add_upstream(extra);
                    debug!(upstream = ?self.wiring.quorum.upstream(), "upstream added");
                }
                Envelope::Stop => break,
            }
        }
        debug!("worker terminated");
    }

    async fn process(&mut self, input: Payload) -> ControlFlow<()> {
        let wiring = &self.wiring;
        let timer = SpanTimer::start("ingest");
        let result = self.stage.ingest(&wiring.ctx, input.clone()).await;
        debug!(duration_ms = timer.finish(), ok = result.is_ok(), "ingest");

        for report in wiring.ctx.take_reports() {
            wiring.report_failure(report, &input).await;
        }

        match result {
            Ok(output) => match wiring.stereotype.check(&input, &output) {
                Ok(()) => {
                    fan_out(&wiring.handshake.downstream, output).await;
                    ControlFlow::Continue(())
                }
                Err(reason) => {
                    wiring.violate(reason).await;
                    ControlFlow::Break(())
                }
            },
            Err(err) => {
                wiring.report_failure(format!("{err:#}"), &input).await;
                ControlFlow::Continue(())
            }
        }
    }
}

impl Wiring {
    async fn report_failure(&self, message: String, input: &Payload) {
        self.system.emit(
            STAGE_FAILED,
            serde_json::json!({
                "stage_id": self.ctx.stage_id(),
                "stage_type": self.ctx.stage_type(),
                "instance_id": self.ctx.instance_id(),
                "message": message,
            }),
        );

        let Some(handler) = &self.handshake.error_handler else {
            debug!(message = %message, "failure dropped, no error handler");
            return;
        };
        let notice = FailureNotice::new(
            self.ctx.stage_id(),
            self.ctx.stage_type(),
            self.ctx.instance_id(),
            message,
        )
        .with_input(input.clone());
        if !handler.tell(Envelope::Data(Payload::from(notice))).await {
            warn!(handler = %handler, "error handler has terminated, failure dropped");
        }
    }

    async fn violate(&self, reason: &str) {
        let violation = ContractViolation {
            stage_id: self.ctx.stage_id(),
            stage_type: self.ctx.stage_type().to_string(),
            stereotype: self.stereotype,
            reason: reason.to_string(),
        };
        error!(
            stage_id = %violation.stage_id,
            stage_type = %violation.stage_type,
            stereotype = %violation.stereotype,
            reason = %violation.reason,
            "stage contract violation, terminating instance"
        );
        self.system.emit(
            STAGE_CONTRACT_VIOLATION,
            serde_json::to_value(&violation).unwrap_or_default(),
        );
        self.system.record_violation(violation);

        if self.quorum.propagates() {
            propagate_shutdown(&self.handshake).await;
        }
    }
}

/// Delivers every non-null item to every downstream instance.
async fn fan_out(downstream: &[StageRef], output: StageOutput) {
    for item in output.into_items() {
        for target in downstream {
            if !target.tell(Envelope::Data(item.clone())).await {
                warn!(target = %target, "downstream has terminated, message dropped");
            }
        }
    }
}

/// Sends one shutdown signal to each downstream instance and the error handler.
pub(crate) async fn propagate_shutdown(handshake: &Handshake) {
    for target in handshake.downstream.iter().chain(handshake.error_handler.iter()) {
        if !target.tell(Envelope::Shutdown).await {
            debug!(target = %target, "shutdown target already terminated");
        }
    }
}
