use std::time::Duration;

use herd_core::{
    AuthFlow, AuthStep, Check, Credentials, DriverOptions, LoadDriver, RequestContext, Stage,
    StepResponse, Transition, TransportFailure, WorkloadResult,
};

/// Canned authentication backend. Register and login always succeed; the
/// refresh endpoint insists on a bearer token; logout answers 401 with the
/// revoked marker because the flow still presents the login-issued refresh
/// token after refresh rotated it.
fn fake_auth_server(step: AuthStep, ctx: &RequestContext, body: &str) -> StepResponse {
    match step {
        AuthStep::Register => StepResponse::new(201, "{}"),
        AuthStep::Login => StepResponse::new(
            200,
            r#"{"accessToken": "access-token-1", "refreshToken": "refresh-token-1"}"#,
        ),
        AuthStep::Refresh => {
            if ctx.bearer().is_some() {
                StepResponse::new(200, "{}")
            } else {
                StepResponse::new(403, "missing bearer")
            }
        }
        AuthStep::Logout => {
            if body.contains("refresh-token-1") {
                StepResponse::new(401, r#"{"message": "Token was revoked"}"#)
            } else {
                StepResponse::new(400, "unknown token")
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn multi_step_auth_workflow_runs_inside_the_driver() {
    let mut options = DriverOptions::new(vec![Stage::new(Duration::from_millis(120), 3)]);
    options.tick = Duration::from_millis(10);
    options.think_time = Duration::from_millis(1);

    let workload = |call: herd_core::WorkloadCall| async move {
        let mut flow = AuthFlow::new(Credentials::dummy(call.vu_id, call.iteration));
        let mut last = StepResponse::new(0, "");

        while let Some(step) = flow.next_step() {
            let ctx = flow.request_context(step);
            let body = flow.request_body(step);
            let response = fake_auth_server(step, &ctx, &body);

            let transition = flow.apply(step, &response);
            last = response;

            if let Transition::Aborted(reason) = transition {
                return Err(TransportFailure::new(
                    herd_core::TransportFailureKind::Protocol,
                    reason.to_string(),
                ));
            }
        }

        Ok(WorkloadResult {
            status: Some(last.status),
            body: last.body,
        })
    };

    let checks = vec![Check::new("logout acknowledged", |r: &WorkloadResult| {
        matches!(r.status, Some(200..=299) | Some(401))
    })];

    let driver = LoadDriver::new(options, workload, checks)
        .unwrap_or_else(|e| panic!("driver build failed: {e}"));

    let summary = driver
        .run()
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    // Every iteration walked register -> login -> refresh -> logout to the
    // already-revoked terminal outcome without aborting.
    assert!(summary.iterations_total > 0);
    assert_eq!(summary.success_total, summary.iterations_total);
    assert_eq!(summary.transport_errors_total, 0);
    assert_eq!(summary.checks_by_name.len(), 1);
    assert_eq!(summary.checks_by_name[0].failed, 0);
}
