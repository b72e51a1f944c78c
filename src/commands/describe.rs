//! `settle describe`: one read through the retry loop.
//!
//! Retryable describe errors are retried until the read deadline; the
//! parsed state token is printed on stdout.

use anyhow::{Context as _, Result};
use convergence::{
    CancelToken, Describe, ErrorClassifier, Observation, OperationDescriptor, Outcome,
    RemoteError, RetryConfig, RetryError, WaitContext, retry,
};
use std::process::ExitCode;

use crate::Context;
use crate::cli::DescribeArgs;
use crate::commands::wait::exit_status;
use crate::config::Config;
use crate::defaults::{DEFAULT_POLL_INTERVAL, READ_RETRY_TIMEOUT};
use crate::resource::{
    ConnectResourceStatus, EsInstanceStatus, FamilyKind, InstanceState, MigrateJobStatus,
    RawState, StateFamily,
};
use crate::runner::{CallBudget, ShellDescribe};
use crate::ui;

pub fn run(
    ctx: &Context,
    config: &Config,
    args: &DescribeArgs,
    cancel: &CancelToken,
) -> Result<ExitCode> {
    let descriptor: OperationDescriptor = args
        .id
        .parse()
        .with_context(|| format!("Invalid resource id '{}'", args.id))?;
    let classifier = config
        .classifier()
        .with_codes(args.retryable_codes.iter().cloned());
    let retry_config = RetryConfig::new(
        args.timeout.unwrap_or(READ_RETRY_TIMEOUT),
        DEFAULT_POLL_INTERVAL,
    );
    let wait_ctx = WaitContext::system(cancel);

    let read = match args.family {
        FamilyKind::CvmInstance => {
            read::<InstanceState>(args, &descriptor, &classifier, &retry_config, &wait_ctx)
        }
        FamilyKind::EsInstance => {
            read::<EsInstanceStatus>(args, &descriptor, &classifier, &retry_config, &wait_ctx)
        }
        FamilyKind::CkafkaConnect => {
            read::<ConnectResourceStatus>(args, &descriptor, &classifier, &retry_config, &wait_ctx)
        }
        FamilyKind::DtsMigrateJob => {
            read::<MigrateJobStatus>(args, &descriptor, &classifier, &retry_config, &wait_ctx)
        }
        FamilyKind::Raw => {
            read::<RawState>(args, &descriptor, &classifier, &retry_config, &wait_ctx)
        }
    };

    match read {
        Ok(Read {
            token,
            attempts,
            elapsed,
        }) => {
            println!("{token}");
            if ctx.verbose > 0 {
                ui::ekv("attempts", &attempts.to_string());
                ui::ekv("elapsed", &ui::format_elapsed(elapsed));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            ui::error(&format!("{descriptor}: describe {error}"));
            if let RetryError::Timeout {
                last_error: Some(last),
                ..
            } = &error
            {
                ui::ekv("last error", &last.to_string());
            }
            Ok(ExitCode::from(exit_status(error.kind())))
        }
    }
}

/// A parsed describe answer, rendered back to its token
#[derive(Debug)]
struct Read {
    token: String,
    attempts: u32,
    elapsed: std::time::Duration,
}

fn read<F: StateFamily>(
    args: &DescribeArgs,
    descriptor: &OperationDescriptor,
    classifier: &ErrorClassifier,
    retry_config: &RetryConfig,
    wait_ctx: &WaitContext<'_>,
) -> Result<Read, RetryError<RemoteError>> {
    let mut describer = ShellDescribe::<F>::new(&args.describe_cmd, &args.not_found_token)
        .with_budget(CallBudget::new(retry_config.timeout, wait_ctx.cancel));
    let attempted = retry(retry_config, wait_ctx, || {
        Outcome::from_result(describer.describe(descriptor), classifier)
    })?;

    let token = match attempted.value {
        Observation::Found(state) => state.to_string(),
        Observation::NotFound => args.not_found_token.clone(),
    };
    Ok(Read {
        token,
        attempts: attempted.attempts,
        elapsed: attempted.elapsed,
    })
}
