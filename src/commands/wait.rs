//! `settle wait`: poll a describe command until the resource converges.

use anyhow::{Context as _, Result, bail};
use convergence::{
    CancelToken, Converged, Describe, FailureKind, Observation, OperationDescriptor,
    RateLimitConfig, RateLimiter, RetryConfig, RetryError, WaitContext, WaitError, WorkflowError,
    submit_and_wait, wait,
};
use indicatif::ProgressBar;
use std::fmt::Display;
use std::process::ExitCode;

use crate::Context;
use crate::cli::WaitArgs;
use crate::config::Config;
use crate::defaults::WRITE_RETRY_TIMEOUT;
use crate::policy::{self, PolicySettings, sorted_tokens};
use crate::progress;
use crate::resource::{
    ConnectResourceStatus, EsInstanceStatus, FamilyKind, InstanceState, MigrateJobStatus,
    RawState, StateFamily,
};
use crate::runner::{CallBudget, ShellDescribe, ShellSubmit};
use crate::ui;

/// Exit status for each way a wait can fail
pub fn exit_status(kind: FailureKind) -> u8 {
    match kind {
        FailureKind::Fatal => 1,
        FailureKind::UnexpectedState => 2,
        FailureKind::Timeout => 3,
        FailureKind::Cancelled => 130,
    }
}

pub fn run(ctx: &Context, config: &Config, args: &WaitArgs, cancel: &CancelToken) -> Result<ExitCode> {
    execute(ctx, config, args, cancel).map(ExitCode::from)
}

fn execute(ctx: &Context, config: &Config, args: &WaitArgs, cancel: &CancelToken) -> Result<u8> {
    let (family, settings) = resolve(config, args)?;
    log::debug!("waiting with family {}", family.name());

    match family {
        FamilyKind::CvmInstance => run_family::<InstanceState>(ctx, config, args, &settings, cancel),
        FamilyKind::EsInstance => {
            run_family::<EsInstanceStatus>(ctx, config, args, &settings, cancel)
        }
        FamilyKind::CkafkaConnect => {
            run_family::<ConnectResourceStatus>(ctx, config, args, &settings, cancel)
        }
        FamilyKind::DtsMigrateJob => {
            run_family::<MigrateJobStatus>(ctx, config, args, &settings, cancel)
        }
        FamilyKind::Raw => run_family::<RawState>(ctx, config, args, &settings, cancel),
    }
}

/// Pick the family and merge flags over the profile, if one is named.
fn resolve(config: &Config, args: &WaitArgs) -> Result<(FamilyKind, PolicySettings)> {
    let flags = args.settings();
    let Some(name) = &args.profile else {
        let family = args
            .family
            .context("--family is required unless --profile names one")?;
        return Ok((family, flags));
    };

    let profile = config.profile(name)?;
    let family = match (args.family, profile.family) {
        (Some(flag), Some(configured)) if flag != configured => bail!(
            "--family {} does not match profile '{name}' (family {})",
            flag.name(),
            configured.name()
        ),
        (Some(family), _) | (None, Some(family)) => family,
        (None, None) => bail!("Profile '{name}' has no family"),
    };

    let settings = profile
        .settings()
        .with_context(|| format!("Invalid profile '{name}'"))?;
    Ok((family, flags.or(settings)))
}

fn rate_limiter(config: &Config, args: &WaitArgs) -> Result<Option<RateLimiter>> {
    let limit = match (args.rate, args.burst) {
        (Some(requests_per_second), Some(burst)) => Some(RateLimitConfig {
            requests_per_second,
            burst,
        }),
        _ => config.rate_limit,
    };
    limit
        .map(RateLimiter::new)
        .transpose()
        .context("Invalid rate limit")
}

fn run_family<F: StateFamily>(
    ctx: &Context,
    config: &Config,
    args: &WaitArgs,
    settings: &PolicySettings,
    cancel: &CancelToken,
) -> Result<u8> {
    let policy = policy::build::<F>(settings)?;
    let classifier = config
        .classifier()
        .with_codes(args.retryable_codes.iter().cloned());
    let limiter = rate_limiter(config, args)?;

    let mut wait_ctx = WaitContext::system(cancel);
    if let Some(limiter) = &limiter {
        wait_ctx = wait_ctx.with_limiter(limiter);
    }

    log::info!(
        "{} policy: pending [{}] target [{}] timeout {:?} interval {:?}",
        F::NAME,
        sorted_tokens(policy.pending()).join(", "),
        sorted_tokens(policy.target()).join(", "),
        policy.timeout(),
        policy.poll_interval()
    );

    let bar = progress::spinner("Starting", ctx.quiet);
    let mut describer = Watched {
        inner: ShellDescribe::<F>::new(&args.describe_cmd, &args.not_found_token)
            .with_budget(CallBudget::new(policy.timeout(), cancel)),
        bar: &bar,
    };

    if let Some(submit_cmd) = &args.submit_cmd {
        let write_retry = RetryConfig::new(
            args.submit_timeout.unwrap_or(WRITE_RETRY_TIMEOUT),
            policy.poll_interval(),
        );
        let mut submitter = ShellSubmit::new(submit_cmd)
            .with_budget(CallBudget::new(write_retry.timeout, cancel));
        bar.set_message("Submitting");

        return Ok(
            match submit_and_wait(
                &mut submitter,
                &mut describer,
                &(),
                &write_retry,
                &policy,
                &classifier,
                &wait_ctx,
            ) {
                Ok(done) => report_converged(ctx, &bar, &done.descriptor, &done.converged),
                Err(WorkflowError::Submit(error)) => report_submit_failure(&bar, &error),
                Err(WorkflowError::Wait { descriptor, error }) => {
                    report_wait_failure(&bar, &descriptor, &error)
                }
            },
        );
    }

    let id = args
        .id
        .as_deref()
        .context("--id is required without --submit-cmd")?;
    let descriptor: OperationDescriptor = id
        .parse()
        .with_context(|| format!("Invalid resource id '{id}'"))?;

    bar.set_message(format!("{descriptor}: waiting"));
    Ok(
        match wait(&policy, &classifier, &wait_ctx, || {
            describer.describe(&descriptor)
        }) {
            Ok(converged) => report_converged(ctx, &bar, &descriptor, &converged),
            Err(error) => report_wait_failure(&bar, &descriptor, &error),
        },
    )
}

/// Describe wrapper that shows each observation on the spinner
struct Watched<'a, D> {
    inner: D,
    bar: &'a ProgressBar,
}

impl<D> Describe for Watched<'_, D>
where
    D: Describe,
    D::State: Display,
    D::Error: Display,
{
    type State = D::State;
    type Error = D::Error;

    fn describe(
        &mut self,
        descriptor: &OperationDescriptor,
    ) -> Result<Observation<D::State>, D::Error> {
        let result = self.inner.describe(descriptor);
        match &result {
            Ok(observed) => self.bar.set_message(format!("{descriptor}: {observed}")),
            Err(error) => self.bar.set_message(format!("{descriptor}: {error}")),
        }
        result
    }
}

fn report_converged<S: Display>(
    ctx: &Context,
    bar: &ProgressBar,
    descriptor: &OperationDescriptor,
    converged: &Converged<S>,
) -> u8 {
    let summary = match converged.state() {
        Some(state) => format!("{descriptor} reached {state}"),
        None => format!("{descriptor} is gone"),
    };

    if ctx.quiet {
        bar.finish_and_clear();
        return 0;
    }

    progress::finish_success(bar, &summary);
    ui::kv("attempts", &converged.attempts.to_string());
    ui::kv("elapsed", &ui::format_elapsed(converged.elapsed));
    0
}

fn report_wait_failure<S: Display, E: Display>(
    bar: &ProgressBar,
    descriptor: &OperationDescriptor,
    error: &WaitError<S, E>,
) -> u8 {
    progress::finish_error(bar, &format!("{descriptor}: {error}"));
    ui::ekv("outcome", error.kind().label());
    ui::ekv("elapsed", &ui::format_elapsed(error.elapsed()));
    exit_status(error.kind())
}

fn report_submit_failure<E: Display>(bar: &ProgressBar, error: &RetryError<E>) -> u8 {
    let detail = match error {
        RetryError::Fatal { error, .. } => error.to_string(),
        RetryError::Timeout {
            last_error: Some(error),
            ..
        }
        | RetryError::Cancelled {
            last_error: Some(error),
            ..
        } => format!("{error} (last error)"),
        RetryError::Timeout { .. } | RetryError::Cancelled { .. } => error.to_string(),
    };

    if error.kind() == FailureKind::Cancelled {
        progress::finish_warn(bar, &format!("Submit cancelled: {detail}"));
    } else {
        progress::finish_error(bar, &format!("Submit failed: {detail}"));
    }
    ui::ekv("attempts", &error.attempts().to_string());
    exit_status(error.kind())
}
