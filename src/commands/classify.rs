//! `settle classify`: show how service error codes are treated.

use anyhow::Result;
use colored::Colorize;
use convergence::{Classification, Classify, ErrorClassifier, RemoteError};

use crate::Context;
use crate::cli::ClassifyArgs;
use crate::config::Config;
use crate::ui;

pub fn run(ctx: &Context, config: &Config, args: &ClassifyArgs) -> Result<()> {
    let classifier = config
        .classifier()
        .with_codes(args.retryable_codes.iter().cloned());

    if ctx.verbose > 0 {
        ui::header("Retryable codes");
        for code in classifier.retryable_codes() {
            ui::dim(code);
        }
        println!();
    }

    let width = args.codes.iter().map(String::len).max().unwrap_or(0);
    for (code, verdict) in classify_all(&classifier, &args.codes) {
        let label = match verdict {
            Classification::Retryable => "retryable".green(),
            Classification::Fatal => "fatal".red(),
        };
        println!("{code:<width$}  {label}");
    }
    Ok(())
}

fn classify_all<'a>(
    classifier: &ErrorClassifier,
    codes: &'a [String],
) -> Vec<(&'a str, Classification)> {
    codes
        .iter()
        .map(|code| {
            let error = RemoteError::service(code.as_str(), "");
            (code.as_str(), classifier.classify(&error))
        })
        .collect()
}
