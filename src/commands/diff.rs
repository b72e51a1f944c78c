//! `settle diff`: sparse update payload between two JSON documents.

use anyhow::{Context as _, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::cli::DiffArgs;

/// What to print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Payload,
    Operations,
    Merged,
}

pub fn run(args: &DiffArgs) -> Result<()> {
    let previous = read_json(&args.previous)?;
    let desired = read_json(&args.desired)?;

    let output = if args.ops {
        Output::Operations
    } else if args.apply {
        Output::Merged
    } else {
        Output::Payload
    };

    let rendered = render(&previous, &desired, output)?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn render(previous: &Value, desired: &Value, output: Output) -> Result<Value> {
    let operations = patchdiff::diff(previous, desired);
    if operations.is_empty() {
        log::info!("documents are identical");
    }
    for op in &operations {
        log::trace!("{op}");
    }

    if output == Output::Operations {
        return Ok(serde_json::to_value(&operations)?);
    }

    let payload = patchdiff::fold(&operations)
        .context("Cannot build an update payload (both documents must be JSON objects)")?;

    match output {
        Output::Merged => {
            let mut merged = previous.clone();
            payload.merge_into(&mut merged);
            Ok(merged)
        }
        Output::Payload | Output::Operations => payload
            .to_value()
            .context("Cannot render the update payload as a merge patch"),
    }
}
