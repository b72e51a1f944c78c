//! `settle families`: list state families and their presets.

use anyhow::Result;
use colored::Colorize;

use crate::cli::FamiliesArgs;
use crate::resource::{FamilyInfo, FamilyKind};
use crate::ui;

pub fn run(args: &FamiliesArgs) -> Result<()> {
    let infos = collect(args.family);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    for info in &infos {
        print_family(info);
    }
    Ok(())
}

fn collect(family: Option<FamilyKind>) -> Vec<FamilyInfo> {
    match family {
        Some(kind) => vec![kind.info()],
        None => FamilyKind::all().into_iter().map(FamilyKind::info).collect(),
    }
}

fn print_family(info: &FamilyInfo) {
    ui::header(info.name);
    ui::kv("about", info.about);
    if info.tokens.is_empty() {
        ui::kv("states", "any token");
    } else {
        ui::kv("states", &info.tokens.join(", "));
    }

    if info.operations.is_empty() {
        ui::dim("no operation presets");
        return;
    }

    for op in &info.operations {
        println!(
            "  {:<7} {} → {}  {}",
            op.operation.to_string().cyan(),
            ui::token_list(&op.pending),
            if op.target.is_empty() {
                "(gone)".to_string()
            } else {
                ui::token_list(&op.target)
            },
            format!("not found: {}", op.not_found).dimmed()
        );
    }
}
