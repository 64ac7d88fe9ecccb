//! Archive inspection tool.
//!
//! ```text
//! abcinfo <file.abc> [--json] [--verbose]
//! ```
//!
//! Prints archive metadata, the time sampling table and the object/property
//! tree; `--json` emits the same as JSON.

use std::process::ExitCode;

use serde_json::{json, Value};

use abcio::abc::{IArchive, ICompoundProperty, IObject, IProperty};
use abcio::core::TimeSamplingKind;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let json_mode = args.iter().any(|a| a == "--json");
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    let path = match args.iter().find(|a| !a.starts_with('-')) {
        Some(p) => p.clone(),
        None => {
            eprintln!("usage: abcinfo <file.abc> [--json] [--verbose]");
            return ExitCode::FAILURE;
        }
    };

    let archive = match IArchive::open(&path) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("abcinfo: {e}");
            return ExitCode::FAILURE;
        }
    };

    if json_mode {
        let doc = json!({
            "file": archive.name(),
            "container": archive.kind().name(),
            "application": archive.app_name(),
            "written": archive.date_written(),
            "description": archive.user_description(),
            "timeSamplings": samplings_json(&archive),
            "timeRange": archive.time_range().map(|(a, b)| json!([a, b])),
            "tree": object_json(&archive.top(), verbose),
        });
        println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
    } else {
        println!("{} ({})", archive.name(), archive.kind().name());
        if let Some(app) = archive.app_name() {
            println!("  written by: {app}");
        }
        if let Some(date) = archive.date_written() {
            println!("  written on: {date}");
        }
        if let Some((start, end)) = archive.time_range() {
            println!("  time range: {start:.4} .. {end:.4}");
        }
        println!("  time samplings: {}", archive.num_time_samplings());
        print_object(&archive.top(), 0, verbose);
    }

    ExitCode::SUCCESS
}

fn samplings_json(archive: &IArchive) -> Vec<Value> {
    (0..archive.num_time_samplings())
        .filter_map(|i| archive.time_sampling(i))
        .map(|ts| match ts.kind() {
            TimeSamplingKind::Uniform {
                time_per_cycle,
                start_time,
            } => json!({"kind": "uniform", "timePerCycle": time_per_cycle, "startTime": start_time}),
            TimeSamplingKind::Cyclic {
                time_per_cycle,
                times,
            } => json!({"kind": "cyclic", "timePerCycle": time_per_cycle, "times": times}),
            TimeSamplingKind::Acyclic { times } => json!({"kind": "acyclic", "times": times}),
        })
        .collect()
}

fn object_json(object: &IObject, verbose: bool) -> Value {
    let properties = object
        .properties()
        .ok()
        .map(|props| compound_json(&props, verbose));
    let children: Vec<Value> = object
        .children()
        .map(|c| object_json(&c, verbose))
        .collect();
    json!({
        "name": object.name(),
        "schema": object.meta_data().schema(),
        "properties": properties,
        "children": children,
    })
}

fn compound_json(compound: &ICompoundProperty, verbose: bool) -> Vec<Value> {
    (0..compound.num_properties())
        .filter_map(|i| compound.property(i).ok())
        .map(|prop| match prop {
            IProperty::Compound(sub) => json!({
                "name": sub.header().name,
                "type": "compound",
                "children": compound_json(&sub, verbose),
            }),
            IProperty::Scalar(p) => json!({
                "name": p.header().name,
                "type": "scalar",
                "dataType": p.header().data_type.to_string(),
                "samples": p.num_samples(),
                "constant": p.is_constant(),
            }),
            IProperty::Array(p) => {
                let mut doc = json!({
                    "name": p.header().name,
                    "type": "array",
                    "dataType": p.header().data_type.to_string(),
                    "samples": p.num_samples(),
                    "constant": p.is_constant(),
                });
                if verbose {
                    if let Ok(len) = p.sample_len(0usize) {
                        doc["firstSampleLen"] = json!(len);
                    }
                }
                doc
            }
        })
        .collect()
}

fn print_object(object: &IObject, depth: usize, verbose: bool) {
    let indent = "  ".repeat(depth + 1);
    let schema = object
        .meta_data()
        .schema()
        .map(|s| format!(" [{s}]"))
        .unwrap_or_default();
    println!("{indent}{}{schema}", display_name(object));

    if verbose {
        if let Ok(props) = object.properties() {
            print_compound(&props, depth + 1);
        }
    }
    for child in object.children() {
        print_object(&child, depth + 1, verbose);
    }
}

fn display_name(object: &IObject) -> &str {
    if object.is_root() {
        "/"
    } else {
        object.name()
    }
}

fn print_compound(compound: &ICompoundProperty, depth: usize) {
    let indent = "  ".repeat(depth + 1);
    for i in 0..compound.num_properties() {
        let Ok(prop) = compound.property(i) else {
            continue;
        };
        match prop {
            IProperty::Compound(sub) => {
                println!("{indent}.{} (compound)", sub.header().name);
                print_compound(&sub, depth + 1);
            }
            IProperty::Scalar(p) => println!(
                "{indent}.{} scalar {} x{}{}",
                p.header().name,
                p.header().data_type,
                p.num_samples(),
                if p.is_constant() { " const" } else { "" },
            ),
            IProperty::Array(p) => println!(
                "{indent}.{} array {} x{}{}",
                p.header().name,
                p.header().data_type,
                p.num_samples(),
                if p.is_constant() { " const" } else { "" },
            ),
        }
    }
}
