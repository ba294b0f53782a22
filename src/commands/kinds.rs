use anyhow::Result;
use colored::Colorize;
use declarative::{Intent, ResourceKind};
use serde::Serialize;

use crate::Context;
use crate::commands::print_json;
use crate::ui;

#[derive(Serialize)]
struct KindInfo {
    kind: ResourceKind,
    summary: &'static str,
    chain: Vec<String>,
    /// Steps only created when the named property is set
    optional: Vec<(String, &'static str)>,
    outputs: Vec<&'static str>,
    name_length: (usize, usize),
    globally_unique: bool,
    sources: Vec<Intent>,
    sinks: Vec<Intent>,
}

impl KindInfo {
    fn of(kind: ResourceKind) -> Self {
        let descriptor = kind.descriptor();
        Self {
            kind,
            summary: descriptor.summary,
            chain: descriptor
                .chain
                .iter()
                .map(|link| link.sub_resource.to_string())
                .collect(),
            optional: descriptor
                .chain
                .iter()
                .filter_map(|link| link.enabled_by.map(|p| (link.sub_resource.to_string(), p)))
                .collect(),
            outputs: descriptor.outputs(),
            name_length: (descriptor.naming.min_len, descriptor.naming.max_len),
            globally_unique: descriptor.naming.globally_unique,
            sources: descriptor.capabilities.sources.to_vec(),
            sinks: descriptor.capabilities.sinks.to_vec(),
        }
    }
}

pub fn run(ctx: &Context) -> Result<()> {
    let kinds: Vec<KindInfo> = ResourceKind::ALL.into_iter().map(KindInfo::of).collect();
    if ctx.json {
        return print_json(&kinds);
    }

    ui::header("Supported Resource Kinds");
    for info in &kinds {
        println!();
        println!("  {} {}", info.kind.to_string().bold(), info.summary.dimmed());
        ui::kv("  chain", &info.chain.join(" → "));
        for (step, property) in &info.optional {
            ui::dim(&format!("  {step} only when '{property}' is set"));
        }
        ui::kv("  outputs", &info.outputs.join(", "));
        let (min, max) = info.name_length;
        let unique = if info.globally_unique { ", globally unique" } else { "" };
        ui::kv("  names", &format!("{min}-{max} characters{unique}"));
        if ctx.verbose > 0 {
            ui::kv("  sources", &intent_list(&info.sources));
            ui::kv("  sinks", &intent_list(&info.sinks));
        }
    }
    Ok(())
}

fn intent_list(intents: &[Intent]) -> String {
    intents
        .iter()
        .copied()
        .map(Intent::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_info_lists_optional_container() {
        let info = KindInfo::of(ResourceKind::Storage);
        assert_eq!(info.chain, vec!["storageAccount", "blobContainer"]);
        assert_eq!(info.optional, vec![("blobContainer".to_string(), "containerName")]);
        assert_eq!(info.name_length, (3, 24));
        assert!(info.globally_unique);
    }

    #[test]
    fn test_intent_list() {
        assert_eq!(intent_list(&[Intent::Notify, Intent::Read]), "notify, read");
        assert_eq!(intent_list(&[]), "");
    }

    #[test]
    fn test_every_kind_serializes() {
        let kinds: Vec<KindInfo> = ResourceKind::ALL.into_iter().map(KindInfo::of).collect();
        let json = serde_json::to_value(&kinds).unwrap();
        assert_eq!(json.as_array().unwrap().len(), ResourceKind::ALL.len());
        assert_eq!(json[0]["kind"], "azure.storage");
    }
}
