//! Inspect command - print the structure of a loaded module.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use quill_vm_core::{NativeBinding, RuntimeAspect, RuntimeClass, TypeRef, Vault};

use crate::config::LoadedConfig;

#[derive(Args)]
pub struct InspectCommand {
    /// Module file to inspect
    pub module: PathBuf,

    /// Additional dependency search directory
    #[arg(long = "search-path", short = 'L', value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// Also list classes linked from dependencies and the core module
    #[arg(long)]
    pub all: bool,
}

impl InspectCommand {
    pub fn run(&self, config: &LoadedConfig) -> Result<()> {
        let (mut vault, id) = super::open_module(config, &self.module, &self.search_paths)?;

        if let Some(module) = vault.module(id) {
            println!("{}@{}", module.name, module.version);
            for dep in module.dependencies() {
                println!("  depends on {}@{}", dep.name, dep.version);
            }
            if let Some(boot) = module.bootstrapper() {
                println!("  bootstrapper {}", vault.class_name(boot));
            }
            println!();

            for class in module.class_table() {
                if !self.all && !module.owns(*class) {
                    continue;
                }
                if let Some(runtime) = vault.get_class(*class) {
                    print_class(&vault, runtime);
                }
            }

            if !module.aspects().is_empty() {
                println!("unattached aspects:");
                for aspect in module.aspects() {
                    println!("  {}", format_aspect(aspect));
                }
            }
        }

        vault.dispose()?;
        Ok(())
    }
}

fn print_class(vault: &Vault, class: &RuntimeClass) {
    let parent = class
        .parent
        .map(|p| format!(" : {}", vault.class_name(p)))
        .unwrap_or_default();
    println!("class {}{parent}", class.full_name);
    for aspect in &class.aspects {
        println!("  {}", format_aspect(aspect));
    }
    for field in &class.fields {
        let kind = if field.is_static() { "static " } else { "" };
        println!(
            "  {kind}field {}: {}",
            field.name.name(),
            type_name(vault, &field.ty)
        );
        for aspect in &field.aspects {
            println!("    {}", format_aspect(aspect));
        }
    }
    for method in &class.methods {
        let kind = if method.is_static() { "static " } else { "" };
        let native = match &method.native {
            Some(NativeBinding::Builtin { key, .. }) => format!(" = builtin {key}"),
            Some(NativeBinding::Import(entity)) => {
                format!(" = {}!{}", entity.library, entity.symbol)
            }
            Some(NativeBinding::Unavailable { code, .. }) => format!(" = unavailable [{code}]"),
            None => String::new(),
        };
        println!(
            "  {kind}method {} -> {}{native}",
            method.signature,
            type_name(vault, &method.return_type)
        );
        for aspect in &method.aspects {
            println!("    {}", format_aspect(aspect));
        }
    }
    println!();
}

fn type_name(vault: &Vault, ty: &TypeRef) -> String {
    match ty {
        TypeRef::Class(class) => vault.class_name(*class),
        TypeRef::Generic(param) => param.name.to_string(),
    }
}

fn format_aspect(aspect: &RuntimeAspect) -> String {
    let args: Vec<String> = aspect.values().map(|v| format!("{v:?}")).collect();
    format!("@{}({})", aspect.name, args.join(", "))
}
