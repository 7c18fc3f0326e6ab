//! Check command - load a module and verify it links.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use quill_vm_core::{ModuleId, NativeBinding, Vault};

use crate::config::LoadedConfig;

#[derive(Args)]
pub struct CheckCommand {
    /// Module file to check
    pub module: PathBuf,

    /// Additional dependency search directory
    #[arg(long = "search-path", short = 'L', value_name = "DIR")]
    pub search_paths: Vec<PathBuf>,

    /// The module is a library and has no entry point
    #[arg(long)]
    pub lib: bool,

    /// Only print errors
    #[arg(long, short)]
    pub quiet: bool,
}

impl CheckCommand {
    pub fn run(&self, config: &LoadedConfig) -> Result<()> {
        let (mut vault, id) = super::open_module(config, &self.module, &self.search_paths)?;

        if !self.lib {
            vault
                .get_entry_point(id)
                .context("Module has no entry point (pass --lib for libraries)")?;
        }

        let unlinked = unlinked_natives(&vault, id);
        for line in &unlinked {
            eprintln!("warning: {line}");
        }

        if !self.quiet {
            self.print_summary(&vault, id);
        }

        let report = vault.dispose()?;
        if !self.quiet {
            println!("Heap:         {report}");
        }

        if unlinked.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "{} extern method(s) could not be linked",
                unlinked.len()
            ))
        }
    }

    fn print_summary(&self, vault: &Vault, id: ModuleId) {
        let Some(module) = vault.module(id) else {
            return;
        };
        let classes = module.class_table().iter().filter(|c| module.owns(**c)).count();
        println!("Module:       {}@{}", module.name, module.version);
        println!("Classes:      {classes}");
        println!("Dependencies: {}", module.dependencies().len());
        println!("Aspects:      {}", module.aspects().len());
    }
}

/// Extern methods of `id` whose native binding failed
fn unlinked_natives(vault: &Vault, id: ModuleId) -> Vec<String> {
    let Some(module) = vault.module(id) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for class in module.class_table().iter().filter(|c| module.owns(**c)) {
        let Some(runtime) = vault.get_class(*class) else {
            continue;
        };
        for method in &runtime.methods {
            if let Some(NativeBinding::Unavailable { code, reason }) = &method.native {
                out.push(format!(
                    "{}.{}: [{code}] {reason}",
                    runtime.full_name, method.signature
                ));
            }
        }
    }
    out
}
