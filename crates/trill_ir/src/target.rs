//! Target triple resolution and machine-code emission (§4.8 `[FULL]`): the
//! host triple unless overridden on the command line, configured once per
//! compilation and reused by every `--emit=obj`/`--emit=asm` request
//! afterwards rather than re-probed per invocation.

use inkwell::module::Module;
use inkwell::targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple};
use inkwell::OptimizationLevel;
use target_lexicon::Triple;

use crate::InternalError;

/// A resolved target: the triple LLVM was asked for, and a configured
/// `TargetMachine` ready to emit object code or assembly text.
pub struct TargetConfig {
    pub triple: TargetTriple,
    pub machine: TargetMachine,
}

/// Resolves `override_triple` (or the host triple, if `None`) into a
/// `TargetConfig`. Initializing every backend `inkwell` knows about is
/// idempotent, so repeated calls are cheap after the first.
pub fn resolve_target(override_triple: Option<&str>, opt_level: OptimizationLevel) -> Result<TargetConfig, InternalError> {
    Target::initialize_all(&InitializationConfig::default());

    let triple_str = match override_triple {
        Some(t) => t.to_string(),
        None => TargetMachine::get_default_triple().as_str().to_string_lossy().into_owned(),
    };

    // Validated against `target-lexicon`'s grammar before the raw string is
    // handed to LLVM, so a malformed `--target` is reported as our own
    // `InternalError` rather than an opaque LLVM failure.
    triple_str.parse::<Triple>().map_err(|_| InternalError::UnsupportedTarget(triple_str.clone()))?;

    let triple = TargetTriple::create(&triple_str);
    let target = Target::from_triple(&triple).map_err(|_| InternalError::UnsupportedTarget(triple_str.clone()))?;
    let cpu = TargetMachine::get_host_cpu_name();
    let features = TargetMachine::get_host_cpu_features();
    let machine = target
        .create_target_machine(
            &triple,
            cpu.to_str().unwrap_or("generic"),
            features.to_str().unwrap_or(""),
            opt_level,
            RelocMode::PIC,
            CodeModel::Default,
        )
        .ok_or_else(|| InternalError::UnsupportedTarget(triple_str.clone()))?;

    Ok(TargetConfig { triple, machine })
}

/// Emits `module` as an object file or assembly text at `path`
/// (`--emit=obj`/`--emit=asm`, §6).
pub fn emit_to_file(config: &TargetConfig, module: &Module, path: &std::path::Path, file_type: FileType) -> Result<(), InternalError> {
    module.set_triple(&config.triple);
    config.machine.write_to_file(module, file_type, path).map_err(|e| InternalError::VerificationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_the_host_triple_succeeds() {
        let config = resolve_target(None, OptimizationLevel::None);
        assert!(config.is_ok());
    }

    #[test]
    fn an_unparseable_triple_is_rejected() {
        let config = resolve_target(Some("not a triple!!"), OptimizationLevel::None);
        assert!(matches!(config, Err(InternalError::UnsupportedTarget(_))));
    }
}
