//! Translation context: the discovery loop.
//!
//! Starting from an entry address, instructions are decoded in linear
//! runs, translated one at a time and spliced into a result function.
//! After each run the outstanding placeholders are resolved, which
//! links jumps to their targets and queues targets that still need
//! decoding. The loop ends when the worklist is empty.

use std::sync::Arc;

use lift_core::dump::function_to_string;
use lift_core::{
    verify_function, AddrSpace, FuncId, Function, GlobalId, Intrinsic,
    IrBuilder, Module, TargetInfo, Type, Value,
};

use crate::config::TranslationConfig;
use crate::intrinsics::resolve_intrinsics;
use crate::result_fn::{IntrinsicSite, ResultFunction};
use crate::translate::translate_insn;
use crate::worklist::{VisitState, Worklist};
use crate::{DecodeError, Isa, LiftError, MachineInsn};

/// Summary of one lifted routine.
#[derive(Debug, Clone)]
pub struct LiftedFunction {
    pub id: FuncId,
    pub name: String,
    /// Addresses with a translated instruction, ascending.
    pub implemented: Vec<u64>,
    /// Addresses that failed to decode, in discovery order.
    pub invalid: Vec<u64>,
    /// Placeholders left in the function.
    pub unresolved: Vec<IntrinsicSite>,
    /// Constant targets of calls, for lifting separately.
    pub call_targets: Vec<u64>,
}

/// Code bytes and the address of their first byte.
struct CodeRange<'c> {
    base: u64,
    bytes: &'c [u8],
}

impl CodeRange<'_> {
    fn slice_at(&self, address: u64) -> Result<&[u8], DecodeError> {
        address
            .checked_sub(self.base)
            .and_then(|off| usize::try_from(off).ok())
            .filter(|&off| off < self.bytes.len())
            .map(|off| &self.bytes[off..])
            .ok_or(DecodeError::OutOfRange(address))
    }
}

/// Per-routine discovery state.
struct Discovery {
    result: ResultFunction,
    worklist: Worklist,
    flags: Value,
    invalid: Vec<u64>,
}

/// Owns the ISA, the configuration and the module that lifted
/// routines are added to.
pub struct TranslationContext<I: Isa> {
    isa: I,
    config: TranslationConfig,
    target: Arc<TargetInfo>,
    module: Module,
    config_global: GlobalId,
}

impl<I: Isa> TranslationContext<I> {
    pub fn new(isa: I, module_name: &str) -> Self {
        let config = isa.config();
        let target = isa.target_info();
        let (module, config_global) = Self::fresh_module(&isa, module_name);
        Self {
            isa,
            config,
            target,
            module,
            config_global,
        }
    }

    fn fresh_module(isa: &I, name: &str) -> (Module, GlobalId) {
        let mut module = Module::new(name);
        let global = module.add_global(
            &format!("{}_config", isa.name()),
            isa.config().to_const(),
            true,
        );
        (module, global)
    }

    pub fn isa(&self) -> &I {
        &self.isa
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn target_info(&self) -> &Arc<TargetInfo> {
        &self.target
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Hand over the module built so far and start a fresh one.
    pub fn take(&mut self) -> Module {
        let name = self.module.name().to_string();
        let (module, global) = Self::fresh_module(&self.isa, &name);
        self.config_global = global;
        std::mem::replace(&mut self.module, module)
    }

    /// Lift the routine starting at `base`, the address of `code[0]`.
    pub fn create_function(
        &mut self,
        name: &str,
        base: u64,
        code: &[u8],
    ) -> Result<LiftedFunction, LiftError> {
        self.create_function_at(name, base, code, base)
    }

    /// Lift the routine entered at `entry` inside `code` loaded at
    /// `base`.
    pub fn create_function_at(
        &mut self,
        name: &str,
        base: u64,
        code: &[u8],
        entry: u64,
    ) -> Result<LiftedFunction, LiftError> {
        log::debug!("{name}: lifting from {entry:#x}");
        let code = CodeRange { base, bytes: code };

        let mut result = ResultFunction::new(name);
        let (fragment, alloca) = self.entry_fragment(entry);
        let map = result.eat_entry(&fragment);
        let flags_inst = map
            .inst(alloca)
            .expect("entry fragment splice lost the flags slot");
        let mut d = Discovery {
            result,
            worklist: Worklist::new(),
            flags: Value::Capture {
                inst: flags_inst,
                ty: Type::Ptr(AddrSpace::Emulator),
            },
            invalid: Vec::new(),
        };
        d.worklist.push(entry);

        // Instruction details of a routine that fails to lift are
        // discarded with it.
        let globals = self.module.globals().len();
        while let Some(start) = d.worklist.pop() {
            if let Err(err) = self.run(&mut d, &code, start) {
                self.module.truncate_globals(globals);
                return Err(err);
            }
            resolve_intrinsics(&mut d.result, &self.config, &mut d.worklist);
        }

        let unresolved = d.result.outstanding();
        let implemented: Vec<u64> = d.result.implemented_addresses().collect();
        let call_targets: Vec<u64> =
            d.result.call_targets().iter().copied().collect();
        let func = d.result.finalize();
        if let Err(err) = verify_function(&func) {
            self.module.truncate_globals(globals);
            return Err(err.into());
        }

        log::debug!(
            "{name}: {} instructions, {} invalid, {} unresolved",
            implemented.len(),
            d.invalid.len(),
            unresolved.len()
        );
        let id = self.module.add_function(func);
        Ok(LiftedFunction {
            id,
            name: name.to_string(),
            implemented,
            invalid: d.invalid,
            unresolved,
            call_targets,
        })
    }

    /// Synthetic entry: allocate the flags area and jump to `entry`.
    /// Returns the fragment and the id of the flags allocation.
    fn entry_fragment(&self, entry: u64) -> (Function, lift_core::InstId) {
        let mut func =
            Function::new("entry", vec![Type::Ptr(AddrSpace::Emulator)]);
        func.add_block("entry");
        let mut ir = IrBuilder::new(&mut func);
        let flags = ir.gen_alloca(self.isa.flags_size());
        let dest = Value::const_int(self.config.native_type(), entry);
        ir.gen_intrinsic(
            Intrinsic::Jump,
            Type::Void,
            vec![Value::Global(self.config_global), Value::Param(0), dest],
        );
        ir.gen_unreachable();
        let alloca = flags.as_inst().expect("alloca yields an instruction");
        (func, alloca)
    }

    /// Decode and translate sequentially from `start` until an
    /// unconditional transfer, a decode failure or an address that is
    /// already implemented.
    fn run(
        &mut self,
        d: &mut Discovery,
        code: &CodeRange<'_>,
        start: u64,
    ) -> Result<(), LiftError> {
        log::trace!("{}: linear run at {start:#x}", d.result.func().name());
        let mut address = start;
        loop {
            if d.result.get_implemented_block(address).is_some() {
                d.worklist.mark(address, VisitState::Implemented);
                return Ok(());
            }

            let decoded = code
                .slice_at(address)
                .and_then(|bytes| self.isa.decode(bytes, address));
            let insn = match decoded {
                Ok(insn) => insn,
                Err(err) => {
                    log::warn!("{}: {err}", d.result.func().name());
                    let marker = unreachable_fragment(address);
                    d.result.eat(&marker, address);
                    d.worklist.mark(address, VisitState::Invalid);
                    d.invalid.push(address);
                    self.debug_verify(&d.result);
                    return Ok(());
                }
            };

            let mut fragment = translate_insn(
                &self.isa,
                &mut self.module,
                &self.config,
                self.config_global,
                d.flags,
                &insn,
            )?;
            lift_opt::simplify_fragment(&mut fragment);
            d.result.eat(&fragment, address);
            d.worklist.mark(address, VisitState::Implemented);
            self.debug_verify(&d.result);

            if insn.ends_linear_run() {
                return Ok(());
            }
            address = insn.next_address();
        }
    }

    /// In debug builds, abort on a malformed result function.
    fn debug_verify(&self, result: &ResultFunction) {
        if !cfg!(debug_assertions) {
            return;
        }
        if let Err(err) = verify_function(result.func()) {
            log::error!(
                "{err}\n{}",
                function_to_string(result.func(), Some(&self.module))
            );
            panic!("lifted function failed verification: {err}");
        }
    }
}

/// Marker for an address that failed to decode.
fn unreachable_fragment(address: u64) -> Function {
    let mut func = Function::new(
        format!("invalid_{address:x}"),
        vec![Type::Ptr(AddrSpace::Emulator)],
    );
    func.add_block("entry");
    IrBuilder::new(&mut func).gen_unreachable();
    func
}
