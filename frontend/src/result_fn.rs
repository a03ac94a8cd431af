//! Result function accumulator.
//!
//! Owns the routine under construction and its address bookkeeping:
//! which block implements each decoded address, which placeholder
//! blocks stand in for addresses not translated yet, and which
//! placeholder calls are still waiting to be resolved.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use lift_core::{
    AddrSpace, BlockId, Function, InstId, InstKind, Intrinsic, SpliceMap,
    Type, Value,
};

/// An outstanding placeholder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrinsicSite {
    pub inst: InstId,
    pub intrinsic: Intrinsic,
    /// Address of the instruction whose semantics emitted it.
    pub address: u64,
}

/// Replacement for one placeholder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substitution {
    /// Cut the block at the call and branch to the given block.
    Branch(BlockId),
    /// Cut the block at the call and return.
    Return,
    /// Rewire all uses of the call's result to the value, then erase
    /// the call.
    Value(Value),
    /// Erase the call.
    Erase,
}

/// Bookkeeping for an outstanding placeholder: the call, the address
/// that emitted it and the fragment it was spliced with.
#[derive(Debug, Clone, Copy)]
struct Pending {
    intrinsic: Intrinsic,
    address: u64,
    fragment: usize,
}

pub struct ResultFunction {
    func: Function,
    entry: Option<BlockId>,
    implemented: BTreeMap<u64, BlockId>,
    destinations: BTreeMap<u64, BlockId>,
    /// Blocks branching to each placeholder block.
    incoming: HashMap<BlockId, Vec<BlockId>>,
    intrinsics: BTreeMap<InstId, Pending>,
    /// Blocks of every spliced fragment. A placeholder's result is
    /// only used inside its own fragment.
    fragments: Vec<Vec<BlockId>>,
    call_targets: BTreeSet<u64>,
}

impl ResultFunction {
    /// Empty routine taking the register file pointer.
    pub fn new(name: &str) -> Self {
        Self {
            func: Function::new(name, vec![Type::Ptr(AddrSpace::Emulator)]),
            entry: None,
            implemented: BTreeMap::new(),
            destinations: BTreeMap::new(),
            incoming: HashMap::new(),
            intrinsics: BTreeMap::new(),
            fragments: Vec::new(),
            call_targets: BTreeSet::new(),
        }
    }

    pub fn func(&self) -> &Function {
        &self.func
    }

    pub fn func_mut(&mut self) -> &mut Function {
        &mut self.func
    }

    /// Synthetic entry block, once spliced.
    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    // -- Splicing --

    /// Splice the synthetic entry fragment. It must come first so
    /// that it becomes the function's entry block.
    pub fn eat_entry(&mut self, fragment: &Function) -> SpliceMap {
        assert!(self.entry.is_none(), "entry spliced twice");
        assert_eq!(self.func.num_blocks(), 0, "entry must be the first block");
        let map = self.func.splice(fragment, &[Value::Param(0)]);
        self.entry = map.entry;
        self.register_intrinsics(fragment, &map, 0);
        map
    }

    /// Splice the fragment implementing `address` and connect every
    /// branch that was waiting for it.
    pub fn eat(&mut self, fragment: &Function, address: u64) -> SpliceMap {
        assert!(
            !self.implemented.contains_key(&address),
            "address {address:#x} implemented twice"
        );
        let map = self.func.splice(fragment, &[Value::Param(0)]);
        let block = map.entry.expect("eat: fragment without blocks");
        self.implemented.insert(address, block);
        if let Some(placeholder) = self.destinations.remove(&address) {
            let preds = self.incoming.remove(&placeholder).unwrap_or_default();
            self.func.retarget_from(&preds, placeholder, block);
            self.func.remove_block(placeholder);
        }
        self.register_intrinsics(fragment, &map, address);
        map
    }

    fn register_intrinsics(
        &mut self,
        fragment: &Function,
        map: &SpliceMap,
        address: u64,
    ) {
        let index = self.fragments.len();
        self.fragments.push(map.blocks.values().copied().collect());
        for old in fragment.insts() {
            let InstKind::Intrinsic { intrinsic, args } = &fragment.inst(old).kind
            else {
                continue;
            };
            if *intrinsic == Intrinsic::Call {
                if let Some(dest) = args.get(2).and_then(Value::as_const) {
                    self.call_targets.insert(dest);
                }
            }
            if let Some(new) = map.inst(old) {
                let pending = Pending {
                    intrinsic: *intrinsic,
                    address,
                    fragment: index,
                };
                self.intrinsics.insert(new, pending);
            }
        }
    }

    // -- Address lookup --

    pub fn get_implemented_block(&self, address: u64) -> Option<BlockId> {
        self.implemented.get(&address).copied()
    }

    /// Block to branch to for `address`: the implementing block, or a
    /// placeholder (terminated by `unreachable`) that `eat` will later
    /// replace.
    pub fn get_destination(&mut self, address: u64) -> BlockId {
        if let Some(b) = self.get_implemented_block(address) {
            return b;
        }
        if let Some(&b) = self.destinations.get(&address) {
            return b;
        }
        let b = self.func.add_block(&format!("dest_{address:x}"));
        self.func
            .push_inst(b, InstKind::Unreachable, Type::Void);
        self.destinations.insert(address, b);
        self.incoming.insert(b, Vec::new());
        b
    }

    /// Implemented addresses in ascending order.
    pub fn implemented_addresses(&self) -> impl Iterator<Item = u64> + '_ {
        self.implemented.keys().copied()
    }

    pub fn call_targets(&self) -> &BTreeSet<u64> {
        &self.call_targets
    }

    // -- Outstanding placeholders --

    /// First outstanding placeholder after `after` (or the first one
    /// overall). Re-query after every mutation.
    pub fn next_intrinsic(&self, after: Option<InstId>) -> Option<IntrinsicSite> {
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        self.intrinsics
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(&inst, p)| IntrinsicSite {
                inst,
                intrinsic: p.intrinsic,
                address: p.address,
            })
    }

    /// Arguments of an outstanding placeholder call.
    pub fn intrinsic_args(&self, site: &IntrinsicSite) -> &[Value] {
        match &self.func.inst(site.inst).kind {
            InstKind::Intrinsic { args, .. } => args,
            _ => &[],
        }
    }

    /// Apply `substitution` to `site` and advance to the next
    /// outstanding placeholder.
    pub fn substitute(
        &mut self,
        site: IntrinsicSite,
        substitution: Substitution,
    ) -> Option<IntrinsicSite> {
        match substitution {
            Substitution::Branch(dest) => {
                let block = self.truncate_at(site.inst);
                self.func.push_inst(block, InstKind::Br { dest }, Type::Void);
                if let Some(preds) = self.incoming.get_mut(&dest) {
                    preds.push(block);
                }
            }
            Substitution::Return => {
                let block = self.truncate_at(site.inst);
                self.func.push_inst(block, InstKind::Ret, Type::Void);
            }
            Substitution::Value(v) => {
                if let Some(p) = self.intrinsics.remove(&site.inst) {
                    let from = Value::Inst(site.inst);
                    let blocks = &self.fragments[p.fragment];
                    self.func.replace_uses_in(blocks, from, v);
                }
                self.func.remove_inst(site.inst);
            }
            Substitution::Erase => {
                self.func.remove_inst(site.inst);
                self.intrinsics.remove(&site.inst);
            }
        }
        self.next_intrinsic(Some(site.inst))
    }

    /// Leave `site` in place and advance.
    pub fn skip(&self, site: IntrinsicSite) -> Option<IntrinsicSite> {
        self.next_intrinsic(Some(site.inst))
    }

    fn truncate_at(&mut self, inst: InstId) -> BlockId {
        let block = self.func.inst(inst).block;
        for removed in self.func.truncate_block_at(inst) {
            self.intrinsics.remove(&removed);
        }
        block
    }

    /// Outstanding placeholders in instruction order.
    pub fn outstanding(&self) -> Vec<IntrinsicSite> {
        let mut sites = Vec::with_capacity(self.intrinsics.len());
        let mut cursor = self.next_intrinsic(None);
        while let Some(site) = cursor {
            sites.push(site);
            cursor = self.skip(site);
        }
        sites
    }

    /// Hand over the finished function.
    pub fn finalize(self) -> Function {
        self.func
    }
}
