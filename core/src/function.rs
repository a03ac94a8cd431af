use std::collections::HashMap;

use crate::inst::{InstData, InstKind};
use crate::types::{AddrSpace, Type};
use crate::value::{BlockId, InstId, Value};

/// A basic block: a name and an ordered list of instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub name: String,
    pub insts: Vec<InstId>,
}

/// Id translation produced by [`Function::splice`].
#[derive(Debug, Clone, Default)]
pub struct SpliceMap {
    pub blocks: HashMap<BlockId, BlockId>,
    pub insts: HashMap<InstId, InstId>,
    /// New id of the spliced function's entry block.
    pub entry: Option<BlockId>,
}

impl SpliceMap {
    pub fn inst(&self, old: InstId) -> Option<InstId> {
        self.insts.get(&old).copied()
    }

    pub fn block(&self, old: BlockId) -> Option<BlockId> {
        self.blocks.get(&old).copied()
    }
}

/// An IR function.
///
/// Blocks and instructions live in index-stable arenas. Removing a
/// block or an instruction leaves a tombstone, so ids handed out
/// earlier never alias something new. Block order is given by an
/// explicit layout; the first block in the layout is the entry.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    params: Vec<Type>,
    insts: Vec<Option<InstData>>,
    blocks: Vec<Option<BlockData>>,
    layout: Vec<BlockId>,
    block_names: HashMap<String, u32>,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Type>) -> Self {
        Self {
            name: name.into(),
            params,
            insts: Vec::with_capacity(64),
            blocks: Vec::with_capacity(8),
            layout: Vec::with_capacity(8),
            block_names: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Type] {
        &self.params
    }

    // -- Blocks --

    pub fn entry_block(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Append a new empty block to the layout. Names are made unique
    /// by suffixing a counter.
    pub fn add_block(&mut self, name: &str) -> BlockId {
        let name = self.unique_block_name(name);
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(BlockData {
            name,
            insts: Vec::new(),
        }));
        self.layout.push(id);
        id
    }

    fn unique_block_name(&mut self, name: &str) -> String {
        let n = self.block_names.entry(name.to_string()).or_insert(0);
        *n += 1;
        if *n == 1 {
            name.to_string()
        } else {
            let unique = format!("{name}.{}", *n - 1);
            self.block_names.insert(unique.clone(), 1);
            unique
        }
    }

    /// Remove a block together with all of its instructions.
    pub fn remove_block(&mut self, b: BlockId) {
        let data = self.blocks[b.0 as usize]
            .take()
            .expect("remove_block: dead block");
        for id in data.insts {
            self.insts[id.0 as usize] = None;
        }
        self.layout.retain(|&x| x != b);
    }

    pub fn is_block_live(&self, b: BlockId) -> bool {
        self.blocks
            .get(b.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn block(&self, b: BlockId) -> &BlockData {
        self.blocks[b.0 as usize]
            .as_ref()
            .expect("block: dead block")
    }

    pub fn block_mut(&mut self, b: BlockId) -> &mut BlockData {
        self.blocks[b.0 as usize]
            .as_mut()
            .expect("block_mut: dead block")
    }

    /// Live blocks in layout order.
    pub fn blocks(&self) -> &[BlockId] {
        &self.layout
    }

    pub fn num_blocks(&self) -> usize {
        self.layout.len()
    }

    // -- Instructions --

    pub fn is_live(&self, id: InstId) -> bool {
        self.insts
            .get(id.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn inst(&self, id: InstId) -> &InstData {
        self.insts[id.0 as usize]
            .as_ref()
            .expect("inst: dead instruction")
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut InstData {
        self.insts[id.0 as usize]
            .as_mut()
            .expect("inst_mut: dead instruction")
    }

    /// All live instructions in layout order.
    pub fn insts(&self) -> impl Iterator<Item = InstId> + '_ {
        self.layout
            .iter()
            .flat_map(move |&b| self.block(b).insts.iter().copied())
    }

    pub fn num_insts(&self) -> usize {
        self.insts.iter().filter(|slot| slot.is_some()).count()
    }

    fn alloc_inst(&mut self, kind: InstKind, ty: Type, block: BlockId) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(Some(InstData { kind, ty, block }));
        id
    }

    pub fn push_inst(&mut self, b: BlockId, kind: InstKind, ty: Type) -> InstId {
        let id = self.alloc_inst(kind, ty, b);
        self.block_mut(b).insts.push(id);
        id
    }

    /// Insert a new instruction immediately before `before`.
    pub fn insert_inst_before(
        &mut self,
        before: InstId,
        kind: InstKind,
        ty: Type,
    ) -> InstId {
        let b = self.inst(before).block;
        let id = self.alloc_inst(kind, ty, b);
        let insts = &mut self.block_mut(b).insts;
        let pos = insts
            .iter()
            .position(|&x| x == before)
            .expect("insert_inst_before: instruction not in its block");
        insts.insert(pos, id);
        id
    }

    pub fn remove_inst(&mut self, id: InstId) {
        let b = self.inst(id).block;
        self.block_mut(b).insts.retain(|&x| x != id);
        self.insts[id.0 as usize] = None;
    }

    /// Remove `id` and every instruction after it in its block.
    /// Returns the removed ids in order.
    pub fn truncate_block_at(&mut self, id: InstId) -> Vec<InstId> {
        let b = self.inst(id).block;
        let insts = &mut self.block_mut(b).insts;
        let pos = insts
            .iter()
            .position(|&x| x == id)
            .expect("truncate_block_at: instruction not in its block");
        let removed = insts.split_off(pos);
        for &r in &removed {
            self.insts[r.0 as usize] = None;
        }
        removed
    }

    pub fn terminator(&self, b: BlockId) -> Option<InstId> {
        let last = *self.block(b).insts.last()?;
        self.inst(last).kind.is_terminator().then_some(last)
    }

    pub fn successors(&self, b: BlockId) -> Vec<BlockId> {
        match self.terminator(b) {
            Some(t) => self.inst(t).kind.successors(),
            None => Vec::new(),
        }
    }

    /// Blocks whose terminator targets `b`, in layout order. A block
    /// branching to `b` on both edges is listed once.
    pub fn predecessors(&self, b: BlockId) -> Vec<BlockId> {
        self.layout
            .iter()
            .copied()
            .filter(|&p| self.successors(p).contains(&b))
            .collect()
    }

    // -- Values and uses --

    pub fn value_type(&self, v: Value) -> Type {
        match v {
            Value::Param(i) => self.params[i as usize],
            Value::Inst(id) => self.inst(id).ty,
            Value::Const { ty, .. } => ty,
            Value::Global(_) => Type::Ptr(AddrSpace::Emulator),
            Value::Capture { ty, .. } => ty,
            Value::Undef(ty) => ty,
        }
    }

    /// Instructions reading the result of `id`.
    pub fn users(&self, id: InstId) -> Vec<InstId> {
        let v = Value::Inst(id);
        self.insts()
            .filter(|&u| self.inst(u).kind.operands().contains(&v))
            .collect()
    }

    pub fn replace_all_uses(&mut self, from: Value, to: Value) {
        for slot in self.insts.iter_mut().flatten() {
            for op in slot.kind.operands_mut() {
                if *op == from {
                    *op = to;
                }
            }
        }
    }

    /// `replace_all_uses` restricted to the instructions of `blocks`.
    /// Dead blocks are skipped.
    pub fn replace_uses_in(
        &mut self,
        blocks: &[BlockId],
        from: Value,
        to: Value,
    ) {
        for &b in blocks {
            let Some(Some(data)) = self.blocks.get(b.0 as usize) else {
                continue;
            };
            for &id in &data.insts {
                let Some(slot) = &mut self.insts[id.0 as usize] else {
                    continue;
                };
                for op in slot.kind.operands_mut() {
                    if *op == from {
                        *op = to;
                    }
                }
            }
        }
    }

    /// Redirect the edges aimed at `old` in the terminators of `preds`
    /// to `new`. Other branches to `old` are left alone.
    pub fn retarget_from(
        &mut self,
        preds: &[BlockId],
        old: BlockId,
        new: BlockId,
    ) {
        for &p in preds {
            if !self.is_block_live(p) {
                continue;
            }
            let Some(term) = self.terminator(p) else {
                continue;
            };
            for succ in self.inst_mut(term).kind.successors_mut() {
                if *succ == old {
                    *succ = new;
                }
            }
        }
    }

    /// Move all instructions of `b` to the end of `a` and delete `b`.
    /// `a` must have had its terminator removed by the caller.
    pub fn merge_into(&mut self, a: BlockId, b: BlockId) {
        let data = self.blocks[b.0 as usize]
            .take()
            .expect("merge_into: dead block");
        for &id in &data.insts {
            self.inst_mut(id).block = a;
        }
        self.block_mut(a).insts.extend(data.insts);
        self.layout.retain(|&x| x != b);
    }

    // -- Splicing --

    /// Copy the body of `other` into this function.
    ///
    /// `args` supplies the value of each parameter of `other`.
    /// Captured values become plain instruction references. Blocks
    /// are appended to the layout; the entry keeps the spliced
    /// function's name and other blocks are prefixed with it.
    pub fn splice(&mut self, other: &Function, args: &[Value]) -> SpliceMap {
        assert_eq!(
            args.len(),
            other.params.len(),
            "splice: argument count mismatch for {}",
            other.name
        );
        let mut map = SpliceMap::default();

        for (i, &ob) in other.layout.iter().enumerate() {
            let name = if i == 0 {
                other.name.clone()
            } else {
                format!("{}.{}", other.name, other.block(ob).name)
            };
            let nb = self.add_block(&name);
            map.blocks.insert(ob, nb);
            if i == 0 {
                map.entry = Some(nb);
            }
        }

        // Allocate ids first so forward references resolve.
        for &ob in &other.layout {
            let nb = map.blocks[&ob];
            for &oi in &other.block(ob).insts {
                let data = other.inst(oi);
                let ni = self.push_inst(nb, InstKind::Unreachable, data.ty);
                map.insts.insert(oi, ni);
            }
        }

        for (&oi, &ni) in &map.insts {
            let mut kind = other.inst(oi).kind.clone();
            for op in kind.operands_mut() {
                *op = match *op {
                    Value::Param(p) => args[p as usize],
                    Value::Inst(id) => Value::Inst(map.insts[&id]),
                    Value::Capture { inst, .. } => Value::Inst(inst),
                    v => v,
                };
            }
            for succ in kind.successors_mut() {
                *succ = map.blocks[succ];
            }
            self.inst_mut(ni).kind = kind;
        }
        map
    }
}
