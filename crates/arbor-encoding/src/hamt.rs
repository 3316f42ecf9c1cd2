//! Hash-array-mapped shard tables.
//!
//! A [`HamtDirectory`] spreads links over a trie of shards. Each shard has
//! `fanout` slots; the slot for a name at depth `d` is the `d`-th group of
//! `log2(fanout)` bits of the name's shard key. A slot holds either a single
//! link or a child shard. Two names landing in the same slot push both one
//! level down; removing links collapses a child shard that is left with a
//! single link back into its parent's slot.
//!
//! Child shards are persisted as their own [`NodeKind::HamtShard`] nodes and
//! loaded from the store the first time an operation descends into them.

use std::collections::BTreeMap;
use std::sync::Arc;

use arbor_crypto::{ContentHasher, IdentityBuilder};
use arbor_store::{Link, Node, NodeKind, ObjectStore};
use arbor_types::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::codec;
use crate::encoding::LinkTable;
use crate::error::{EncodingError, EncodingResult};

/// Fan-out used when no other is configured.
pub const DEFAULT_FANOUT: usize = 256;

const MAX_FANOUT: usize = 1024;
const KEY_BITS: usize = 256;

/// Persisted form of one shard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPayload {
    pub fanout: u32,
    /// Occupied slots in ascending index order.
    pub slots: Vec<ShardSlot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSlot {
    pub index: u32,
    pub entry: SlotEntry,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotEntry {
    Link(Link),
    Shard(ObjectId),
}

/// Shared parameters threaded through the recursive shard operations.
struct Ctx<'a> {
    store: &'a dyn ObjectStore,
    builder: &'a IdentityBuilder,
    fanout: usize,
    bits: usize,
}

impl Ctx<'_> {
    /// Slot index of `key` at `depth`, or `None` once the key is used up.
    fn slot(&self, key: &[u8; 32], depth: usize) -> Option<u32> {
        let start = depth * self.bits;
        if start + self.bits > KEY_BITS {
            return None;
        }
        let mut index = 0u32;
        for offset in start..start + self.bits {
            let bit = (key[offset / 8] >> (7 - offset % 8)) & 1;
            index = (index << 1) | u32::from(bit);
        }
        Some(index)
    }

    fn slot_or_exhausted(&self, name: &str, key: &[u8; 32], depth: usize) -> EncodingResult<u32> {
        self.slot(key, depth)
            .ok_or_else(|| EncodingError::KeySpaceExhausted(name.to_string()))
    }
}

fn shard_key(name: &str) -> [u8; 32] {
    ContentHasher::SHARD_KEY.digest(name.as_bytes())
}

#[derive(Clone, Debug, Default)]
struct Shard {
    slots: BTreeMap<u32, Slot>,
}

#[derive(Clone, Debug)]
enum Slot {
    Link(Link),
    Child(ShardRef),
}

#[derive(Clone, Debug)]
enum ShardRef {
    Loaded(Box<Shard>),
    Stored(ObjectId),
}

enum Collapse {
    Keep,
    Replace(Link),
    Drop,
}

impl ShardRef {
    fn load(&mut self, ctx: &Ctx<'_>) -> EncodingResult<&mut Shard> {
        if let ShardRef::Stored(id) = *self {
            let node = ctx.store.fetch(&id)?;
            let shard = Shard::from_node(&node, ctx.fanout)?;
            trace!(id = %id.short_hex(), "loaded child shard");
            *self = ShardRef::Loaded(Box::new(shard));
        }
        match self {
            ShardRef::Loaded(shard) => Ok(shard.as_mut()),
            ShardRef::Stored(_) => unreachable!("shard loaded above"),
        }
    }
}

impl Shard {
    fn from_node(node: &Node, fanout: usize) -> EncodingResult<Self> {
        codec::expect_kind(node, NodeKind::HamtShard, "hamt-shard")?;
        let payload: ShardPayload = codec::decode(node)?;
        if payload.fanout as usize != fanout {
            return Err(EncodingError::Corrupt {
                id: node.id(),
                reason: format!(
                    "shard fan-out {} does not match table fan-out {fanout}",
                    payload.fanout
                ),
            });
        }
        let mut slots = BTreeMap::new();
        for slot in payload.slots {
            if slot.index as usize >= fanout {
                return Err(EncodingError::Corrupt {
                    id: node.id(),
                    reason: format!("slot {} out of range", slot.index),
                });
            }
            let entry = match slot.entry {
                SlotEntry::Link(link) => Slot::Link(link),
                SlotEntry::Shard(id) => Slot::Child(ShardRef::Stored(id)),
            };
            slots.insert(slot.index, entry);
        }
        Ok(Self { slots })
    }

    fn find(
        &mut self,
        ctx: &Ctx<'_>,
        name: &str,
        key: &[u8; 32],
        depth: usize,
    ) -> EncodingResult<Option<Link>> {
        let index = ctx.slot_or_exhausted(name, key, depth)?;
        match self.slots.get_mut(&index) {
            None => Ok(None),
            Some(Slot::Link(link)) => Ok((link.name == name).then(|| link.clone())),
            Some(Slot::Child(child)) => child.load(ctx)?.find(ctx, name, key, depth + 1),
        }
    }

    fn insert(&mut self, ctx: &Ctx<'_>, link: Link, key: &[u8; 32], depth: usize) -> EncodingResult<()> {
        let index = ctx.slot_or_exhausted(&link.name, key, depth)?;
        let Some(slot) = self.slots.get_mut(&index) else {
            self.slots.insert(index, Slot::Link(link));
            return Ok(());
        };
        match slot {
            Slot::Child(child) => child.load(ctx)?.insert(ctx, link, key, depth + 1),
            Slot::Link(existing) if existing.name == link.name => {
                *existing = link;
                Ok(())
            }
            Slot::Link(existing) => {
                let existing = existing.clone();
                let existing_key = shard_key(&existing.name);
                let mut split = Shard::default();
                split.insert(ctx, existing, &existing_key, depth + 1)?;
                split.insert(ctx, link, key, depth + 1)?;
                *slot = Slot::Child(ShardRef::Loaded(Box::new(split)));
                Ok(())
            }
        }
    }

    /// Returns whether a link was removed.
    fn remove(&mut self, ctx: &Ctx<'_>, name: &str, key: &[u8; 32], depth: usize) -> EncodingResult<bool> {
        let index = ctx.slot_or_exhausted(name, key, depth)?;
        let (removed, collapse) = match self.slots.get_mut(&index) {
            None => return Ok(false),
            Some(Slot::Link(link)) => {
                if link.name != name {
                    return Ok(false);
                }
                (true, Collapse::Drop)
            }
            Some(Slot::Child(child)) => {
                let shard = child.load(ctx)?;
                let removed = shard.remove(ctx, name, key, depth + 1)?;
                let collapse = if !removed {
                    Collapse::Keep
                } else if shard.slots.is_empty() {
                    Collapse::Drop
                } else {
                    shard.sole_link().map_or(Collapse::Keep, Collapse::Replace)
                };
                (removed, collapse)
            }
        };
        match collapse {
            Collapse::Keep => {}
            Collapse::Replace(link) => {
                self.slots.insert(index, Slot::Link(link));
            }
            Collapse::Drop => {
                self.slots.remove(&index);
            }
        }
        Ok(removed)
    }

    /// The only entry of this shard, if it is a link.
    fn sole_link(&self) -> Option<Link> {
        if self.slots.len() != 1 {
            return None;
        }
        match self.slots.values().next() {
            Some(Slot::Link(link)) => Some(link.clone()),
            _ => None,
        }
    }

    fn for_each(
        &mut self,
        ctx: &Ctx<'_>,
        visit: &mut dyn FnMut(&Link) -> EncodingResult<()>,
    ) -> EncodingResult<()> {
        for slot in self.slots.values_mut() {
            match slot {
                Slot::Link(link) => visit(&*link)?,
                Slot::Child(child) => child.load(ctx)?.for_each(ctx, visit)?,
            }
        }
        Ok(())
    }

    /// Encode this shard, persisting every loaded child shard first.
    fn serialize(&self, ctx: &Ctx<'_>) -> EncodingResult<Node> {
        let mut slots = Vec::with_capacity(self.slots.len());
        for (&index, slot) in &self.slots {
            let entry = match slot {
                Slot::Link(link) => SlotEntry::Link(link.clone()),
                Slot::Child(ShardRef::Stored(id)) => SlotEntry::Shard(*id),
                Slot::Child(ShardRef::Loaded(child)) => {
                    let node = child.serialize(ctx)?;
                    SlotEntry::Shard(ctx.store.write(&node)?)
                }
            };
            slots.push(ShardSlot { index, entry });
        }
        let payload = ShardPayload {
            fanout: ctx.fanout as u32,
            slots,
        };
        codec::encode(NodeKind::HamtShard, &payload, ctx.builder)
    }
}

/// Sharded directory encoding.
#[derive(Clone)]
pub struct HamtDirectory {
    root: Shard,
    fanout: usize,
    bits: usize,
    builder: IdentityBuilder,
    store: Arc<dyn ObjectStore>,
}

impl HamtDirectory {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        builder: IdentityBuilder,
        fanout: usize,
    ) -> EncodingResult<Self> {
        let bits = fanout_bits(fanout)?;
        Ok(Self {
            root: Shard::default(),
            fanout,
            bits,
            builder,
            store,
        })
    }

    /// Decode a root `HamtShard` node. Child shards stay in the store until
    /// needed.
    pub fn from_node(store: Arc<dyn ObjectStore>, node: &Node) -> EncodingResult<Self> {
        codec::expect_kind(node, NodeKind::HamtShard, "hamt-shard")?;
        let payload: ShardPayload = codec::decode(node)?;
        let fanout = payload.fanout as usize;
        let bits = fanout_bits(fanout).map_err(|_| EncodingError::Corrupt {
            id: node.id(),
            reason: format!("invalid fan-out {fanout}"),
        })?;
        let root = Shard::from_node(node, fanout)?;
        Ok(Self {
            root,
            fanout,
            bits,
            builder: node.builder().clone(),
            store,
        })
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    /// Insert a link whose target is already persisted.
    pub fn insert_link(&mut self, link: Link) -> EncodingResult<()> {
        let key = shard_key(&link.name);
        let (root, ctx) = self.parts();
        root.insert(&ctx, link, &key, 0)
    }

    fn ctx(&self) -> Ctx<'_> {
        Ctx {
            store: self.store.as_ref(),
            builder: &self.builder,
            fanout: self.fanout,
            bits: self.bits,
        }
    }

    /// Split borrow: the root shard mutably, the context immutably.
    fn parts(&mut self) -> (&mut Shard, Ctx<'_>) {
        let ctx = Ctx {
            store: self.store.as_ref(),
            builder: &self.builder,
            fanout: self.fanout,
            bits: self.bits,
        };
        (&mut self.root, ctx)
    }
}

fn fanout_bits(fanout: usize) -> EncodingResult<usize> {
    if !(2..=MAX_FANOUT).contains(&fanout) || !fanout.is_power_of_two() {
        return Err(EncodingError::InvalidFanout(fanout));
    }
    Ok(fanout.trailing_zeros() as usize)
}

impl LinkTable for HamtDirectory {
    fn find(&mut self, name: &str) -> EncodingResult<Node> {
        let link = self
            .link(name)?
            .ok_or_else(|| EncodingError::NotFound(name.to_string()))?;
        Ok(self.store.fetch(&link.id)?)
    }

    fn link(&mut self, name: &str) -> EncodingResult<Option<Link>> {
        let key = shard_key(name);
        let (root, ctx) = self.parts();
        root.find(&ctx, name, &key, 0)
    }

    fn add_link(&mut self, name: &str, node: &Node) -> EncodingResult<()> {
        self.insert_link(Link::to_node(name, node))
    }

    fn remove_link(&mut self, name: &str) -> EncodingResult<()> {
        let key = shard_key(name);
        let (root, ctx) = self.parts();
        if root.remove(&ctx, name, &key, 0)? {
            Ok(())
        } else {
            Err(EncodingError::NotFound(name.to_string()))
        }
    }

    fn for_each_link(
        &mut self,
        visit: &mut dyn FnMut(&Link) -> EncodingResult<()>,
    ) -> EncodingResult<()> {
        let (root, ctx) = self.parts();
        root.for_each(&ctx, visit)
    }

    fn link_count(&mut self) -> EncodingResult<usize> {
        let mut count = 0;
        self.for_each_link(&mut |_| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    fn serialize(&mut self) -> EncodingResult<Node> {
        let ctx = self.ctx();
        self.root.serialize(&ctx)
    }

    fn identity_builder(&self) -> &IdentityBuilder {
        &self.builder
    }

    fn set_identity_builder(&mut self, builder: IdentityBuilder) {
        self.builder = builder;
    }
}

impl std::fmt::Debug for HamtDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HamtDirectory")
            .field("fanout", &self.fanout)
            .field("root_slots", &self.root.slots.len())
            .field("builder", &self.builder)
            .finish()
    }
}
