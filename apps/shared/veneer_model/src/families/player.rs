//! Player wrappers
//!
//! Every player is a `ReferenceHub` natively. Whether it is a connected human or
//! a server-side dummy is carried in the discriminator, so the family uses two
//! candidates gated on [`DUMMY_FLAG`]: `Npc` first, then `Human`.

use crate::dispatch::{Constructor, TypeDispatchTable};
use crate::error::Result;
use crate::family::{Construction, FamilyRegistry};
use crate::index::KeyedIndex;
use crate::kind::{FamilyKind, NativeKind};
use crate::native::{NativeCommand, NativeEngine, NativeObject, NativeWorld};
use crate::wrapper::{Wrapper, WrapperCore};

/// Discriminator bit set on dummy players
pub const DUMMY_FLAG: u32 = 0x1;

pub const NICKNAME_INDEX: &str = "nickname";

pub type PlayersByNickname = KeyedIndex<Player, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerVariant {
    Human,
    Npc,
}

#[derive(Debug)]
pub struct Player {
    core: WrapperCore,
    variant: PlayerVariant,
}

impl Player {
    pub fn variant(&self) -> PlayerVariant {
        self.variant
    }

    pub fn nickname(&self) -> &str {
        self.core.name()
    }

    pub fn is_npc(&self) -> bool {
        self.variant == PlayerVariant::Npc
    }

    pub fn health(&self, world: &dyn NativeWorld) -> Option<f32> {
        self.core.live_state(world).map(|state| state.health)
    }

    pub fn damage(&self, engine: &mut dyn NativeEngine, amount: f32) -> Result<()> {
        self.core.submit(engine, "damage", NativeCommand::Damage(amount))
    }

    /// Kick a human player; dummies are destroyed instead
    pub fn disconnect(&self, engine: &mut dyn NativeEngine, reason: &str) -> Result<()> {
        self.core.ensure_live("disconnect")?;
        if self.is_npc() {
            return Err(self.core.unsupported("disconnect"));
        }
        self.core.submit(engine, "disconnect", NativeCommand::Disconnect(reason.to_string()))
    }
}

impl Wrapper for Player {
    const FAMILY: FamilyKind = FamilyKind::Player;

    fn core(&self) -> &WrapperCore {
        &self.core
    }

    fn variant_name(&self) -> &'static str {
        match self.variant {
            PlayerVariant::Human => "human",
            PlayerVariant::Npc => "npc",
        }
    }
}

fn build_npc(_: &mut Construction<'_, Player>, object: &NativeObject) -> Option<Player> {
    if object.discriminator & DUMMY_FLAG == 0 {
        return None;
    }
    Some(Player {
        core: WrapperCore::from_object(object),
        variant: PlayerVariant::Npc,
    })
}

fn build_human(_: &mut Construction<'_, Player>, object: &NativeObject) -> Option<Player> {
    if object.discriminator & DUMMY_FLAG != 0 {
        return None;
    }
    Some(Player {
        core: WrapperCore::from_object(object),
        variant: PlayerVariant::Human,
    })
}

fn nickname(player: &Player) -> Vec<String> {
    vec![player.nickname().to_string()]
}

pub fn dispatch_table() -> Result<TypeDispatchTable<Player>> {
    let mut table = TypeDispatchTable::candidates();
    table.register_candidates(NativeKind::ReferenceHub, [build_npc as Constructor<Player>, build_human])?;
    Ok(table)
}

pub fn registry() -> Result<FamilyRegistry<Player>> {
    Ok(FamilyRegistry::new(dispatch_table()?).with_index(PlayersByNickname::new(NICKNAME_INDEX, nickname)))
}
