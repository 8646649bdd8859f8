//! Repository implementations, one per aggregate cluster in spec §3.

mod authkey;
mod event;
mod gear;
mod identity;
mod loot;
mod session;
mod settings;
mod source;

pub use authkey::AuthKeyRepo;
pub use event::EventRepo;
pub use gear::GearRepo;
pub use identity::IdentityRepo;
pub use loot::LootRepo;
pub use session::SessionRepo;
pub use settings::ConfigRepo;
pub use source::SourceRepo;
