//! Typed content items and the codecs that load and save them.
//!
//! # Overview
//!
//! Every item in a package implements [`Content`], embedding a
//! [`ContentCore`] (its [`ContentInfo`] plus a shared [`AssetHandle`]). The
//! set of kinds is closed ([`ContentKind`]); the [`KindRegistry`] maps each
//! kind to a file extension and a [`ContentCodec`].
//!
//! | Kind | Extension | Type |
//! |------|-----------|------|
//! | data | `swlson` | [`DataContent`] |
//! | script | `swlua` | [`ScriptContent`] |
//! | creation | `swcreation` | [`CreationContent`] |
//! | experience | `swexp` | [`ExperienceContent`] |
//! | image | `swimg` | [`ImageContent`] (stored as [`SerializedImage`]) |
//! | animation, avatar, pose-rig, actor, mesh, material, model | `swanim`, `swavatar`, `swrig`, `swactor`, `swmesh`, `swmat`, `swmodel` | [`AssetContent`] |

mod asset;
mod codec;
mod core;
mod creation;
mod data;
mod experience;
mod image;
mod kind;
mod kinds;
mod script;
mod traits;

pub use asset::{AssetCodec, AssetContent};
pub use codec::{AssetResolver, ContentCodec, DirectCodec, NoAssets, SerializedCodec, SerializedForm};
pub use self::core::{AssetHandle, ContentCore, ContentInfo};
pub use creation::{CreationContent, CreationPart};
pub use data::DataContent;
pub use experience::ExperienceContent;
pub use self::image::{ImageContent, SerializedImage};
pub use kind::ContentKind;
pub use kinds::{EntryClass, KindRegistration, KindRegistry};
pub use script::ScriptContent;
pub use traits::{same_instance, same_slot, BoxFuture, Content, ContentError, ContentRef};
