//! Load skeleton-animated MD5 style models and bake them into triangles.
//!
//! The crate reads a joint hierarchy, skinned meshes and optional animation
//! clips from a text (`.md5mesh`) or binary (`.md5b`) asset, skins the
//! meshes for a requested pose and bakes every triangle into a record laid out
//! by an arbitrary vertex format. [`cache::ModelCache`] is the loader surface
//! a host engine talks to.
//!
pub mod animation;
pub mod bake;
pub mod cache;
pub mod index;
pub mod joint;
/// Parsers for the text and binary encodings.
pub mod loader;
pub mod mesh;
pub mod model;
pub mod normal;
pub mod pose;
pub mod skinning;
pub mod source;
pub mod transform;
