//! `matricula-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the client-facing error taxonomy and strongly-typed identifiers.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AuthorizedPersonId, EnrollmentId, FamilyInformationId, ParentId, RepresentativeId, RoleId,
    StudentId, UserId,
};
