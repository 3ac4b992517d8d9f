//! Application services: storage errors are translated to `DomainError` here
//! and nowhere else.

pub mod auth;
pub mod enrollments;
pub mod roles;
pub mod users;

pub use auth::AuthService;
pub use enrollments::{EnrollmentAggregateStore, EnrollmentRegistry};
pub use roles::RoleService;
pub use users::UserService;
